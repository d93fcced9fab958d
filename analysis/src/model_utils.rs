// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use cir::{Body, Location};

/// Renders the statement or terminator at `location` for error messages and
/// state dumps.
pub fn location_to_stmt_str(location: Location, body: &Body) -> String {
    match body.stmt_at(location) {
        Some(stmt) => format!("{stmt}"),
        None => format!("{}", body[location.block].terminator),
    }
}
