// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

mod analysis;
mod interference;
mod memory;
mod report;
mod state;

pub use analysis::*;
pub use memory::*;
pub use report::*;
pub use state::BoundsState;
