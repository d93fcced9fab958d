// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

mod abstract_state;
mod fixpoint_engine;

pub use abstract_state::AbstractState;
pub use fixpoint_engine::FixpointEngine;

use crate::AnalysisError;

pub type AnalysisResult<T> = Result<T, AnalysisError>;
