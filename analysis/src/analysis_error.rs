// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::model_utils::location_to_stmt_str;
use cir::{BasicBlock, Location, Program, Region, ThreadId};

#[derive(Debug)]
pub enum AnalysisError {
    UnsupportedStatement(ThreadId, Location),
    /// Contains the location of the terminator and the successor block that
    /// received no state.
    SuccessorWithoutState(ThreadId, Location, BasicBlock),
    /// An indexing, allocation or deallocation site refers to a region the
    /// memory model never registered. This is a malformed program model, not
    /// imprecision.
    UnknownAllocation(Region, ThreadId, Location),
    /// An activated check name the engine does not know.
    UnknownCheck(String),
    /// A numeric domain name the engine does not know.
    UnknownDomain(String),
}

impl AnalysisError {
    pub fn to_pretty_str(&self, program: &Program) -> String {
        match self {
            AnalysisError::UnsupportedStatement(thread, location) => {
                let stmt = location_to_stmt_str(*location, &program.thread(*thread).body);
                format!(
                    "Unsupported statement in thread '{}' at {}: {}",
                    program.thread(*thread).name,
                    location,
                    stmt
                )
            }
            AnalysisError::SuccessorWithoutState(thread, location, block) => {
                let stmt = location_to_stmt_str(*location, &program.thread(*thread).body);
                format!(
                    "Basic block {} after terminator of thread '{}' at {} ({}) has no state assigned",
                    block,
                    program.thread(*thread).name,
                    location,
                    stmt
                )
            }
            AnalysisError::UnknownAllocation(region, thread, location) => {
                let stmt = location_to_stmt_str(*location, &program.thread(*thread).body);
                format!(
                    "Access to unregistered allocation '{}' in thread '{}' at {}: {}",
                    program
                        .regions
                        .get(region.0)
                        .map(|r| r.name.as_str())
                        .unwrap_or("<unknown>"),
                    program.thread(*thread).name,
                    location,
                    stmt
                )
            }
            AnalysisError::UnknownCheck(name) => {
                format!("Unknown check: '{name}'")
            }
            AnalysisError::UnknownDomain(name) => {
                format!("Unknown numeric domain: '{name}'")
            }
        }
    }
}
