// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The concurrent intermediate representation consumed by the analysis
//! engine: one control-flow graph per thread, plus the program-level tables
//! of globals, locks and heap regions.
//!
//! The program model is an input format: front-ends produce it (e.g. by
//! deserializing the JSON emitted by an external translator) and the engine
//! only reads it.

mod body;
mod builder;
mod expr;
mod program;

pub use body::{
    AccessKind, BasicBlock, BasicBlockData, Body, Local, LocalDecl, Location, Rvalue, Statement,
    StatementKind, Terminator, TerminatorKind, START_BLOCK,
};
pub use builder::BodyBuilder;
pub use expr::{CmpOp, Comparison, LinearExpr, Var};
pub use program::{GlobalDecl, GlobalId, LockDecl, LockId, Program, Region, RegionDecl, Thread, ThreadId};
