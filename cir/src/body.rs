// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::expr::{Comparison, LinearExpr, Var};
use crate::program::{LockId, Region, ThreadId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index as IndexOp;

/// Index of a basic block in [`Body::basic_blocks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BasicBlock(pub usize);

/// Index of a thread-local variable in [`Body::local_decls`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Local(pub usize);

pub const START_BLOCK: BasicBlock = BasicBlock(0);

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

/// A position inside a body: a statement of `block`, or its terminator when
/// `statement_index` equals the number of statements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub block: BasicBlock,
    pub statement_index: usize,
}

impl Location {
    pub fn successor_within_block(self) -> Location {
        Location {
            block: self.block,
            statement_index: self.statement_index + 1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}[{}]", self.block, self.statement_index)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub name: String,
}

/// The control-flow graph of one thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    pub basic_blocks: Vec<BasicBlockData>,
    pub local_decls: Vec<LocalDecl>,
}

impl Body {
    pub fn block_ids(&self) -> impl Iterator<Item = BasicBlock> {
        (0..self.basic_blocks.len()).map(BasicBlock)
    }

    /// The location of the terminator of `block`.
    pub fn terminator_loc(&self, block: BasicBlock) -> Location {
        Location {
            block,
            statement_index: self[block].statements.len(),
        }
    }

    /// The statement at `location`, or `None` if the location points to the
    /// terminator.
    pub fn stmt_at(&self, location: Location) -> Option<&Statement> {
        self[location.block].statements.get(location.statement_index)
    }
}

impl IndexOp<BasicBlock> for Body {
    type Output = BasicBlockData;

    fn index(&self, block: BasicBlock) -> &BasicBlockData {
        &self.basic_blocks[block.0]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlockData {
    pub statements: Vec<Statement>,
    pub terminator: Terminator,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessKind {
    Load,
    Store,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rvalue {
    /// An affine expression over locals and globals.
    Use(LinearExpr),
    /// A value about which nothing is known.
    Nondet,
    /// The remainder of an unknown value modulo a constant, as in
    /// `rand() % m`: the result lies in `[-(|m|-1), |m|-1]`. The sign is
    /// deliberately unknown; see the allocation handling in the engine.
    Rem(LinearExpr, i64),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Assign(Var, Rvalue),
    /// Allocate `region` with `len` elements.
    Alloc { region: Region, len: LinearExpr },
    Dealloc { region: Region },
    /// An indexed access `region[offset]`; the static access site is
    /// identified by the (thread, location) pair of this statement.
    Index {
        region: Region,
        offset: LinearExpr,
        kind: AccessKind,
    },
    Lock(LockId),
    Unlock(LockId),
    Spawn(ThreadId),
    Join(ThreadId),
    Nop,
}

impl StatementKind {
    /// All variables the statement reads.
    pub fn read_vars(&self) -> Vec<&Var> {
        match self {
            StatementKind::Assign(_, Rvalue::Use(expr))
            | StatementKind::Assign(_, Rvalue::Rem(expr, _))
            | StatementKind::Alloc { len: expr, .. }
            | StatementKind::Index { offset: expr, .. } => expr.vars().collect(),
            _ => vec![],
        }
    }

    /// The variable the statement writes, if any.
    pub fn written_var(&self) -> Option<&Var> {
        match self {
            StatementKind::Assign(var, _) => Some(var),
            _ => None,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            StatementKind::Assign(var, Rvalue::Use(expr)) => write!(f, "{var} = {expr}"),
            StatementKind::Assign(var, Rvalue::Nondet) => write!(f, "{var} = nondet()"),
            StatementKind::Assign(var, Rvalue::Rem(expr, m)) => write!(f, "{var} = ({expr}) % {m}"),
            StatementKind::Alloc { region, len } => write!(f, "{region} = alloc({len})"),
            StatementKind::Dealloc { region } => write!(f, "dealloc({region})"),
            StatementKind::Index {
                region,
                offset,
                kind: AccessKind::Load,
            } => write!(f, "load {region}[{offset}]"),
            StatementKind::Index {
                region,
                offset,
                kind: AccessKind::Store,
            } => write!(f, "store {region}[{offset}]"),
            StatementKind::Lock(lock) => write!(f, "lock({lock})"),
            StatementKind::Unlock(lock) => write!(f, "unlock({lock})"),
            StatementKind::Spawn(thread) => write!(f, "spawn({thread})"),
            StatementKind::Join(thread) => write!(f, "join({thread})"),
            StatementKind::Nop => write!(f, "nop"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminator {
    pub kind: TerminatorKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminatorKind {
    Goto { target: BasicBlock },
    /// Branch on an affine comparison: `cond` holds on the edge to
    /// `then_target`, its negation on the edge to `else_target`.
    If {
        cond: Comparison,
        then_target: BasicBlock,
        else_target: BasicBlock,
    },
    Return,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BasicBlock> {
        match self.kind {
            TerminatorKind::Goto { target } => vec![target],
            TerminatorKind::If {
                then_target,
                else_target,
                ..
            } => vec![then_target, else_target],
            TerminatorKind::Return => vec![],
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            TerminatorKind::Goto { target } => write!(f, "goto {target}"),
            TerminatorKind::If {
                cond,
                then_target,
                else_target,
            } => write!(f, "if {cond} then {then_target} else {else_target}"),
            TerminatorKind::Return => write!(f, "return"),
        }
    }
}
