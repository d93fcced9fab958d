// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::body::{StatementKind, TerminatorKind};
use crate::expr::Var;
use crate::Body;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a global variable in [`Program::globals`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlobalId(pub usize);

/// Index of a lock in [`Program::locks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LockId(pub usize);

/// Index of a heap region in [`Program::regions`].
///
/// A region is the target of one global pointer variable; allocations and
/// indexed accesses are expressed against it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Region(pub usize);

/// Index of a thread in [`Program::threads`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub usize);

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "lock{}", self.0)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalDecl {
    pub name: String,
    /// Initial value at program start; `None` leaves the global unconstrained.
    #[serde(default)]
    pub init: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockDecl {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDecl {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub name: String,
    pub body: Body,
}

/// A whole program: the shared-variable tables plus one CFG per thread.
///
/// By convention `threads[0]` is the program entry thread; all other threads
/// start executing at their `Spawn` site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub globals: Vec<GlobalDecl>,
    pub locks: Vec<LockDecl>,
    pub regions: Vec<RegionDecl>,
    pub threads: Vec<Thread>,
}

impl Program {
    pub fn entry_thread(&self) -> ThreadId {
        ThreadId(0)
    }

    pub fn thread(&self, thread: ThreadId) -> &Thread {
        &self.threads[thread.0]
    }

    pub fn thread_ids(&self) -> impl Iterator<Item = ThreadId> {
        (0..self.threads.len()).map(ThreadId)
    }

    /// Structural well-formedness of a deserialized model: every index in
    /// every statement and terminator must point into the program tables.
    /// Deeper semantic errors (e.g. indexing an unregistered region) are
    /// reported by the analysis itself.
    pub fn validate(&self) -> Result<(), String> {
        if self.threads.is_empty() {
            return Err("program has no threads".to_string());
        }
        for (t, thread) in self.threads.iter().enumerate() {
            let body = &thread.body;
            if body.basic_blocks.is_empty() {
                return Err(format!("thread '{}' has an empty body", thread.name));
            }
            for (b, block) in body.basic_blocks.iter().enumerate() {
                for statement in &block.statements {
                    self.validate_statement(&statement.kind, &thread.name)?;
                    let vars = statement
                        .kind
                        .read_vars()
                        .into_iter()
                        .chain(statement.kind.written_var());
                    self.validate_vars(vars, &thread.name, t)?;
                }
                for target in block.terminator.successors() {
                    if target.0 >= body.basic_blocks.len() {
                        return Err(format!(
                            "thread '{}': terminator of bb{} targets nonexistent {}",
                            thread.name, b, target
                        ));
                    }
                }
                if let TerminatorKind::If { ref cond, .. } = block.terminator.kind {
                    self.validate_vars(cond.lhs.vars().chain(cond.rhs.vars()), &thread.name, t)?;
                }
            }
        }
        Ok(())
    }

    fn validate_statement(&self, kind: &StatementKind, thread_name: &str) -> Result<(), String> {
        let check_region = |region: Region| {
            if region.0 >= self.regions.len() {
                Err(format!("thread '{thread_name}': unknown region {region}"))
            } else {
                Ok(())
            }
        };
        match *kind {
            StatementKind::Alloc { region, .. }
            | StatementKind::Dealloc { region }
            | StatementKind::Index { region, .. } => check_region(region)?,
            StatementKind::Lock(lock) | StatementKind::Unlock(lock) => {
                if lock.0 >= self.locks.len() {
                    return Err(format!("thread '{thread_name}': unknown lock {lock}"));
                }
            }
            StatementKind::Spawn(spawned) | StatementKind::Join(spawned) => {
                if spawned.0 >= self.threads.len() {
                    return Err(format!("thread '{thread_name}': unknown thread {spawned}"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn validate_vars<'a>(
        &self,
        vars: impl Iterator<Item = &'a Var>,
        thread_name: &str,
        thread_index: usize,
    ) -> Result<(), String> {
        for var in vars {
            match *var {
                Var::Global(global) => {
                    if global.0 >= self.globals.len() {
                        return Err(format!("thread '{thread_name}': unknown global {global}"));
                    }
                }
                Var::Local(local) => {
                    if local.0 >= self.threads[thread_index].body.local_decls.len() {
                        return Err(format!("thread '{thread_name}': unknown local {local}"));
                    }
                }
            }
        }
        Ok(())
    }
}
