// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{abstract_interpretation::AbstractState, AnalysisError};
use cir::{BasicBlock, Body, Location, LockId, StatementKind, ThreadId};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// Synchronization facts at a program point of one thread: the locks that
/// are definitely held, the threads that may already have been spawned and
/// the threads that have definitely been joined.
///
/// `held` and `joined` are must-sets (join intersects), `spawned` is a
/// may-set (join unites). Bottom is encoded the usual way for must-sets:
/// everything held, everything joined, nothing spawned.
#[derive(Clone, PartialEq, Eq)]
pub struct LockSetState {
    pub(crate) held: BTreeSet<LockId>,
    pub(crate) spawned: BTreeSet<ThreadId>,
    pub(crate) joined: BTreeSet<ThreadId>,
    num_locks: usize,
    num_threads: usize,
}

impl fmt::Debug for LockSetState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LockSetState")
            .field("held", &self.held)
            .field("spawned", &self.spawned)
            .field("joined", &self.joined)
            .finish()
    }
}

impl Serialize for LockSetState {
    fn serialize<Se: Serializer>(&self, serializer: Se) -> Result<Se::Ok, Se::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        let held: Vec<String> = self.held.iter().map(|l| format!("{l}")).collect();
        let spawned: Vec<String> = self.spawned.iter().map(|t| format!("{t}")).collect();
        let joined: Vec<String> = self.joined.iter().map(|t| format!("{t}")).collect();
        map.serialize_entry("held", &held)?;
        map.serialize_entry("spawned", &spawned)?;
        map.serialize_entry("joined", &joined)?;
        map.end()
    }
}

impl LockSetState {
    pub fn new_bottom(num_locks: usize, num_threads: usize) -> Self {
        LockSetState {
            held: (0..num_locks).map(LockId).collect(),
            spawned: BTreeSet::new(),
            joined: (0..num_threads).map(ThreadId).collect(),
            num_locks,
            num_threads,
        }
    }

    pub fn new_initial(num_locks: usize, num_threads: usize) -> Self {
        LockSetState {
            held: BTreeSet::new(),
            spawned: BTreeSet::new(),
            joined: BTreeSet::new(),
            num_locks,
            num_threads,
        }
    }

    /// The weakest assumption: no locks held, every thread possibly
    /// running. Used as a fallback where no synchronization facts were
    /// recorded.
    pub fn new_conservative(num_locks: usize, num_threads: usize) -> Self {
        LockSetState {
            held: BTreeSet::new(),
            spawned: (0..num_threads).map(ThreadId).collect(),
            joined: BTreeSet::new(),
            num_locks,
            num_threads,
        }
    }

    pub fn held(&self) -> &BTreeSet<LockId> {
        &self.held
    }

    /// Whether `thread` may be running concurrently at this point.
    pub fn may_run(&self, thread: ThreadId) -> bool {
        self.spawned.contains(&thread) && !self.joined.contains(&thread)
    }

    /// The set of threads that may be running concurrently at this point.
    pub fn running(&self) -> BTreeSet<ThreadId> {
        self.spawned
            .iter()
            .copied()
            .filter(|t| !self.joined.contains(t))
            .collect()
    }

    /// The state right after acquiring `lock` here.
    #[must_use]
    pub fn with_lock(&self, lock: LockId) -> Self {
        let mut state = self.clone();
        state.held.insert(lock);
        state
    }

    pub(super) fn apply_statement_effect(
        &mut self,
        location: Location,
        body: &Body,
    ) -> Result<(), AnalysisError> {
        let statement = &body[location.block].statements[location.statement_index];
        match statement.kind {
            StatementKind::Lock(lock) => {
                self.held.insert(lock);
            }
            StatementKind::Unlock(lock) => {
                self.held.remove(&lock);
            }
            StatementKind::Spawn(thread) => {
                self.spawned.insert(thread);
                self.joined.remove(&thread);
            }
            StatementKind::Join(thread) => {
                self.joined.insert(thread);
            }
            _ => {}
        }
        Ok(())
    }

    pub(super) fn apply_terminator_effect(
        &self,
        location: Location,
        body: &Body,
    ) -> Result<Vec<(BasicBlock, Self)>, AnalysisError> {
        let terminator = &body[location.block].terminator;
        Ok(terminator
            .successors()
            .into_iter()
            .map(|bb| (bb, self.clone()))
            .collect())
    }
}

impl AbstractState for LockSetState {
    fn is_bottom(&self) -> bool {
        self.held.len() == self.num_locks
            && self.joined.len() == self.num_threads
            && self.spawned.is_empty()
    }

    fn join(&mut self, other: &Self) {
        self.held.retain(|lock| other.held.contains(lock));
        self.joined.retain(|thread| other.joined.contains(thread));
        self.spawned.extend(other.spawned.iter().copied());
    }

    fn widen(&mut self, _previous: &Self) {
        // The lattice is finite; the engine never widens this analysis.
        unimplemented!()
    }
}
