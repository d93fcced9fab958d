// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{
    abstract_interpretation::AnalysisResult,
    domains::{bounds::VarMap, numeric::VarId, LockSetState},
    PointwiseState,
};
use cir::{Location, LockId, Program, Region, StatementKind, ThreadId, Var};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;

/// One static write to a shared variable (or deallocation of a region),
/// annotated with the synchronization facts at the write site.
struct WriteEvent {
    thread: ThreadId,
    /// Locks definitely held at the write.
    held: BTreeSet<LockId>,
    /// For writes of the entry thread: the threads that may be running at
    /// the write site. `None` for writes of spawned threads, which are
    /// conservatively concurrent with everybody.
    running: Option<BTreeSet<ThreadId>>,
}

impl WriteEvent {
    /// Whether this write can interleave with `reader` while the reader
    /// holds the locks of `reader_state`.
    fn is_concurrent_with(&self, reader: ThreadId, reader_state: &LockSetState) -> bool {
        if self.thread == reader {
            return false;
        }
        if self.held.iter().any(|lock| reader_state.held().contains(lock)) {
            // Mutually excluded while the reader holds the common lock; the
            // acquire-time invariant import covers the window before.
            return false;
        }
        match &self.running {
            Some(running) => running.contains(&reader),
            None => {
                if reader == ThreadId(0) {
                    // The reader is the entry thread and knows whether the
                    // writing thread may be running at all.
                    reader_state.may_run(self.thread)
                } else {
                    true
                }
            }
        }
    }
}

/// Which thread may write which shared variable under which locks; the
/// stability oracle of the bounds analysis.
pub(super) struct InterferenceInfo {
    var_writes: FxHashMap<VarId, Vec<WriteEvent>>,
    region_deallocs: FxHashMap<Region, Vec<WriteEvent>>,
    write_vars: Vec<FxHashSet<VarId>>,
    dealloc_regions: Vec<FxHashSet<Region>>,
}

impl InterferenceInfo {
    pub fn collect(
        program: &Program,
        varmap: &VarMap,
        locksets: &[PointwiseState<LockSetState>],
    ) -> AnalysisResult<Self> {
        let mut info = InterferenceInfo {
            var_writes: FxHashMap::default(),
            region_deallocs: FxHashMap::default(),
            write_vars: vec![FxHashSet::default(); program.threads.len()],
            dealloc_regions: vec![FxHashSet::default(); program.threads.len()],
        };
        let entry = program.entry_thread();

        for thread_id in program.thread_ids() {
            let body = &program.thread(thread_id).body;
            for block in body.block_ids() {
                for (statement_index, statement) in body[block].statements.iter().enumerate() {
                    let location = Location {
                        block,
                        statement_index,
                    };
                    let written_var = match &statement.kind {
                        StatementKind::Assign(Var::Global(global), _) => {
                            Some(varmap.global(*global))
                        }
                        StatementKind::Alloc { region, .. } => {
                            Some(varmap.length_of(*region, thread_id, location)?)
                        }
                        _ => None,
                    };
                    let dealloc_region = match &statement.kind {
                        StatementKind::Dealloc { region } => {
                            // Length lookup also validates the region here.
                            varmap.length_of(*region, thread_id, location)?;
                            Some(*region)
                        }
                        _ => None,
                    };
                    if written_var.is_none() && dealloc_region.is_none() {
                        continue;
                    }
                    let Some(state) = locksets[thread_id.0].lookup_before(location) else {
                        continue;
                    };
                    let event = || WriteEvent {
                        thread: thread_id,
                        held: state.held().clone(),
                        running: (thread_id == entry).then(|| state.running()),
                    };
                    if let Some(var) = written_var {
                        info.write_vars[thread_id.0].insert(var);
                        info.var_writes.entry(var).or_default().push(event());
                    }
                    if let Some(region) = dealloc_region {
                        info.dealloc_regions[thread_id.0].insert(region);
                        info.region_deallocs.entry(region).or_default().push(event());
                    }
                }
            }
        }
        Ok(info)
    }

    /// Whether `var` may be changed behind the back of `reader` at a point
    /// with synchronization facts `reader_state`. Unstable variables must
    /// not be trusted: their value is re-read from the unprotected
    /// invariant at every use.
    pub fn is_unstable_var(
        &self,
        var: VarId,
        reader: ThreadId,
        reader_state: &LockSetState,
    ) -> bool {
        self.var_writes.get(&var).is_some_and(|events| {
            events
                .iter()
                .any(|event| event.is_concurrent_with(reader, reader_state))
        })
    }

    /// Whether `region` may be deallocated behind the back of `reader`.
    pub fn is_unstable_region(
        &self,
        region: Region,
        reader: ThreadId,
        reader_state: &LockSetState,
    ) -> bool {
        self.region_deallocs.get(&region).is_some_and(|events| {
            events
                .iter()
                .any(|event| event.is_concurrent_with(reader, reader_state))
        })
    }

    /// Shared variables `thread` may write anywhere in its body.
    pub fn write_vars(&self, thread: ThreadId) -> &FxHashSet<VarId> {
        &self.write_vars[thread.0]
    }

    /// Regions `thread` may deallocate anywhere in its body.
    pub fn dealloc_regions(&self, thread: ThreadId) -> &FxHashSet<Region> {
        &self.dealloc_regions[thread.0]
    }
}
