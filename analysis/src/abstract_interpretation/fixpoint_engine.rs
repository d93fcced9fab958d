// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{
    abstract_interpretation::{AbstractState, AnalysisResult},
    AnalysisError, PointwiseState,
};
use cir::{BasicBlock, Body, Location, ThreadId, START_BLOCK};
use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// A forward fixpoint computation over one thread's CFG.
///
/// Implementors provide the lattice (via [`AbstractState`]) and the transfer
/// functions; `run_fwd_analysis` supplies the worklist iteration, the
/// per-block revisit counters and the widening trigger. The result is
/// independent of the worklist order (confluence), so verdicts derived from
/// it are deterministic.
pub trait FixpointEngine<'a> {
    type State: AbstractState;

    fn body(&self) -> &'a Body;

    fn thread_id(&self) -> ThreadId;

    /// The bottom element: no reachable concrete state.
    fn new_bottom(&self) -> Self::State;

    /// The state on entry to the start block.
    fn new_initial(&self) -> Self::State;

    /// Whether to widen a block entry that already changed `counter` times.
    fn need_to_widen(counter: u32) -> bool;

    fn apply_statement_effect(
        &self,
        state: &mut Self::State,
        location: Location,
    ) -> AnalysisResult<()>;

    fn apply_terminator_effect(
        &self,
        state: &Self::State,
        location: Location,
    ) -> AnalysisResult<Vec<(BasicBlock, Self::State)>>;

    /// Produces the abstract state before every statement and on every CFG
    /// edge of `self.body()`.
    fn run_fwd_analysis(&self) -> AnalysisResult<PointwiseState<'a, Self::State>> {
        let body = self.body();
        let mut p_state = PointwiseState::new(body);
        p_state.set_before(
            Location {
                block: START_BLOCK,
                statement_index: 0,
            },
            self.new_initial(),
        );

        // Process every block at least once, so that unreachable blocks also
        // end up with (bottom) states recorded.
        let mut work_queue: VecDeque<BasicBlock> = body.block_ids().collect();
        let mut queued: FxHashSet<BasicBlock> = body.block_ids().collect();
        let mut widen_counters: FxHashMap<BasicBlock, u32> = FxHashMap::default();

        while let Some(block) = work_queue.pop_front() {
            queued.remove(&block);

            let entry_location = Location {
                block,
                statement_index: 0,
            };
            let mut state = match p_state.lookup_before(entry_location) {
                Some(state) => state.clone(),
                None => self.new_bottom(),
            };

            let num_statements = body[block].statements.len();
            let mut location = entry_location;
            while location.statement_index < num_statements {
                p_state.set_before(location, state.clone());
                self.apply_statement_effect(&mut state, location)?;
                location = location.successor_within_block();
            }
            // `location` now points to the terminator.
            p_state.set_before(location, state.clone());

            let next_states = self.apply_terminator_effect(&state, location)?;
            // Multiple edges to the same successor are joined first.
            let mut joined_states: Vec<(BasicBlock, Self::State)> = Vec::new();
            for (target, target_state) in next_states {
                match joined_states.iter_mut().find(|(t, _)| *t == target) {
                    Some((_, joined)) => joined.join(&target_state),
                    None => joined_states.push((target, target_state)),
                }
            }
            for successor in body[block].terminator.successors() {
                if !joined_states.iter().any(|(t, _)| *t == successor) {
                    return Err(AnalysisError::SuccessorWithoutState(
                        self.thread_id(),
                        location,
                        successor,
                    ));
                }
            }

            let map_after = p_state.lookup_mut_after_block(block);
            map_after.clear();
            for (target, target_state) in &joined_states {
                map_after.insert(*target, target_state.clone());
            }

            for (target, edge_state) in joined_states {
                let target_location = Location {
                    block: target,
                    statement_index: 0,
                };
                let old_state = p_state.lookup_before(target_location).cloned();
                let new_state = match old_state {
                    None => Some(edge_state),
                    Some(old_state) => {
                        let mut new_state = old_state.clone();
                        new_state.join(&edge_state);
                        let counter = widen_counters.entry(target).or_insert(0);
                        if Self::need_to_widen(*counter) {
                            new_state.widen(&old_state);
                        }
                        if new_state == old_state {
                            None
                        } else {
                            *counter += 1;
                            Some(new_state)
                        }
                    }
                };
                if let Some(new_state) = new_state {
                    trace!(
                        "thread {} block {target} entry state changed, re-queueing",
                        self.thread_id()
                    );
                    p_state.set_before(target_location, new_state);
                    if queued.insert(target) {
                        work_queue.push_back(target);
                    }
                }
            }
        }

        Ok(p_state)
    }
}
