// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{
    abstract_interpretation::{AnalysisResult, FixpointEngine},
    domains::LockSetState,
};
use cir::{BasicBlock, Body, Location, Program, ThreadId};

/// Per-thread forward analysis of synchronization facts, consumed by the
/// bounds check to decide which shared variables can be trusted at a
/// given point.
pub struct LockSetAnalysis<'a> {
    program: &'a Program,
    thread: ThreadId,
}

impl<'a> LockSetAnalysis<'a> {
    pub fn new(program: &'a Program, thread: ThreadId) -> Self {
        LockSetAnalysis { program, thread }
    }
}

impl<'a> FixpointEngine<'a> for LockSetAnalysis<'a> {
    type State = LockSetState;

    fn body(&self) -> &'a Body {
        &self.program.thread(self.thread).body
    }

    fn thread_id(&self) -> ThreadId {
        self.thread
    }

    fn new_bottom(&self) -> Self::State {
        LockSetState::new_bottom(self.program.locks.len(), self.program.threads.len())
    }

    fn new_initial(&self) -> Self::State {
        LockSetState::new_initial(self.program.locks.len(), self.program.threads.len())
    }

    fn need_to_widen(_counter: u32) -> bool {
        // The lattice is finite and of small height.
        false
    }

    fn apply_statement_effect(
        &self,
        state: &mut Self::State,
        location: Location,
    ) -> AnalysisResult<()> {
        state.apply_statement_effect(location, self.body())
    }

    fn apply_terminator_effect(
        &self,
        state: &Self::State,
        location: Location,
    ) -> AnalysisResult<Vec<(BasicBlock, Self::State)>> {
        state.apply_terminator_effect(location, self.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstract_interpretation::AbstractState;
    use cir::{
        BodyBuilder, GlobalDecl, LockDecl, LockId, StatementKind, Thread,
    };

    fn single_thread_program(body: cir::Body) -> Program {
        Program {
            globals: vec![GlobalDecl {
                name: "g".to_string(),
                init: Some(0),
            }],
            locks: vec![
                LockDecl {
                    name: "a".to_string(),
                },
                LockDecl {
                    name: "b".to_string(),
                },
            ],
            regions: vec![],
            threads: vec![Thread {
                name: "main".to_string(),
                body,
            }],
        }
    }

    #[test]
    fn held_locks_are_a_must_set_across_joins() {
        // One branch holds lock a, the other holds a and b; after the merge
        // only a is definitely held.
        let mut b = BodyBuilder::new();
        let entry = b.new_block();
        let left = b.new_block();
        let right = b.new_block();
        let merge = b.new_block();

        b.push(entry, StatementKind::Lock(LockId(0)));
        b.branch(
            entry,
            cir::Comparison::new(
                cir::LinearExpr::global(cir::GlobalId(0)),
                cir::CmpOp::Lt,
                cir::LinearExpr::constant(0),
            ),
            left,
            right,
        );
        b.goto(left, merge);
        b.push(right, StatementKind::Lock(LockId(1)));
        b.goto(right, merge);
        b.push(merge, StatementKind::Nop);
        b.ret(merge);

        let program = single_thread_program(b.finish());
        let analysis = LockSetAnalysis::new(&program, ThreadId(0));
        let result = analysis.run_fwd_analysis().unwrap();

        let merge_entry = Location {
            block: cir::BasicBlock(3),
            statement_index: 0,
        };
        let state = result.lookup_before(merge_entry).unwrap();
        assert!(state.held().contains(&LockId(0)));
        assert!(!state.held().contains(&LockId(1)));
        assert!(!state.is_bottom());
    }

    #[test]
    fn spawn_and_join_track_concurrency() {
        let mut b = BodyBuilder::new();
        let entry = b.new_block();
        b.push(entry, StatementKind::Nop);
        b.push(entry, StatementKind::Spawn(ThreadId(1)));
        b.push(entry, StatementKind::Join(ThreadId(1)));
        b.push(entry, StatementKind::Nop);
        b.ret(entry);

        let mut program = single_thread_program(b.finish());
        let mut other = BodyBuilder::new();
        let ob = other.new_block();
        other.ret(ob);
        program.threads.push(Thread {
            name: "other".to_string(),
            body: other.finish(),
        });

        let analysis = LockSetAnalysis::new(&program, ThreadId(0));
        let result = analysis.run_fwd_analysis().unwrap();
        let at = |statement_index| Location {
            block: cir::BasicBlock(0),
            statement_index,
        };

        // Before the spawn the other thread cannot be running, between
        // spawn and join it may be, afterwards it may not.
        assert!(!result.lookup_before(at(1)).unwrap().may_run(ThreadId(1)));
        assert!(result.lookup_before(at(2)).unwrap().may_run(ThreadId(1)));
        assert!(!result.lookup_before(at(3)).unwrap().may_run(ThreadId(1)));
    }
}
