// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{
    abstract_interpretation::{AnalysisResult, FixpointEngine},
    config,
    domains::{
        bounds::{
            interference::InterferenceInfo,
            report::{pretty_access, AccessReport, BoundsReport, Verdict},
            state::{BoundsState, SharedInvariants, ThreadContext},
            VarMap,
        },
        numeric::{IntervalDomain, NumericDomain, PolyhedraDomain},
        LockSetAnalysis, LockSetState,
    },
    PointwiseState,
};
use cir::{BasicBlock, Body, Location, Program, StatementKind, ThreadId};
use log::{debug, info};
use std::cell::RefCell;
use std::marker::PhantomData;

/// The thread-modular out-of-bounds check over a chosen numeric domain.
///
/// One sequential fixpoint per thread, iterated in interference rounds:
/// each round reruns every thread against the invariants the previous round
/// published, until the exchanged invariants stabilize. Verdicts are taken
/// from the stable round, so they are independent of thread and worklist
/// order.
pub struct BoundsAnalysis<'a, D: NumericDomain> {
    program: &'a Program,
    _domain: PhantomData<D>,
}

impl<'a, D: NumericDomain> BoundsAnalysis<'a, D> {
    pub fn new(program: &'a Program) -> Self {
        BoundsAnalysis {
            program,
            _domain: PhantomData,
        }
    }

    pub fn run_analysis(&self) -> AnalysisResult<BoundsReport> {
        let program = self.program;
        let varmap = VarMap::new(program);
        let mut locksets = Vec::with_capacity(program.threads.len());
        for thread in program.thread_ids() {
            locksets.push(LockSetAnalysis::new(program, thread).run_fwd_analysis()?);
        }
        let interference = InterferenceInfo::collect(program, &varmap, &locksets)?;
        let exchange = RefCell::new(SharedInvariants::<D>::initial(program, &varmap));

        let rounds_bound = config::interference_rounds_bound().max(1);
        let widen_after = config::widening_threshold();
        let mut round: u32 = 0;
        loop {
            round += 1;
            let previous = exchange.borrow().clone();
            let accesses = self.run_round(&varmap, &interference, &locksets, &exchange)?;
            if *exchange.borrow() == previous {
                info!("bounds analysis stabilized after {round} interference round(s)");
                return Ok(BoundsReport::new(D::NAME, accesses));
            }
            if round >= rounds_bound {
                // Non-convergence degrades to "cannot prove", never to an
                // error.
                info!("interference round bound reached, degrading invariants to top");
                exchange.borrow_mut().set_top(&varmap);
                let accesses = self.run_round(&varmap, &interference, &locksets, &exchange)?;
                return Ok(BoundsReport::new(D::NAME, accesses));
            }
            if round > widen_after {
                exchange.borrow_mut().widen_against(&previous);
            }
            debug!("interference round {round} changed the invariants, rerunning");
        }
    }

    /// Run every thread's fixpoint once against the current invariants and
    /// collect the verdicts of this round.
    fn run_round(
        &self,
        varmap: &VarMap,
        interference: &InterferenceInfo,
        locksets: &[PointwiseState<LockSetState>],
        exchange: &RefCell<SharedInvariants<D>>,
    ) -> AnalysisResult<Vec<AccessReport>> {
        let program = self.program;
        let mut accesses = Vec::new();
        for thread in program.thread_ids() {
            let cx = ThreadContext {
                program,
                thread,
                varmap,
                interference,
                lockset: &locksets[thread.0],
                exchange,
            };
            let engine = ThreadBoundsAnalysis { cx: &cx };
            let result = engine.run_fwd_analysis()?;
            self.collect_verdicts(&cx, &result, &mut accesses)?;
        }
        Ok(accesses)
    }

    fn collect_verdicts(
        &self,
        cx: &ThreadContext<'_, D>,
        result: &PointwiseState<BoundsState<'_, D>>,
        accesses: &mut Vec<AccessReport>,
    ) -> AnalysisResult<()> {
        let program = self.program;
        let body = cx.body();
        let thread_name = &program.thread(cx.thread).name;
        for block in body.block_ids() {
            for (statement_index, statement) in body[block].statements.iter().enumerate() {
                let StatementKind::Index {
                    region,
                    offset,
                    kind,
                } = &statement.kind
                else {
                    continue;
                };
                let location = Location {
                    block,
                    statement_index,
                };
                let mut state = match result.lookup_before(location) {
                    Some(state) => state.clone(),
                    None => BoundsState::bottom(cx),
                };
                // The same read-havoc the transfer functions apply, so the
                // verdict never trusts an unstable variable.
                state.prepare_reads(location)?;
                let facts = state.check_access(*region, offset, location)?;
                let verdict = if facts.allocation_live && facts.lower && facts.upper {
                    Verdict::NoWarn
                } else {
                    Verdict::Warn
                };
                accesses.push(AccessReport {
                    thread: thread_name.clone(),
                    location,
                    statement: pretty_access(program, cx.thread, *region, offset, *kind),
                    region: program.regions[region.0].name.clone(),
                    verdict,
                    lower_bound_proved: facts.lower,
                    upper_bound_proved: facts.upper,
                    allocation_proved: facts.allocation_live,
                });
            }
        }
        Ok(())
    }
}

/// One thread's forward fixpoint of the bounds check.
struct ThreadBoundsAnalysis<'a, D: NumericDomain> {
    cx: &'a ThreadContext<'a, D>,
}

impl<'a, D: NumericDomain> FixpointEngine<'a> for ThreadBoundsAnalysis<'a, D> {
    type State = BoundsState<'a, D>;

    fn body(&self) -> &'a Body {
        self.cx.body()
    }

    fn thread_id(&self) -> ThreadId {
        self.cx.thread
    }

    fn new_bottom(&self) -> Self::State {
        BoundsState::bottom(self.cx)
    }

    fn new_initial(&self) -> Self::State {
        BoundsState::initial(self.cx)
    }

    fn need_to_widen(counter: u32) -> bool {
        counter >= config::widening_threshold()
    }

    fn apply_statement_effect(
        &self,
        state: &mut Self::State,
        location: Location,
    ) -> AnalysisResult<()> {
        state.apply_statement_effect(location)
    }

    fn apply_terminator_effect(
        &self,
        state: &Self::State,
        location: Location,
    ) -> AnalysisResult<Vec<(BasicBlock, Self::State)>> {
        state.apply_terminator_effect(location)
    }
}

/// Run the out-of-bounds check with the configured numeric domain.
///
/// This is the configuration-time dynamic dispatch over the domain choice;
/// unknown names were already rejected by `config::parse_domain`.
pub fn run_bounds_check(program: &Program) -> AnalysisResult<BoundsReport> {
    match config::parse_domain()? {
        config::DomainName::Interval => {
            BoundsAnalysis::<IntervalDomain>::new(program).run_analysis()
        }
        config::DomainName::Polyhedra => {
            BoundsAnalysis::<PolyhedraDomain>::new(program).run_analysis()
        }
    }
}
