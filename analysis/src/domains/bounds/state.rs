// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{
    abstract_interpretation::{AbstractState, AnalysisResult},
    domains::{
        bounds::{interference::InterferenceInfo, VarMap},
        numeric::{LinCon, LinExpr, NumericDomain, VarId},
        LockSetState,
    },
    PointwiseState,
};
use cir::{
    BasicBlock, Body, Comparison, Location, LockId, Program, Region, Rvalue, StatementKind,
    TerminatorKind, ThreadId,
};
use rustc_hash::FxHashSet;
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;

/// The facts about shared memory exchanged at synchronization points: a
/// numeric state restricted to the shared variables, plus the set of
/// definitely-allocated regions.
#[derive(Clone, PartialEq, Eq)]
pub(super) struct SharedFacts<D: NumericDomain> {
    pub numeric: D,
    pub live: BTreeSet<Region>,
}

impl<D: NumericDomain> SharedFacts<D> {
    fn join(&mut self, other: &Self) {
        if other.numeric.is_bottom() {
            return;
        }
        if self.numeric.is_bottom() {
            *self = other.clone();
            return;
        }
        self.numeric.join(&other.numeric);
        self.live.retain(|region| other.live.contains(region));
    }
}

/// The exchanged invariant state, keyed by lock identity: never an ambient
/// mutable structure, threads only see it through the explicit acquire,
/// release and spawn exchange points.
#[derive(Clone, PartialEq, Eq)]
pub(super) struct SharedInvariants<D: NumericDomain> {
    /// Per lock: the facts guaranteed to hold about shared variables
    /// whenever the lock is acquired (base case: the program-start state).
    protected: Vec<SharedFacts<D>>,
    /// Per thread: the shared facts at its spawn sites; `None` until the
    /// thread is spawned somewhere.
    entry: Vec<Option<SharedFacts<D>>>,
    /// Per variable: bounds that hold at all times, regardless of locks.
    unprotected: Vec<(Option<i64>, Option<i64>)>,
}

impl<D: NumericDomain> SharedInvariants<D> {
    pub fn initial(program: &Program, varmap: &VarMap) -> Self {
        let mut numeric = D::top(varmap.num_vars());
        let mut unprotected = vec![(None, None); varmap.num_vars()];
        for (i, global) in program.globals.iter().enumerate() {
            if let Some(init) = global.init {
                let var = varmap.global(cir::GlobalId(i));
                numeric.guard(&LinCon::eq(LinExpr::var(var), LinExpr::constant(init)));
                unprotected[var.0] = (Some(init), Some(init));
            }
        }
        let start = SharedFacts {
            numeric,
            live: BTreeSet::new(),
        };
        SharedInvariants {
            protected: vec![start; program.locks.len()],
            entry: vec![None; program.threads.len()],
            unprotected,
        }
    }

    pub fn unprotected_bounds(&self, var: VarId) -> (Option<i64>, Option<i64>) {
        self.unprotected[var.0]
    }

    /// Hull the post-write bounds of `var` into the unprotected invariant.
    pub fn record_write_bounds(&mut self, var: VarId, bounds: (Option<i64>, Option<i64>)) {
        let (lo, hi) = &mut self.unprotected[var.0];
        *lo = match (*lo, bounds.0) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        };
        *hi = match (*hi, bounds.1) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
    }

    pub fn protected(&self, lock: LockId) -> &SharedFacts<D> {
        &self.protected[lock.0]
    }

    pub fn entry(&self, thread: ThreadId) -> Option<&SharedFacts<D>> {
        self.entry[thread.0].as_ref()
    }

    pub fn publish_protected(&mut self, lock: LockId, facts: &SharedFacts<D>) {
        self.protected[lock.0].join(facts);
    }

    pub fn publish_all_protected(&mut self, facts: &SharedFacts<D>) {
        for protected in &mut self.protected {
            protected.join(facts);
        }
    }

    pub fn publish_entry(&mut self, thread: ThreadId, facts: &SharedFacts<D>) {
        let slot = &mut self.entry[thread.0];
        if let Some(existing) = slot {
            existing.join(facts);
        } else {
            *slot = Some(facts.clone());
        }
    }

    /// Widen the invariants of this round against the previous round, to
    /// force stabilization of the interference iteration.
    pub fn widen_against(&mut self, previous: &Self) {
        for (facts, prev) in self.protected.iter_mut().zip(&previous.protected) {
            facts.numeric.widen(&prev.numeric);
        }
        for (facts, prev) in self.entry.iter_mut().zip(&previous.entry) {
            if let (Some(facts), Some(prev)) = (facts, prev) {
                facts.numeric.widen(&prev.numeric);
            }
        }
        for (bounds, prev) in self.unprotected.iter_mut().zip(&previous.unprotected) {
            bounds.0 = match (bounds.0, prev.0) {
                (Some(new), Some(old)) if new >= old => Some(old),
                _ => None,
            };
            bounds.1 = match (bounds.1, prev.1) {
                (Some(new), Some(old)) if new <= old => Some(old),
                _ => None,
            };
        }
    }

    /// Degrade everything to top; the iteration-bound fallback that turns
    /// non-convergence into "cannot prove" instead of an error.
    pub fn set_top(&mut self, varmap: &VarMap) {
        let top = SharedFacts {
            numeric: D::top(varmap.num_vars()),
            live: BTreeSet::new(),
        };
        for facts in &mut self.protected {
            *facts = top.clone();
        }
        for entry in &mut self.entry {
            *entry = Some(top.clone());
        }
        for bounds in &mut self.unprotected {
            *bounds = (None, None);
        }
    }
}

/// Everything a thread's transfer functions need to see: the program, the
/// memory model, the stability oracle, the thread's synchronization facts
/// and the exchanged invariants.
pub(super) struct ThreadContext<'a, D: NumericDomain> {
    pub program: &'a Program,
    pub thread: ThreadId,
    pub varmap: &'a VarMap,
    pub interference: &'a InterferenceInfo,
    pub lockset: &'a PointwiseState<'a, LockSetState>,
    pub exchange: &'a RefCell<SharedInvariants<D>>,
}

impl<'a, D: NumericDomain> ThreadContext<'a, D> {
    pub fn body(&self) -> &'a Body {
        &self.program.thread(self.thread).body
    }
}

/// Outcome of the three entailment queries for one access.
pub(super) struct AccessFacts {
    pub allocation_live: bool,
    pub lower: bool,
    pub upper: bool,
}

/// The abstract state of the bounds check: a numeric domain state over the
/// dense variable space plus the definitely-allocated regions.
pub struct BoundsState<'a, D: NumericDomain> {
    numeric: D,
    live: BTreeSet<Region>,
    cx: &'a ThreadContext<'a, D>,
}

impl<'a, D: NumericDomain> Clone for BoundsState<'a, D> {
    fn clone(&self) -> Self {
        BoundsState {
            numeric: self.numeric.clone(),
            live: self.live.clone(),
            cx: self.cx,
        }
    }
}

impl<'a, D: NumericDomain> PartialEq for BoundsState<'a, D> {
    fn eq(&self, other: &Self) -> bool {
        // Ignore the context.
        self.numeric == other.numeric && self.live == other.live
    }
}

impl<'a, D: NumericDomain> Eq for BoundsState<'a, D> {}

impl<'a, D: NumericDomain> fmt::Debug for BoundsState<'a, D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BoundsState")
            .field("numeric", &self.numeric)
            .field("live", &self.live)
            .finish()
    }
}

impl<'a, D: NumericDomain> Serialize for BoundsState<'a, D> {
    fn serialize<Se: Serializer>(&self, serializer: Se) -> Result<Se::Ok, Se::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("numeric", &self.numeric)?;
        let live: Vec<String> = self
            .live
            .iter()
            .map(|region| self.cx.program.regions[region.0].name.clone())
            .collect();
        map.serialize_entry("live", &live)?;
        map.end()
    }
}

impl<'a, D: NumericDomain> BoundsState<'a, D> {
    pub(super) fn bottom(cx: &'a ThreadContext<'a, D>) -> Self {
        BoundsState {
            numeric: D::bottom(cx.varmap.num_vars()),
            live: BTreeSet::new(),
            cx,
        }
    }

    pub(super) fn initial(cx: &'a ThreadContext<'a, D>) -> Self {
        if cx.thread == cx.program.entry_thread() {
            let mut numeric = D::top(cx.varmap.num_vars());
            for (i, global) in cx.program.globals.iter().enumerate() {
                if let Some(init) = global.init {
                    let var = cx.varmap.global(cir::GlobalId(i));
                    numeric.guard(&LinCon::eq(LinExpr::var(var), LinExpr::constant(init)));
                }
            }
            BoundsState {
                numeric,
                live: BTreeSet::new(),
                cx,
            }
        } else {
            match cx.exchange.borrow().entry(cx.thread) {
                Some(facts) => BoundsState {
                    numeric: facts.numeric.clone(),
                    live: facts.live.clone(),
                    cx,
                },
                None => Self::bottom(cx),
            }
        }
    }

    fn lockset_at(&self, location: Location) -> LockSetState {
        self.cx
            .lockset
            .lookup_before(location)
            .cloned()
            .unwrap_or_else(|| {
                LockSetState::new_conservative(
                    self.cx.program.locks.len(),
                    self.cx.program.threads.len(),
                )
            })
    }

    /// Forget a variable and re-admit only its unprotected all-times bounds.
    fn havoc_with_unprotected(&mut self, var: VarId) {
        self.numeric.project_out(var);
        let (lo, hi) = self.cx.exchange.borrow().unprotected_bounds(var);
        if let Some(lo) = lo {
            self.numeric
                .guard(&LinCon::le(LinExpr::constant(lo), LinExpr::var(var)));
        }
        if let Some(hi) = hi {
            self.numeric
                .guard(&LinCon::le(LinExpr::var(var), LinExpr::constant(hi)));
        }
    }

    fn drop_unstable_regions(&mut self, state: &LockSetState) {
        let cx = self.cx;
        let unstable: Vec<Region> = self
            .live
            .iter()
            .copied()
            .filter(|&region| cx.interference.is_unstable_region(region, cx.thread, state))
            .collect();
        for region in unstable {
            self.live.remove(&region);
        }
    }

    /// Havoc every shared variable the statement at `location` reads whose
    /// value other threads may change behind our back, and drop liveness
    /// facts about concurrently freeable regions. Must run before the
    /// statement's effect and before any entailment query at this point.
    pub(super) fn prepare_reads(&mut self, location: Location) -> AnalysisResult<()> {
        if self.numeric.is_bottom() {
            return Ok(());
        }
        let cx = self.cx;
        let Some(statement) = cx.body().stmt_at(location) else {
            return Ok(());
        };
        let state = self.lockset_at(location);
        let mut shared_reads: Vec<VarId> = statement
            .kind
            .read_vars()
            .into_iter()
            .map(|var| cx.varmap.var(cx.thread, *var))
            .filter(|&vid| cx.varmap.is_shared(vid))
            .collect();
        if let StatementKind::Index { region, .. } = statement.kind {
            shared_reads.push(cx.varmap.length_of(region, cx.thread, location)?);
        }
        for vid in shared_reads {
            if cx.interference.is_unstable_var(vid, cx.thread, &state) {
                self.havoc_with_unprotected(vid);
            }
        }
        self.drop_unstable_regions(&state);
        Ok(())
    }

    fn prepare_cond_reads(&mut self, cond: &Comparison, location: Location) {
        if self.numeric.is_bottom() {
            return;
        }
        let cx = self.cx;
        let state = self.lockset_at(location);
        let shared_reads: Vec<VarId> = cond
            .lhs
            .vars()
            .chain(cond.rhs.vars())
            .map(|var| cx.varmap.var(cx.thread, *var))
            .filter(|&vid| cx.varmap.is_shared(vid))
            .collect();
        for vid in shared_reads {
            if cx.interference.is_unstable_var(vid, cx.thread, &state) {
                self.havoc_with_unprotected(vid);
            }
        }
        self.drop_unstable_regions(&state);
    }

    fn record_shared_write(&mut self, var: VarId) {
        if self.cx.varmap.is_shared(var) && !self.numeric.is_bottom() {
            let bounds = self.numeric.bounds_of(var);
            self.cx
                .exchange
                .borrow_mut()
                .record_write_bounds(var, bounds);
        }
    }

    fn shared_facts(&self) -> SharedFacts<D> {
        let varmap = self.cx.varmap;
        SharedFacts {
            numeric: self.numeric.restrict_to(|var| varmap.is_shared(var)),
            live: self.live.clone(),
        }
    }

    /// Lock acquire: havoc the variables that just became trustworthy (they
    /// may have changed since we last knew them) and intersect with the
    /// lock's protected invariant, projected onto the variables whose
    /// writers this lock actually excludes.
    fn apply_acquire(&mut self, lock: LockId, location: Location) {
        let cx = self.cx;
        let before = self.lockset_at(location);
        let after = before.with_lock(lock);

        let mut newly_stable: Vec<VarId> = vec![];
        let mut import: FxHashSet<VarId> = FxHashSet::default();
        for vid in cx.varmap.shared_var_ids() {
            if cx.interference.is_unstable_var(vid, cx.thread, &after) {
                continue;
            }
            let was_unstable = cx.interference.is_unstable_var(vid, cx.thread, &before);
            if was_unstable {
                newly_stable.push(vid);
            }
            if was_unstable || !cx.interference.write_vars(cx.thread).contains(&vid) {
                import.insert(vid);
            }
        }
        for &vid in &newly_stable {
            self.havoc_with_unprotected(vid);
        }

        let (projected, live_updates) = {
            let inv = cx.exchange.borrow();
            let facts = inv.protected(lock);
            let projected = facts.numeric.restrict_to(|var| import.contains(&var));
            let mut live_updates: Vec<(Region, bool)> = vec![];
            for i in 0..cx.program.regions.len() {
                let region = Region(i);
                if cx
                    .interference
                    .is_unstable_region(region, cx.thread, &after)
                {
                    continue;
                }
                if cx
                    .interference
                    .is_unstable_region(region, cx.thread, &before)
                {
                    live_updates.push((region, facts.live.contains(&region)));
                }
            }
            (projected, live_updates)
        };
        self.numeric.meet(&projected);
        for (region, live) in live_updates {
            if live {
                self.live.insert(region);
            } else {
                self.live.remove(&region);
            }
        }
    }

    /// Lock release: publish the shared part of the state into the lock's
    /// protected invariant.
    fn apply_release(&mut self, lock: LockId) {
        let facts = self.shared_facts();
        self.cx.exchange.borrow_mut().publish_protected(lock, &facts);
    }

    /// Thread creation: the spawned thread starts from the shared part of
    /// the current state, which also becomes part of every lock's base
    /// invariant; afterwards everything the new thread may write is no
    /// longer trustworthy here.
    fn apply_spawn(&mut self, spawned: ThreadId, location: Location) {
        let cx = self.cx;
        let facts = self.shared_facts();
        {
            let mut inv = cx.exchange.borrow_mut();
            inv.publish_entry(spawned, &facts);
            inv.publish_all_protected(&facts);
        }

        let before = self.lockset_at(location);
        let mut after = before.clone();
        after.spawned.insert(spawned);
        after.joined.remove(&spawned);
        let havoc: Vec<VarId> = cx
            .varmap
            .shared_var_ids()
            .filter(|&vid| {
                !cx.interference.is_unstable_var(vid, cx.thread, &before)
                    && cx.interference.is_unstable_var(vid, cx.thread, &after)
            })
            .collect();
        for vid in havoc {
            self.havoc_with_unprotected(vid);
        }
        self.drop_unstable_regions(&after);
    }

    pub(super) fn apply_statement_effect(&mut self, location: Location) -> AnalysisResult<()> {
        self.prepare_reads(location)?;
        if self.numeric.is_bottom() {
            return Ok(());
        }
        let cx = self.cx;
        let statement = cx
            .body()
            .stmt_at(location)
            .expect("statement location out of range");
        match &statement.kind {
            StatementKind::Assign(var, rvalue) => {
                let vid = cx.varmap.var(cx.thread, *var);
                match rvalue {
                    Rvalue::Use(expr) => {
                        let expr = cx.varmap.lower_expr(cx.thread, expr);
                        self.numeric.assign(vid, &expr);
                    }
                    Rvalue::Nondet => self.numeric.project_out(vid),
                    Rvalue::Rem(_, modulus) => {
                        // The remainder is bounded by the modulus but of
                        // unknown sign.
                        self.numeric.project_out(vid);
                        if *modulus != 0 {
                            let bound = modulus.abs() - 1;
                            self.numeric.guard(&LinCon::le(
                                LinExpr::constant(-bound),
                                LinExpr::var(vid),
                            ));
                            self.numeric.guard(&LinCon::le(
                                LinExpr::var(vid),
                                LinExpr::constant(bound),
                            ));
                        }
                    }
                }
                self.record_shared_write(vid);
            }
            StatementKind::Alloc { region, len } => {
                let length = cx.varmap.length_of(*region, cx.thread, location)?;
                let len_expr = cx.varmap.lower_expr(cx.thread, len);
                self.numeric.project_out(length);
                // A negative-looking size allocates an unknown/zero length:
                // bind only length >= 0 and length >= len, never an upper
                // bound.
                self.numeric.guard(&LinCon::nonneg(LinExpr::var(length)));
                self.numeric
                    .guard(&LinCon::le(len_expr, LinExpr::var(length)));
                self.live.insert(*region);
                self.record_shared_write(length);
            }
            StatementKind::Dealloc { region } => {
                let length = cx.varmap.length_of(*region, cx.thread, location)?;
                self.live.remove(region);
                // The length goes out of scope together with the allocation.
                self.numeric.project_out(length);
            }
            StatementKind::Index { .. } => {
                // Verdicts are derived from the state before the access; the
                // access itself does not change any tracked variable.
            }
            StatementKind::Lock(lock) => self.apply_acquire(*lock, location),
            StatementKind::Unlock(lock) => self.apply_release(*lock),
            StatementKind::Spawn(thread) => self.apply_spawn(*thread, location),
            StatementKind::Join(_) => {
                // The joined thread's effects are already covered by the
                // interference havoc while it was running.
            }
            StatementKind::Nop => {}
        }
        Ok(())
    }

    pub(super) fn apply_terminator_effect(
        &self,
        location: Location,
    ) -> AnalysisResult<Vec<(BasicBlock, Self)>> {
        let cx = self.cx;
        let terminator = &cx.body()[location.block].terminator;
        match &terminator.kind {
            TerminatorKind::Goto { target } => Ok(vec![(*target, self.clone())]),
            TerminatorKind::Return => Ok(vec![]),
            TerminatorKind::If {
                cond,
                then_target,
                else_target,
            } => {
                let mut base = self.clone();
                base.prepare_cond_reads(cond, location);
                let mut then_state = base.clone();
                if let Some(con) = cx.varmap.lower_comparison(cx.thread, cond) {
                    then_state.numeric.guard(&con);
                }
                let mut else_state = base;
                if let Some(con) = cx.varmap.lower_comparison(cx.thread, &cond.negate()) {
                    else_state.numeric.guard(&con);
                }
                Ok(vec![
                    (*then_target, then_state),
                    (*else_target, else_state),
                ])
            }
        }
    }

    /// The three queries of the bounds check for `region[offset]` against
    /// the current state. Call on a state that `prepare_reads` has already
    /// been applied to.
    pub(super) fn check_access(
        &self,
        region: Region,
        offset: &cir::LinearExpr,
        location: Location,
    ) -> AnalysisResult<AccessFacts> {
        if self.numeric.is_bottom() {
            // Unreachable accesses are vacuously in bounds.
            return Ok(AccessFacts {
                allocation_live: true,
                lower: true,
                upper: true,
            });
        }
        let cx = self.cx;
        let length = cx.varmap.length_of(region, cx.thread, location)?;
        let offset = cx.varmap.lower_expr(cx.thread, offset);
        Ok(AccessFacts {
            allocation_live: self.live.contains(&region),
            lower: self.numeric.entails(&LinCon::nonneg(offset.clone())),
            upper: self
                .numeric
                .entails(&LinCon::lt(offset, LinExpr::var(length))),
        })
    }
}

impl<'a, D: NumericDomain> AbstractState for BoundsState<'a, D> {
    fn is_bottom(&self) -> bool {
        self.numeric.is_bottom()
    }

    fn join(&mut self, other: &Self) {
        if other.numeric.is_bottom() {
            return;
        }
        if self.numeric.is_bottom() {
            *self = other.clone();
            return;
        }
        self.numeric.join(&other.numeric);
        self.live.retain(|region| other.live.contains(region));
    }

    fn widen(&mut self, previous: &Self) {
        if previous.numeric.is_bottom() {
            return;
        }
        // `self` is already the join, so the live set is already the
        // intersection; only the numeric part needs a widening operator.
        self.numeric.widen(&previous.numeric);
    }
}
