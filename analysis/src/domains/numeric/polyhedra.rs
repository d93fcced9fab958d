// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::domains::numeric::{LinCon, LinExpr, NumericDomain, VarId};
use serde::{ser::SerializeSeq, Serialize, Serializer};
use std::fmt;

/// A convex polyhedron over the integers: a conjunction of linear
/// constraints `sum coeffs[i] * v_i + constant >= 0` (or `== 0`).
///
/// Projection and entailment are implemented by Fourier-Motzkin elimination
/// over the rationals with integer tightening. Elimination is exact, which
/// is what lets an index/length relation survive the removal of auxiliary
/// variables; the join is the sound mutual-entailment approximation of the
/// convex hull.
#[derive(Clone, PartialEq, Eq)]
pub struct PolyhedraDomain {
    num_vars: usize,
    /// `None` encodes bottom. The vector is kept normalized, sorted and
    /// deduplicated, so that structural equality is canonical.
    constraints: Option<Vec<Constraint>>,
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct Constraint {
    is_eq: bool,
    coeffs: Vec<i64>,
    constant: i64,
}

/// Working representation during elimination, wide enough that combining
/// normalized `i64` constraints cannot overflow.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RawCon {
    is_eq: bool,
    coeffs: Vec<i128>,
    constant: i128,
}

enum Norm {
    /// Trivially satisfied; carries no information.
    True,
    /// Trivially unsatisfiable.
    False,
    Con(Constraint),
}

/// Hard cap on the constraints kept in a state; exceeding constraints are
/// dropped, which only loses precision.
const MAX_STATE_CONS: usize = 64;
/// Hard cap on intermediate constraints during elimination; when exceeded
/// the query gives up and reports "cannot decide".
const MAX_ELIM_CONS: usize = 768;

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn div_floor(a: i128, b: i128) -> i128 {
    debug_assert!(b > 0);
    let q = a / b;
    if a % b != 0 && a < 0 {
        q - 1
    } else {
        q
    }
}

fn div_ceil(a: i128, b: i128) -> i128 {
    debug_assert!(b > 0);
    let q = a / b;
    if a % b != 0 && a > 0 {
        q + 1
    } else {
        q
    }
}

impl RawCon {
    fn from_constraint(con: &Constraint) -> Self {
        RawCon {
            is_eq: con.is_eq,
            coeffs: con.coeffs.iter().map(|&c| c as i128).collect(),
            constant: con.constant as i128,
        }
    }

    fn from_lincon(con: &LinCon, num_vars: usize) -> Self {
        let (expr, is_eq) = match con {
            LinCon::GeZero(expr) => (expr, false),
            LinCon::EqZero(expr) => (expr, true),
        };
        let mut coeffs = vec![0i128; num_vars];
        for &(var, coeff) in expr.terms() {
            coeffs[var.0] = coeff as i128;
        }
        RawCon {
            is_eq,
            coeffs,
            constant: expr.constant_part() as i128,
        }
    }

    /// The negation of an inequality over the integers:
    /// `not (e >= 0)  <=>  -e - 1 >= 0`.
    fn negate_ge(&self) -> RawCon {
        debug_assert!(!self.is_eq);
        RawCon {
            is_eq: false,
            coeffs: self.coeffs.iter().map(|&c| -c).collect(),
            constant: -self.constant - 1,
        }
    }

    /// `self * a + other * b`; both factors must keep inequality directions,
    /// i.e. be positive for inequality operands. `None` on arithmetic
    /// overflow; the caller drops the combination, losing only precision.
    fn combine(&self, a: i128, other: &RawCon, b: i128) -> Option<RawCon> {
        let term = |x: i128, y: i128| {
            x.checked_mul(a)?.checked_add(y.checked_mul(b)?)
        };
        let mut coeffs = Vec::with_capacity(self.coeffs.len());
        for (&x, &y) in self.coeffs.iter().zip(&other.coeffs) {
            coeffs.push(term(x, y)?);
        }
        Some(RawCon {
            is_eq: self.is_eq && other.is_eq,
            coeffs,
            constant: term(self.constant, other.constant)?,
        })
    }
}

/// Normalize by the gcd of the coefficients, tightening the constant over
/// the integers; detects trivial and impossible constraints. Coefficients
/// that do not fit back into `i64` cause the constraint to be dropped,
/// which is a pure precision loss.
fn normalize(raw: &RawCon) -> Norm {
    let g = raw.coeffs.iter().fold(0i128, |acc, &c| gcd(acc, c));
    if g == 0 {
        // No variables left: a plain truth value.
        let holds = if raw.is_eq {
            raw.constant == 0
        } else {
            raw.constant >= 0
        };
        return if holds { Norm::True } else { Norm::False };
    }
    let mut coeffs: Vec<i128> = raw.coeffs.iter().map(|&c| c / g).collect();
    let mut constant = if raw.is_eq {
        if raw.constant % g != 0 {
            // g divides every term but not the constant: unsatisfiable.
            return Norm::False;
        }
        raw.constant / g
    } else {
        div_floor(raw.constant, g)
    };
    if raw.is_eq {
        // Canonical sign: first nonzero coefficient positive.
        if let Some(&first) = coeffs.iter().find(|&&c| c != 0) {
            if first < 0 {
                for c in &mut coeffs {
                    *c = -*c;
                }
                constant = -constant;
            }
        }
    }
    let mut out = Vec::with_capacity(coeffs.len());
    for c in coeffs {
        match i64::try_from(c) {
            Ok(c) => out.push(c),
            Err(_) => return Norm::True,
        }
    }
    let Ok(constant) = i64::try_from(constant) else {
        return Norm::True;
    };
    Norm::Con(Constraint {
        is_eq: raw.is_eq,
        coeffs: out,
        constant,
    })
}

/// Eliminate `var` from `cons` exactly (over the rationals): equalities are
/// used as substitution pivots, the remaining inequalities are combined
/// pairwise. Returns `None` if unsatisfiability was detected on the way.
fn eliminate_var(cons: Vec<RawCon>, var: usize) -> Option<Vec<RawCon>> {
    // Prefer an equality pivot: substitution keeps the system small.
    if let Some(pivot_idx) = cons.iter().position(|c| c.is_eq && c.coeffs[var] != 0) {
        let pivot = cons[pivot_idx].clone();
        let pv = pivot.coeffs[var];
        let mut out = Vec::with_capacity(cons.len());
        for (i, con) in cons.into_iter().enumerate() {
            if i == pivot_idx {
                continue;
            }
            let cv = con.coeffs[var];
            if cv == 0 {
                out.push(con);
                continue;
            }
            // con * |pv| + pivot * t with t chosen to cancel `var`; the
            // factor on the (in)equality `con` stays positive.
            let t = -cv * pv.signum();
            let Some(combined) = con.combine(pv.abs(), &pivot, t) else {
                continue;
            };
            match renormalize(combined) {
                Some(Some(c)) => out.push(c),
                Some(None) => {}
                None => return None,
            }
        }
        return Some(out);
    }

    let mut zeros = Vec::new();
    let mut pos = Vec::new();
    let mut neg = Vec::new();
    for con in cons {
        match con.coeffs[var].signum() {
            0 => zeros.push(con),
            1 => pos.push(con),
            _ => neg.push(con),
        }
    }
    for p in &pos {
        for n in &neg {
            let Some(combined) = p.combine(-n.coeffs[var], n, p.coeffs[var]) else {
                continue;
            };
            match renormalize(combined) {
                Some(Some(c)) => zeros.push(c),
                Some(None) => {}
                None => return None,
            }
            if zeros.len() > MAX_ELIM_CONS {
                // Give up on exactness: drop the remaining combinations.
                return Some(zeros);
            }
        }
    }
    zeros.sort();
    zeros.dedup();
    Some(zeros)
}

/// Normalize a raw constraint in place: `None` means unsatisfiable,
/// `Some(None)` trivially true.
fn renormalize(raw: RawCon) -> Option<Option<RawCon>> {
    match normalize(&raw) {
        Norm::False => None,
        Norm::True => Some(None),
        Norm::Con(c) => Some(Some(RawCon::from_constraint(&c))),
    }
}

/// Rational satisfiability by full elimination. A `true` answer may be a
/// "don't know" (rational relaxation, size cut-offs); `false` is definite.
fn feasible(mut cons: Vec<RawCon>, num_vars: usize) -> bool {
    // Pre-normalize.
    let mut current = Vec::with_capacity(cons.len());
    for raw in cons.drain(..) {
        match renormalize(raw) {
            Some(Some(c)) => current.push(c),
            Some(None) => {}
            None => return false,
        }
    }
    for var in 0..num_vars {
        current.sort();
        current.dedup();
        match eliminate_var(current, var) {
            Some(next) => current = next,
            None => return false,
        }
    }
    // Everything left is variable-free and was normalized on the way.
    true
}

impl PolyhedraDomain {
    fn cons(&self) -> Option<&Vec<Constraint>> {
        self.constraints.as_ref()
    }

    fn set_bottom(&mut self) {
        self.constraints = None;
    }

    fn raw_cons(&self) -> Vec<RawCon> {
        self.cons()
            .map(|cons| cons.iter().map(RawCon::from_constraint).collect())
            .unwrap_or_default()
    }

    /// Re-establish the canonical form after a bulk rewrite; detects
    /// syntactic unsatisfiability but does not run a feasibility check.
    fn canonicalize(&mut self, raws: Vec<RawCon>) {
        let mut cons = Vec::with_capacity(raws.len());
        for raw in raws {
            match normalize(&raw) {
                Norm::True => {}
                Norm::False => {
                    self.set_bottom();
                    return;
                }
                Norm::Con(c) => cons.push(c),
            }
        }
        cons.sort();
        cons.dedup();
        cons.truncate(MAX_STATE_CONS);
        self.constraints = Some(cons);
    }

    fn entails_raw(&self, raw: &RawCon) -> bool {
        if self.is_bottom() {
            return true;
        }
        if raw.is_eq {
            let ge = RawCon {
                is_eq: false,
                ..raw.clone()
            };
            let le = RawCon {
                is_eq: false,
                coeffs: raw.coeffs.iter().map(|&c| -c).collect(),
                constant: -raw.constant,
            };
            return self.entails_raw(&ge) && self.entails_raw(&le);
        }
        let mut system = self.raw_cons();
        system.push(raw.negate_ge());
        !feasible(system, self.num_vars)
    }

    fn entails_constraint(&self, con: &Constraint) -> bool {
        self.entails_raw(&RawCon::from_constraint(con))
    }

    fn add_raw(&mut self, raw: RawCon) {
        let Some(cons) = self.constraints.as_mut() else {
            return;
        };
        match normalize(&raw) {
            Norm::True => return,
            Norm::False => {
                self.set_bottom();
                return;
            }
            Norm::Con(c) => {
                if !cons.contains(&c) {
                    cons.push(c);
                    cons.sort();
                    cons.truncate(MAX_STATE_CONS);
                }
            }
        }
        let system = self.raw_cons();
        if !feasible(system, self.num_vars) {
            self.set_bottom();
        }
    }
}

impl NumericDomain for PolyhedraDomain {
    const NAME: &'static str = "polyhedra";

    fn top(num_vars: usize) -> Self {
        PolyhedraDomain {
            num_vars,
            constraints: Some(vec![]),
        }
    }

    fn bottom(num_vars: usize) -> Self {
        PolyhedraDomain {
            num_vars,
            constraints: None,
        }
    }

    fn is_bottom(&self) -> bool {
        self.constraints.is_none()
    }

    fn num_vars(&self) -> usize {
        self.num_vars
    }

    fn assign(&mut self, var: VarId, expr: &LinExpr) {
        if self.is_bottom() {
            return;
        }
        let cv = expr.coefficient_of(var);
        if cv == 0 {
            self.project_out(var);
            // var - expr == 0
            let eq = LinCon::EqZero(LinExpr::var(var).minus(expr));
            self.add_raw(RawCon::from_lincon(&eq, self.num_vars));
        } else if cv == 1 || cv == -1 {
            // Invertible update: v_old = cv * v_new - cv * r with
            // r = expr - cv * v, substituted into every constraint.
            let mut r = expr.clone();
            r.add_term(var, -cv);
            let raws: Vec<RawCon> = self
                .raw_cons()
                .into_iter()
                .map(|mut raw| {
                    let a = raw.coeffs[var.0];
                    if a != 0 {
                        let s = a * cv as i128;
                        raw.coeffs[var.0] = s;
                        for &(w, rw) in r.terms() {
                            raw.coeffs[w.0] -= s * rw as i128;
                        }
                        raw.constant -= s * r.constant_part() as i128;
                    }
                    raw
                })
                .collect();
            self.canonicalize(raws);
        } else {
            // Not invertible over the integers; drop to unconstrained.
            self.project_out(var);
        }
    }

    fn project_out(&mut self, var: VarId) {
        if self.is_bottom() {
            return;
        }
        let raws = self.raw_cons();
        match eliminate_var(raws, var.0) {
            Some(remaining) => self.canonicalize(remaining),
            None => self.set_bottom(),
        }
    }

    fn guard(&mut self, con: &LinCon) {
        if self.is_bottom() {
            return;
        }
        self.add_raw(RawCon::from_lincon(con, self.num_vars));
    }

    fn meet(&mut self, other: &Self) {
        if self.is_bottom() {
            return;
        }
        if other.is_bottom() {
            self.set_bottom();
            return;
        }
        let mut raws = self.raw_cons();
        raws.extend(other.raw_cons());
        self.canonicalize(raws);
        if !self.is_bottom() && !feasible(self.raw_cons(), self.num_vars) {
            self.set_bottom();
        }
    }

    fn join(&mut self, other: &Self) {
        if other.is_bottom() {
            return;
        }
        if self.is_bottom() {
            *self = other.clone();
            return;
        }
        // Mutual entailment over the inequality representation: keep each
        // side's (split) constraints that also hold on the other side.
        // Equalities must be split first, otherwise joining `x == 0` with
        // `x == 1` would lose `x >= 0`, which is in neither constraint set.
        // Over-approximates the convex hull.
        let mut kept: Vec<Constraint> = Vec::new();
        for con in split_equalities(self.cons().unwrap()) {
            if other.entails_constraint(&con) {
                kept.push(con);
            }
        }
        for con in split_equalities(other.cons().unwrap()) {
            if self.entails_constraint(&con) {
                kept.push(con);
            }
        }
        kept.sort();
        kept.dedup();
        kept.truncate(MAX_STATE_CONS);
        self.constraints = Some(kept);
    }

    fn widen(&mut self, previous: &Self) {
        if previous.is_bottom() || self.is_bottom() {
            return;
        }
        // Standard polyhedra widening over the inequality representation:
        // keep the old constraints that the new state still satisfies. The
        // constraint set can only shrink, which bounds the iteration.
        let kept: Vec<Constraint> = split_equalities(previous.cons().unwrap())
            .into_iter()
            .filter(|con| self.entails_constraint(con))
            .collect();
        self.constraints = Some(kept);
    }

    fn entails(&self, con: &LinCon) -> bool {
        self.entails_raw(&RawCon::from_lincon(con, self.num_vars))
    }

    fn bounds_of(&self, var: VarId) -> (Option<i64>, Option<i64>) {
        let Some(cons) = self.cons() else {
            return (Some(0), Some(-1));
        };
        let mut lo: Option<i64> = None;
        let mut hi: Option<i64> = None;
        let tighten_lo = |lo: &mut Option<i64>, v: i128| {
            let v = v.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
            *lo = Some(lo.map_or(v, |old| old.max(v)));
        };
        let tighten_hi = |hi: &mut Option<i64>, v: i128| {
            let v = v.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
            *hi = Some(hi.map_or(v, |old| old.min(v)));
        };
        for con in cons {
            let a = con.coeffs[var.0] as i128;
            if a == 0 || con.coeffs.iter().enumerate().any(|(i, &c)| i != var.0 && c != 0) {
                continue;
            }
            let k = con.constant as i128;
            if con.is_eq {
                // normalized: a == 1, so var == -k
                tighten_lo(&mut lo, -k);
                tighten_hi(&mut hi, -k);
            } else if a > 0 {
                // a*var + k >= 0  =>  var >= ceil(-k / a)
                tighten_lo(&mut lo, div_ceil(-k, a));
            } else {
                // var <= floor(k / -a)
                tighten_hi(&mut hi, div_floor(k, -a));
            }
        }
        (lo, hi)
    }
}

/// The inequality representation: `e == 0` becomes `e >= 0` and `-e >= 0`.
fn split_equalities(cons: &[Constraint]) -> Vec<Constraint> {
    let mut out = Vec::with_capacity(cons.len());
    for con in cons {
        if con.is_eq {
            out.push(Constraint {
                is_eq: false,
                coeffs: con.coeffs.clone(),
                constant: con.constant,
            });
            out.push(Constraint {
                is_eq: false,
                coeffs: con.coeffs.iter().map(|&c| -c).collect(),
                constant: -con.constant,
            });
        } else {
            out.push(con.clone());
        }
    }
    out
}

fn constraint_to_string(con: &Constraint) -> String {
    let mut expr = LinExpr::constant(con.constant);
    for (i, &c) in con.coeffs.iter().enumerate() {
        expr.add_term(VarId(i), c);
    }
    if con.is_eq {
        format!("{expr} == 0")
    } else {
        format!("{expr} >= 0")
    }
}

impl fmt::Debug for PolyhedraDomain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.cons() {
            None => write!(f, "bottom"),
            Some(cons) => {
                let rendered: Vec<String> = cons.iter().map(constraint_to_string).collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

impl Serialize for PolyhedraDomain {
    fn serialize<Se: Serializer>(&self, serializer: Se) -> Result<Se::Ok, Se::Error> {
        match self.cons() {
            None => serializer.serialize_str("bottom"),
            Some(cons) => {
                let mut seq = serializer.serialize_seq(Some(cons.len()))?;
                for con in cons {
                    seq.serialize_element(&constraint_to_string(con))?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: usize) -> VarId {
        VarId(i)
    }

    fn x() -> LinExpr {
        LinExpr::var(v(0))
    }

    fn y() -> LinExpr {
        LinExpr::var(v(1))
    }

    fn z() -> LinExpr {
        LinExpr::var(v(2))
    }

    #[test]
    fn entailment_combines_constraints() {
        // x <= y - 1 and y <= z entail x <= z - 1.
        let mut state = PolyhedraDomain::top(3);
        state.guard(&LinCon::lt(x(), y()));
        state.guard(&LinCon::le(y(), z()));
        assert!(state.entails(&LinCon::lt(x(), z())));
        assert!(!state.entails(&LinCon::lt(x().plus(&LinExpr::constant(1)), z())));
    }

    #[test]
    fn infeasible_guard_is_bottom() {
        let mut state = PolyhedraDomain::top(2);
        state.guard(&LinCon::lt(x(), y()));
        state.guard(&LinCon::lt(y(), x()));
        assert!(state.is_bottom());
        assert!(state.entails(&LinCon::eq(x(), LinExpr::constant(17))));
    }

    #[test]
    fn projection_preserves_residual_relations() {
        // From x < y and y <= z, projecting out y must keep x < z.
        let mut state = PolyhedraDomain::top(3);
        state.guard(&LinCon::lt(x(), y()));
        state.guard(&LinCon::le(y(), z()));
        state.project_out(v(1));
        assert!(state.entails(&LinCon::lt(x(), z())));
        // And y itself is unconstrained again.
        assert!(!state.entails(&LinCon::le(x(), y())));
    }

    #[test]
    fn equalities_substitute_during_projection() {
        // x == y + 2 and y >= 0: projecting y keeps x >= 2.
        let mut state = PolyhedraDomain::top(2);
        state.guard(&LinCon::eq(x(), y().plus(&LinExpr::constant(2))));
        state.guard(&LinCon::nonneg(y()));
        state.project_out(v(1));
        assert!(state.entails(&LinCon::le(LinExpr::constant(2), x())));
    }

    #[test]
    fn invertible_assignment_translates_constraints() {
        // 0 <= x <= 5, then x := x + 1 gives 1 <= x <= 6.
        let mut state = PolyhedraDomain::top(1);
        state.guard(&LinCon::nonneg(x()));
        state.guard(&LinCon::le(x(), LinExpr::constant(5)));
        state.assign(v(0), &x().plus(&LinExpr::constant(1)));
        assert!(state.entails(&LinCon::le(LinExpr::constant(1), x())));
        assert!(state.entails(&LinCon::le(x(), LinExpr::constant(6))));
        assert!(!state.entails(&LinCon::le(x(), LinExpr::constant(5))));
    }

    #[test]
    fn fresh_assignment_keeps_relations_of_others() {
        // y <= z, x := y: then x <= z.
        let mut state = PolyhedraDomain::top(3);
        state.guard(&LinCon::le(y(), z()));
        state.assign(v(0), &y());
        assert!(state.entails(&LinCon::le(x(), z())));
    }

    #[test]
    fn join_keeps_mutually_entailed_constraints() {
        // {x == 0, y >= 0} join {1 <= x <= y} keeps x >= 0 and 0 <= y.
        let mut a = PolyhedraDomain::top(2);
        a.guard(&LinCon::eq(x(), LinExpr::constant(0)));
        a.guard(&LinCon::nonneg(y()));
        let mut b = PolyhedraDomain::top(2);
        b.guard(&LinCon::le(LinExpr::constant(1), x()));
        b.guard(&LinCon::le(x(), y()));
        a.join(&b);
        assert!(a.entails(&LinCon::nonneg(x())));
        assert!(a.entails(&LinCon::nonneg(y())));
        assert!(!a.entails(&LinCon::le(x(), LinExpr::constant(0))));
    }

    #[test]
    fn join_with_bottom_is_identity() {
        let mut state = PolyhedraDomain::top(1);
        state.guard(&LinCon::eq(x(), LinExpr::constant(3)));
        let reference = state.clone();
        state.join(&PolyhedraDomain::bottom(1));
        assert_eq!(state, reference);

        let mut bottom = PolyhedraDomain::bottom(1);
        bottom.join(&reference);
        assert_eq!(bottom, reference);
    }

    #[test]
    fn widening_keeps_stable_constraints_only() {
        let mut old = PolyhedraDomain::top(1);
        old.guard(&LinCon::nonneg(x()));
        old.guard(&LinCon::le(x(), LinExpr::constant(1)));
        let mut new = PolyhedraDomain::top(1);
        new.guard(&LinCon::nonneg(x()));
        new.guard(&LinCon::le(x(), LinExpr::constant(2)));
        new.join(&old);
        new.widen(&old);
        assert!(new.entails(&LinCon::nonneg(x())));
        assert!(!new.entails(&LinCon::le(x(), LinExpr::constant(100))));
    }

    #[test]
    fn single_variable_bounds_are_extracted() {
        let mut state = PolyhedraDomain::top(2);
        state.guard(&LinCon::nonneg(x().plus(&LinExpr::constant(9))));
        state.guard(&LinCon::le(x(), LinExpr::constant(9)));
        state.guard(&LinCon::le(x(), y()));
        assert_eq!(state.bounds_of(v(0)), (Some(-9), Some(9)));
        assert_eq!(state.bounds_of(v(1)), (None, None));
    }

    #[test]
    fn bounds_check_scenario_entails_exactly_the_safe_offset() {
        // 0 <= i, i <= len - 1, len <= cap: prove 0 <= i < cap, fail to
        // prove the shifted offsets.
        let i = || LinExpr::var(v(0));
        let len = || LinExpr::var(v(1));
        let cap = || LinExpr::var(v(2));
        let mut state = PolyhedraDomain::top(3);
        state.guard(&LinCon::nonneg(i()));
        state.guard(&LinCon::lt(i(), len()));
        state.guard(&LinCon::le(len(), cap()));

        assert!(state.entails(&LinCon::nonneg(i())));
        assert!(state.entails(&LinCon::lt(i(), cap())));
        // i + 1 may equal cap
        assert!(!state.entails(&LinCon::lt(i().plus(&LinExpr::constant(1)), cap())));
        // i - 1 may be negative
        assert!(!state.entails(&LinCon::nonneg(i().plus(&LinExpr::constant(-1)))));
    }
}
