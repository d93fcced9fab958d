// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::domains::numeric::{LinCon, LinExpr, NumericDomain, VarId};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::fmt;

/// The non-relational interval domain: one `[lo, hi]` pair per variable.
///
/// Deliberately unable to track relations such as `i < len`, which is what
/// the interval ablation of the bounds check demonstrates.
#[derive(Clone, PartialEq, Eq)]
pub struct IntervalDomain {
    vars: Vec<Interval>,
    bottom: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct Interval {
    /// `None` is negative infinity.
    lo: Option<i64>,
    /// `None` is positive infinity.
    hi: Option<i64>,
}

const TOP: Interval = Interval { lo: None, hi: None };

impl Interval {
    fn constant(value: i64) -> Self {
        Interval {
            lo: Some(value),
            hi: Some(value),
        }
    }

    fn is_empty(&self) -> bool {
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) => lo > hi,
            _ => false,
        }
    }

    fn hull(&self, other: &Interval) -> Interval {
        Interval {
            lo: match (self.lo, other.lo) {
                (Some(a), Some(b)) => Some(a.min(b)),
                _ => None,
            },
            hi: match (self.hi, other.hi) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            },
        }
    }

    fn intersect(&self, other: &Interval) -> Interval {
        Interval {
            lo: match (self.lo, other.lo) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            },
            hi: match (self.hi, other.hi) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lo = self
            .lo
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-inf".to_string());
        let hi = self
            .hi
            .map(|v| v.to_string())
            .unwrap_or_else(|| "+inf".to_string());
        write!(f, "[{lo}, {hi}]")
    }
}

/// Interval bounds of an expression, computed over `i128` so that the
/// arithmetic itself cannot overflow for any realistic model.
fn eval(vars: &[Interval], expr: &LinExpr) -> (Option<i128>, Option<i128>) {
    let mut lo = Some(expr.constant_part() as i128);
    let mut hi = Some(expr.constant_part() as i128);
    for &(var, coeff) in expr.terms() {
        let iv = vars[var.0];
        let coeff = coeff as i128;
        // The contribution bounds of `coeff * var`.
        let (term_lo, term_hi) = if coeff >= 0 {
            (
                iv.lo.and_then(|v| coeff.checked_mul(v as i128)),
                iv.hi.and_then(|v| coeff.checked_mul(v as i128)),
            )
        } else {
            (
                iv.hi.and_then(|v| coeff.checked_mul(v as i128)),
                iv.lo.and_then(|v| coeff.checked_mul(v as i128)),
            )
        };
        lo = match (lo, term_lo) {
            (Some(a), Some(b)) => a.checked_add(b),
            _ => None,
        };
        hi = match (hi, term_hi) {
            (Some(a), Some(b)) => a.checked_add(b),
            _ => None,
        };
    }
    (lo, hi)
}

/// Clamp a lower bound: a bound above `i64::MAX` may be weakened down to
/// `i64::MAX`, a bound below `i64::MIN` is dropped.
fn clamp_lo(value: i128) -> Option<i64> {
    if value > i64::MAX as i128 {
        Some(i64::MAX)
    } else {
        i64::try_from(value).ok()
    }
}

/// Clamp an upper bound, symmetrically to `clamp_lo`.
fn clamp_hi(value: i128) -> Option<i64> {
    if value < i64::MIN as i128 {
        Some(i64::MIN)
    } else {
        i64::try_from(value).ok()
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

fn div_floor(a: i128, b: i128) -> i128 {
    debug_assert!(b > 0);
    let q = a / b;
    if a % b != 0 && a < 0 {
        q - 1
    } else {
        q
    }
}

impl IntervalDomain {
    fn set_bottom(&mut self) {
        self.bottom = true;
        self.vars.fill(TOP);
    }

    /// Tighten the interval of each variable occurring in `expr >= 0`.
    fn refine(&mut self, expr: &LinExpr) {
        for &(var, coeff) in expr.terms() {
            // expr = coeff * var + rest, so coeff * var >= -rest >= -rest_hi.
            let mut rest = expr.clone();
            rest.add_term(var, -coeff);
            let (_, rest_hi) = eval(&self.vars, &rest);
            let Some(rest_hi) = rest_hi else { continue };
            let bound = -rest_hi;
            let iv = &mut self.vars[var.0];
            if coeff > 0 {
                // var >= ceil(bound / coeff)
                let lo = clamp_lo(div_ceil(bound, coeff as i128));
                iv.lo = iv.intersect(&Interval { lo, hi: None }).lo;
            } else {
                // var <= floor(bound / coeff) for negative coeff
                let hi = clamp_hi(div_floor(-bound, -coeff as i128));
                iv.hi = iv.intersect(&Interval { lo: None, hi }).hi;
            }
            if self.vars[var.0].is_empty() {
                self.set_bottom();
                return;
            }
        }
    }
}

impl NumericDomain for IntervalDomain {
    const NAME: &'static str = "interval";

    fn top(num_vars: usize) -> Self {
        IntervalDomain {
            vars: vec![TOP; num_vars],
            bottom: false,
        }
    }

    fn bottom(num_vars: usize) -> Self {
        IntervalDomain {
            vars: vec![TOP; num_vars],
            bottom: true,
        }
    }

    fn is_bottom(&self) -> bool {
        self.bottom
    }

    fn num_vars(&self) -> usize {
        self.vars.len()
    }

    fn assign(&mut self, var: VarId, expr: &LinExpr) {
        if self.bottom {
            return;
        }
        let (lo, hi) = eval(&self.vars, expr);
        self.vars[var.0] = Interval {
            lo: lo.and_then(clamp_lo),
            hi: hi.and_then(clamp_hi),
        };
    }

    fn project_out(&mut self, var: VarId) {
        if self.bottom {
            return;
        }
        self.vars[var.0] = TOP;
    }

    fn guard(&mut self, con: &LinCon) {
        if self.bottom {
            return;
        }
        match con {
            LinCon::GeZero(expr) => {
                let (_, hi) = eval(&self.vars, expr);
                if matches!(hi, Some(hi) if hi < 0) {
                    self.set_bottom();
                    return;
                }
                self.refine(expr);
            }
            LinCon::EqZero(expr) => {
                self.guard(&LinCon::GeZero(expr.clone()));
                if !self.bottom {
                    self.guard(&LinCon::GeZero(expr.clone().scaled(-1)));
                }
            }
        }
    }

    fn meet(&mut self, other: &Self) {
        if self.bottom {
            return;
        }
        if other.bottom {
            self.set_bottom();
            return;
        }
        for (iv, other_iv) in self.vars.iter_mut().zip(&other.vars) {
            *iv = iv.intersect(other_iv);
            if iv.is_empty() {
                self.set_bottom();
                return;
            }
        }
    }

    fn join(&mut self, other: &Self) {
        if other.bottom {
            return;
        }
        if self.bottom {
            *self = other.clone();
            return;
        }
        for (iv, other_iv) in self.vars.iter_mut().zip(&other.vars) {
            *iv = iv.hull(other_iv);
        }
    }

    fn widen(&mut self, previous: &Self) {
        if previous.bottom {
            return;
        }
        // Unstable bounds go to infinity; stable ones keep the old value.
        for (iv, prev_iv) in self.vars.iter_mut().zip(&previous.vars) {
            iv.lo = match (iv.lo, prev_iv.lo) {
                (Some(new), Some(old)) if new >= old => Some(old),
                _ => None,
            };
            iv.hi = match (iv.hi, prev_iv.hi) {
                (Some(new), Some(old)) if new <= old => Some(old),
                _ => None,
            };
        }
    }

    fn entails(&self, con: &LinCon) -> bool {
        if self.bottom {
            return true;
        }
        match con {
            LinCon::GeZero(expr) => {
                let (lo, _) = eval(&self.vars, expr);
                matches!(lo, Some(lo) if lo >= 0)
            }
            LinCon::EqZero(expr) => {
                let (lo, hi) = eval(&self.vars, expr);
                matches!((lo, hi), (Some(0), Some(0)))
            }
        }
    }

    fn bounds_of(&self, var: VarId) -> (Option<i64>, Option<i64>) {
        if self.bottom {
            return (Some(0), Some(-1));
        }
        (self.vars[var.0].lo, self.vars[var.0].hi)
    }
}

impl fmt::Debug for IntervalDomain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.bottom {
            return write!(f, "bottom");
        }
        let mut map = f.debug_map();
        for (i, iv) in self.vars.iter().enumerate() {
            if *iv != TOP {
                map.entry(&format!("{}", VarId(i)), iv);
            }
        }
        map.finish()
    }
}

impl Serialize for IntervalDomain {
    fn serialize<Se: Serializer>(&self, serializer: Se) -> Result<Se::Ok, Se::Error> {
        if self.bottom {
            return serializer.serialize_str("bottom");
        }
        let mut map = serializer.serialize_map(None)?;
        for (i, iv) in self.vars.iter().enumerate() {
            if *iv != TOP {
                map.serialize_entry(&format!("{}", VarId(i)), &format!("{iv:?}"))?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: usize) -> VarId {
        VarId(i)
    }

    #[test]
    fn guard_refines_single_variable_bounds() {
        let mut state = IntervalDomain::top(2);
        // v0 >= 0
        state.guard(&LinCon::nonneg(LinExpr::var(v(0))));
        // v0 <= 9
        state.guard(&LinCon::le(LinExpr::var(v(0)), LinExpr::constant(9)));
        assert_eq!(state.bounds_of(v(0)), (Some(0), Some(9)));
        assert!(state.entails(&LinCon::le(LinExpr::var(v(0)), LinExpr::constant(9))));
        assert!(!state.entails(&LinCon::le(LinExpr::var(v(0)), LinExpr::constant(8))));
    }

    #[test]
    fn infeasible_guard_is_bottom() {
        let mut state = IntervalDomain::top(1);
        state.guard(&LinCon::le(LinExpr::var(v(0)), LinExpr::constant(3)));
        state.guard(&LinCon::le(LinExpr::constant(5), LinExpr::var(v(0))));
        assert!(state.is_bottom());
        // bottom entails everything
        assert!(state.entails(&LinCon::eq(LinExpr::var(v(0)), LinExpr::constant(42))));
    }

    #[test]
    fn relations_are_lost_by_projection() {
        // Intervals cannot remember v0 <= v1 once v1's bounds are unknown.
        let mut state = IntervalDomain::top(2);
        state.guard(&LinCon::le(LinExpr::var(v(0)), LinExpr::var(v(1))));
        assert!(!state.entails(&LinCon::le(LinExpr::var(v(0)), LinExpr::var(v(1)))));
    }

    #[test]
    fn join_is_the_hull() {
        let mut a = IntervalDomain::top(1);
        a.guard(&LinCon::eq(LinExpr::var(v(0)), LinExpr::constant(0)));
        let mut b = IntervalDomain::top(1);
        b.guard(&LinCon::eq(LinExpr::var(v(0)), LinExpr::constant(5)));
        a.join(&b);
        assert_eq!(a.bounds_of(v(0)), (Some(0), Some(5)));
    }

    #[test]
    fn widening_drops_unstable_bounds() {
        let mut old = IntervalDomain::top(1);
        old.guard(&LinCon::le(LinExpr::constant(0), LinExpr::var(v(0))));
        old.guard(&LinCon::le(LinExpr::var(v(0)), LinExpr::constant(1)));
        let mut new = IntervalDomain::top(1);
        new.guard(&LinCon::le(LinExpr::constant(0), LinExpr::var(v(0))));
        new.guard(&LinCon::le(LinExpr::var(v(0)), LinExpr::constant(2)));
        new.join(&old);
        new.widen(&old);
        assert_eq!(new.bounds_of(v(0)), (Some(0), None));
    }

    #[test]
    fn assignment_evaluates_affine_expressions() {
        let mut state = IntervalDomain::top(2);
        state.guard(&LinCon::eq(LinExpr::var(v(0)), LinExpr::constant(3)));
        // v1 := 2 * v0 + 1
        state.assign(v(1), &LinExpr::var(v(0)).scaled(2).plus(&LinExpr::constant(1)));
        assert_eq!(state.bounds_of(v(1)), (Some(7), Some(7)));
    }
}
