// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The numeric domain adapter: a stable interface over the primitive
//! operations of a numeric abstract domain, so that the rest of the engine
//! is domain-agnostic. The domain is selected at configuration time.

mod interval;
mod polyhedra;

pub use interval::IntervalDomain;
pub use polyhedra::PolyhedraDomain;

use serde::Serialize;
use std::fmt;

/// A variable of the numeric domain. The dense index space is laid out by
/// the memory model: shared globals and allocation lengths first, then the
/// locals of every thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub usize);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// An affine expression over domain variables.
///
/// Terms are sorted by variable and free of zeros and duplicates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinExpr {
    terms: Vec<(VarId, i64)>,
    constant: i64,
}

impl LinExpr {
    pub fn constant(value: i64) -> Self {
        LinExpr {
            terms: vec![],
            constant: value,
        }
    }

    pub fn var(var: VarId) -> Self {
        LinExpr {
            terms: vec![(var, 1)],
            constant: 0,
        }
    }

    pub fn terms(&self) -> &[(VarId, i64)] {
        &self.terms
    }

    pub fn constant_part(&self) -> i64 {
        self.constant
    }

    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.iter().map(|&(var, _)| var)
    }

    pub fn coefficient_of(&self, var: VarId) -> i64 {
        self.terms
            .iter()
            .find(|&&(v, _)| v == var)
            .map(|&(_, c)| c)
            .unwrap_or(0)
    }

    pub fn add_term(&mut self, var: VarId, coeff: i64) {
        match self.terms.binary_search_by_key(&var, |&(v, _)| v) {
            Ok(i) => {
                self.terms[i].1 += coeff;
                if self.terms[i].1 == 0 {
                    self.terms.remove(i);
                }
            }
            Err(i) => {
                if coeff != 0 {
                    self.terms.insert(i, (var, coeff));
                }
            }
        }
    }

    pub fn add_constant(&mut self, value: i64) {
        self.constant += value;
    }

    #[must_use]
    pub fn plus(mut self, other: &LinExpr) -> Self {
        for &(var, coeff) in &other.terms {
            self.add_term(var, coeff);
        }
        self.constant += other.constant;
        self
    }

    #[must_use]
    pub fn minus(self, other: &LinExpr) -> Self {
        self.plus(&other.clone().scaled(-1))
    }

    #[must_use]
    pub fn scaled(mut self, factor: i64) -> Self {
        if factor == 0 {
            return LinExpr::constant(0);
        }
        for term in &mut self.terms {
            term.1 *= factor;
        }
        self.constant *= factor;
        self
    }
}

impl fmt::Display for LinExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for &(var, coeff) in &self.terms {
            if first {
                match coeff {
                    1 => write!(f, "{var}")?,
                    -1 => write!(f, "-{var}")?,
                    _ => write!(f, "{coeff}*{var}")?,
                }
                first = false;
            } else {
                let sign = if coeff < 0 { '-' } else { '+' };
                match coeff.abs() {
                    1 => write!(f, " {sign} {var}")?,
                    a => write!(f, " {sign} {a}*{var}")?,
                }
            }
        }
        if first {
            write!(f, "{}", self.constant)?;
        } else if self.constant != 0 {
            let sign = if self.constant < 0 { '-' } else { '+' };
            write!(f, " {sign} {}", self.constant.abs())?;
        }
        Ok(())
    }
}

/// A linear constraint in canonical form: `expr >= 0` or `expr == 0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinCon {
    GeZero(LinExpr),
    EqZero(LinExpr),
}

impl LinCon {
    /// `lhs <= rhs`
    pub fn le(lhs: LinExpr, rhs: LinExpr) -> Self {
        LinCon::GeZero(rhs.minus(&lhs))
    }

    /// `lhs < rhs` over the integers, i.e. `lhs <= rhs - 1`.
    pub fn lt(lhs: LinExpr, rhs: LinExpr) -> Self {
        let mut expr = rhs.minus(&lhs);
        expr.add_constant(-1);
        LinCon::GeZero(expr)
    }

    /// `lhs == rhs`
    pub fn eq(lhs: LinExpr, rhs: LinExpr) -> Self {
        LinCon::EqZero(lhs.minus(&rhs))
    }

    /// `expr >= 0`
    pub fn nonneg(expr: LinExpr) -> Self {
        LinCon::GeZero(expr)
    }

    pub fn expr(&self) -> &LinExpr {
        match self {
            LinCon::GeZero(expr) | LinCon::EqZero(expr) => expr,
        }
    }
}

impl fmt::Display for LinCon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinCon::GeZero(expr) => write!(f, "{expr} >= 0"),
            LinCon::EqZero(expr) => write!(f, "{expr} == 0"),
        }
    }
}

/// The primitive operations the fixpoint engine needs from a numeric domain.
///
/// All operations must over-approximate; `entails` is the only one that may
/// not, and answers `false` whenever it cannot prove the constraint.
pub trait NumericDomain: Clone + Eq + fmt::Debug + Serialize {
    const NAME: &'static str;

    /// No information about any of the `num_vars` variables.
    fn top(num_vars: usize) -> Self;

    /// No reachable concrete state.
    fn bottom(num_vars: usize) -> Self;

    fn is_bottom(&self) -> bool;

    fn num_vars(&self) -> usize;

    /// `var := expr`. Exact for invertible affine updates; degrades to
    /// `project_out` otherwise.
    fn assign(&mut self, var: VarId, expr: &LinExpr);

    /// Forget everything about `var`, preserving the relations among the
    /// remaining variables as precisely as the domain supports.
    fn project_out(&mut self, var: VarId);

    /// Intersect with a constraint; the result is bottom if infeasible.
    fn guard(&mut self, con: &LinCon);

    /// Greatest lower bound (conjunction with all of `other`'s facts).
    fn meet(&mut self, other: &Self);

    /// Least upper bound, sound and monotone.
    fn join(&mut self, other: &Self);

    /// Widening: `self` is the joined new state, `previous` the state it
    /// replaces; the result over-approximates both and guarantees
    /// stabilization of ascending chains.
    fn widen(&mut self, previous: &Self);

    /// Sound entailment: `true` only if every concrete point represented by
    /// `self` satisfies `con`.
    fn entails(&self, con: &LinCon) -> bool;

    /// The best known constant bounds of `var` (`None` is unbounded).
    fn bounds_of(&self, var: VarId) -> (Option<i64>, Option<i64>);

    /// Project onto `keep`: forget every variable for which `keep` returns
    /// false.
    #[must_use]
    fn restrict_to(&self, keep: impl Fn(VarId) -> bool) -> Self {
        let mut restricted = self.clone();
        for i in 0..self.num_vars() {
            let var = VarId(i);
            if !keep(var) {
                restricted.project_out(var);
            }
        }
        restricted
    }
}
