// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::body::Local;
use crate::program::GlobalId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A variable reference: a thread-local or a shared global.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Var {
    Local(Local),
    Global(GlobalId),
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Var::Local(local) => write!(f, "{local}"),
            Var::Global(global) => write!(f, "{global}"),
        }
    }
}

/// An affine expression `c_1 * v_1 + ... + c_n * v_n + constant`.
///
/// Terms are kept sorted by variable and free of zero coefficients and
/// duplicates, so that structurally equal expressions compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinearExpr {
    terms: Vec<(Var, i64)>,
    constant: i64,
}

impl LinearExpr {
    pub fn constant(value: i64) -> Self {
        LinearExpr {
            terms: vec![],
            constant: value,
        }
    }

    pub fn var(var: Var) -> Self {
        LinearExpr {
            terms: vec![(var, 1)],
            constant: 0,
        }
    }

    pub fn local(local: Local) -> Self {
        Self::var(Var::Local(local))
    }

    pub fn global(global: GlobalId) -> Self {
        Self::var(Var::Global(global))
    }

    pub fn terms(&self) -> &[(Var, i64)] {
        &self.terms
    }

    pub fn constant_part(&self) -> i64 {
        self.constant
    }

    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        self.terms.iter().map(|(var, _)| var)
    }

    pub fn coefficient_of(&self, var: Var) -> i64 {
        self.terms
            .iter()
            .find(|(v, _)| *v == var)
            .map(|&(_, c)| c)
            .unwrap_or(0)
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    #[must_use]
    pub fn plus_const(mut self, value: i64) -> Self {
        self.constant += value;
        self
    }

    #[must_use]
    pub fn plus(mut self, other: &LinearExpr) -> Self {
        for &(var, coeff) in &other.terms {
            self.add_term(var, coeff);
        }
        self.constant += other.constant;
        self
    }

    #[must_use]
    pub fn minus(self, other: &LinearExpr) -> Self {
        self.plus(&other.clone().scaled(-1))
    }

    #[must_use]
    pub fn scaled(mut self, factor: i64) -> Self {
        if factor == 0 {
            return LinearExpr::constant(0);
        }
        for term in &mut self.terms {
            term.1 *= factor;
        }
        self.constant *= factor;
        self
    }

    fn add_term(&mut self, var: Var, coeff: i64) {
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
}

impl fmt::Display for LinearExpr {
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

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn negate(self) -> CmpOp {
        match self {
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        };
        write!(f, "{s}")
    }
}

/// A comparison between two affine expressions, used as a branch condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub lhs: LinearExpr,
    pub op: CmpOp,
    pub rhs: LinearExpr,
}

impl Comparison {
    pub fn new(lhs: LinearExpr, op: CmpOp, rhs: LinearExpr) -> Self {
        Comparison { lhs, op, rhs }
    }

    #[must_use]
    pub fn negate(&self) -> Comparison {
        Comparison {
            lhs: self.lhs.clone(),
            op: self.op.negate(),
            rhs: self.rhs.clone(),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(i: usize) -> Var {
        Var::Local(Local(i))
    }

    #[test]
    fn terms_are_merged_and_normalized() {
        let e = LinearExpr::var(local(1))
            .plus(&LinearExpr::var(local(1)))
            .plus_const(3);
        assert_eq!(e.coefficient_of(local(1)), 2);
        assert_eq!(e.constant_part(), 3);

        let zero = e.clone().minus(&e);
        assert!(zero.is_constant());
        assert_eq!(zero.constant_part(), 0);
    }

    #[test]
    fn display_is_readable() {
        let e = LinearExpr::var(local(0))
            .plus(&LinearExpr::var(local(2)).scaled(-1))
            .plus_const(-1);
        assert_eq!(format!("{e}"), "_0 - _2 - 1");
        assert_eq!(format!("{}", LinearExpr::constant(7)), "7");
    }
}
