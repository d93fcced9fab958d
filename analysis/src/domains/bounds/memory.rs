// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{
    abstract_interpretation::AnalysisResult,
    domains::numeric::{LinCon, LinExpr, VarId},
    AnalysisError,
};
use cir::{CmpOp, Comparison, GlobalId, Local, Location, Program, Region, ThreadId, Var};

/// The abstract memory model: lays out the dense numeric variable space and
/// hands out the length pseudo-variable of each registered allocation.
///
/// Layout: shared globals first, then one length variable per region, then
/// the locals of every thread. Everything below `num_shared` is visible to
/// all threads and subject to the invariant-exchange protocol.
pub struct VarMap {
    num_globals: usize,
    num_regions: usize,
    local_offsets: Vec<usize>,
    num_vars: usize,
}

impl VarMap {
    pub fn new(program: &Program) -> Self {
        let num_globals = program.globals.len();
        let num_regions = program.regions.len();
        let mut next = num_globals + num_regions;
        let mut local_offsets = Vec::with_capacity(program.threads.len());
        for thread in &program.threads {
            local_offsets.push(next);
            next += thread.body.local_decls.len();
        }
        VarMap {
            num_globals,
            num_regions,
            local_offsets,
            num_vars: next,
        }
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    fn num_shared(&self) -> usize {
        self.num_globals + self.num_regions
    }

    pub fn global(&self, global: GlobalId) -> VarId {
        debug_assert!(global.0 < self.num_globals);
        VarId(global.0)
    }

    pub fn local(&self, thread: ThreadId, local: Local) -> VarId {
        VarId(self.local_offsets[thread.0] + local.0)
    }

    pub fn var(&self, thread: ThreadId, var: Var) -> VarId {
        match var {
            Var::Global(global) => self.global(global),
            Var::Local(local) => self.local(thread, local),
        }
    }

    /// The length pseudo-variable of `region`.
    ///
    /// Fails with [`AnalysisError::UnknownAllocation`] when the region was
    /// never registered; for well-formed models this is an internal
    /// invariant violation, not a user error.
    pub fn length_of(
        &self,
        region: Region,
        thread: ThreadId,
        location: Location,
    ) -> AnalysisResult<VarId> {
        if region.0 >= self.num_regions {
            return Err(AnalysisError::UnknownAllocation(region, thread, location));
        }
        Ok(VarId(self.num_globals + region.0))
    }

    /// Whether the variable is visible to more than one thread: a global or
    /// an allocation length.
    pub fn is_shared(&self, var: VarId) -> bool {
        var.0 < self.num_shared()
    }

    pub fn shared_var_ids(&self) -> impl Iterator<Item = VarId> {
        (0..self.num_shared()).map(VarId)
    }

    pub fn lower_expr(&self, thread: ThreadId, expr: &cir::LinearExpr) -> LinExpr {
        let mut lowered = LinExpr::constant(expr.constant_part());
        for &(var, coeff) in expr.terms() {
            lowered.add_term(self.var(thread, var), coeff);
        }
        lowered
    }

    /// Lower a branch condition to a constraint, or `None` when the
    /// condition is not convex (`!=`) and has to be ignored.
    pub fn lower_comparison(&self, thread: ThreadId, cond: &Comparison) -> Option<LinCon> {
        let lhs = self.lower_expr(thread, &cond.lhs);
        let rhs = self.lower_expr(thread, &cond.rhs);
        match cond.op {
            CmpOp::Lt => Some(LinCon::lt(lhs, rhs)),
            CmpOp::Le => Some(LinCon::le(lhs, rhs)),
            CmpOp::Gt => Some(LinCon::lt(rhs, lhs)),
            CmpOp::Ge => Some(LinCon::le(rhs, lhs)),
            CmpOp::Eq => Some(LinCon::eq(lhs, rhs)),
            CmpOp::Ne => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cir::{BodyBuilder, GlobalDecl, RegionDecl, Thread};

    fn program() -> Program {
        let mut main = BodyBuilder::new();
        main.new_local("i");
        main.new_local("tmp");
        let b = main.new_block();
        main.ret(b);
        let mut other = BodyBuilder::new();
        other.new_local("j");
        let b = other.new_block();
        other.ret(b);
        Program {
            globals: vec![GlobalDecl {
                name: "len".to_string(),
                init: Some(0),
            }],
            locks: vec![],
            regions: vec![RegionDecl {
                name: "gptr".to_string(),
            }],
            threads: vec![
                Thread {
                    name: "main".to_string(),
                    body: main.finish(),
                },
                Thread {
                    name: "other".to_string(),
                    body: other.finish(),
                },
            ],
        }
    }

    #[test]
    fn layout_separates_shared_and_locals() {
        let program = program();
        let map = VarMap::new(&program);
        assert_eq!(map.num_vars(), 1 + 1 + 2 + 1);

        let len = map.global(GlobalId(0));
        let length = map
            .length_of(Region(0), ThreadId(0), Location {
                block: cir::BasicBlock(0),
                statement_index: 0,
            })
            .unwrap();
        assert!(map.is_shared(len));
        assert!(map.is_shared(length));
        assert_ne!(len, length);

        let i = map.local(ThreadId(0), Local(0));
        let j = map.local(ThreadId(1), Local(0));
        assert!(!map.is_shared(i));
        assert!(!map.is_shared(j));
        assert_ne!(i, j);
    }

    #[test]
    fn unknown_region_is_a_model_error() {
        let program = program();
        let map = VarMap::new(&program);
        let err = map
            .length_of(Region(7), ThreadId(0), Location {
                block: cir::BasicBlock(0),
                statement_index: 0,
            })
            .unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownAllocation(..)));
    }
}
