// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

mod utils;

use analysis::domains::numeric::{IntervalDomain, PolyhedraDomain};
use analysis::domains::{BoundsAnalysis, BoundsReport, Verdict};
use analysis::AnalysisError;
use cir::{
    AccessKind, BodyBuilder, CmpOp, Comparison, GlobalDecl, LinearExpr, Program, Region,
    RegionDecl, Rvalue, StatementKind, Thread, Var,
};
use utils::*;

/// The verdict pattern of one fixture loop: store/load at `i`, `i + 1`,
/// `i - 1`.
const EXPECTED: [Verdict; 6] = [
    Verdict::NoWarn,
    Verdict::Warn,
    Verdict::Warn,
    Verdict::NoWarn,
    Verdict::Warn,
    Verdict::Warn,
];

#[test]
fn polyhedra_prove_exactly_the_in_bounds_accesses() {
    // Scenario A: with the relational domain, `gptr[i]` is proven safe and
    // the shifted offsets are not, in both threads.
    let program = multi_thread_fixture(true);
    let report = BoundsAnalysis::<PolyhedraDomain>::new(&program)
        .run_analysis()
        .unwrap();

    for thread in ["main", "t_other"] {
        let accesses = report.accesses_of_thread(thread);
        assert_eq!(accesses.len(), 6, "thread {thread}");
        let verdicts: Vec<Verdict> = accesses.iter().map(|a| a.verdict).collect();
        assert_eq!(verdicts, EXPECTED, "thread {thread}");
    }

    // The warnings are precise about which bound failed.
    let main = report.accesses_of_thread("main");
    assert!(main[1].lower_bound_proved && !main[1].upper_bound_proved);
    assert!(!main[2].lower_bound_proved && main[2].upper_bound_proved);
    assert!(main[0].allocation_proved);
}

#[test]
fn interval_ablation_warns_everywhere() {
    // Scenario B: the non-relational domain loses the i/len correlation and
    // must conservatively warn on all six accesses per thread.
    let program = multi_thread_fixture(true);
    let report = BoundsAnalysis::<IntervalDomain>::new(&program)
        .run_analysis()
        .unwrap();

    assert_eq!(report.warn_count(), 12);
    for access in &report.accesses {
        assert_eq!(access.verdict, Verdict::Warn, "{access}");
    }
}

#[test]
fn lock_symmetry_gives_identical_verdicts() {
    let program = multi_thread_fixture(true);
    let report = BoundsAnalysis::<PolyhedraDomain>::new(&program)
        .run_analysis()
        .unwrap();

    let main: Vec<_> = report
        .accesses_of_thread("main")
        .iter()
        .map(|a| (a.statement.clone(), a.verdict))
        .collect();
    let other: Vec<_> = report
        .accesses_of_thread("t_other")
        .iter()
        .map(|a| (a.statement.clone(), a.verdict))
        .collect();
    assert_eq!(main, other);
}

#[test]
fn unlocked_loops_keep_the_proof_for_stable_variables() {
    // `len` is only written before the spawn, so even without the mutex the
    // per-thread-sequential relation 0 <= i < len survives.
    let program = multi_thread_fixture(false);
    let report = BoundsAnalysis::<PolyhedraDomain>::new(&program)
        .run_analysis()
        .unwrap();

    for thread in ["main", "t_other"] {
        let verdicts: Vec<Verdict> = report
            .accesses_of_thread(thread)
            .iter()
            .map(|a| a.verdict)
            .collect();
        assert_eq!(verdicts, EXPECTED, "thread {thread}");
    }
}

#[test]
fn reruns_are_idempotent() {
    let program = multi_thread_fixture(true);
    let first = BoundsAnalysis::<PolyhedraDomain>::new(&program)
        .run_analysis()
        .unwrap();
    let second = BoundsAnalysis::<PolyhedraDomain>::new(&program)
        .run_analysis()
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn protected_invariant_carries_relations_between_threads() {
    // The writer publishes g == h at unlock; the locked reader can prove
    // r[g - h] in bounds only through that relational fact.
    let program = relational_invariant_fixture(true);
    let report = BoundsAnalysis::<PolyhedraDomain>::new(&program)
        .run_analysis()
        .unwrap();
    let accesses = report.accesses_of_thread("main");
    assert_eq!(accesses.len(), 1);
    assert_eq!(accesses[0].verdict, Verdict::NoWarn, "{}", accesses[0]);
}

#[test]
fn unprotected_reads_do_not_inherit_relations() {
    // Same program, but the reader does not take the lock: g and h must be
    // havocked at the read and the relation is gone.
    let program = relational_invariant_fixture(false);
    let report = BoundsAnalysis::<PolyhedraDomain>::new(&program)
        .run_analysis()
        .unwrap();
    let accesses = report.accesses_of_thread("main");
    assert_eq!(accesses.len(), 1);
    assert_eq!(accesses[0].verdict, Verdict::Warn, "{}", accesses[0]);
    assert!(!accesses[0].lower_bound_proved);
}

fn single_thread(body: cir::Body, regions: usize) -> Program {
    let program = Program {
        globals: vec![GlobalDecl {
            name: "n".to_string(),
            init: Some(0),
        }],
        locks: vec![],
        regions: (0..regions)
            .map(|i| RegionDecl {
                name: format!("r{i}"),
            })
            .collect(),
        threads: vec![Thread {
            name: "main".to_string(),
            body,
        }],
    };
    program
}

#[test]
fn accesses_to_dead_or_unallocated_regions_warn() {
    let mut b = BodyBuilder::new();
    let entry = b.new_block();
    // Access before any allocation.
    b.push(
        entry,
        StatementKind::Index {
            region: Region(0),
            offset: LinearExpr::constant(0),
            kind: AccessKind::Load,
        },
    );
    b.push(
        entry,
        StatementKind::Alloc {
            region: Region(0),
            len: LinearExpr::constant(4),
        },
    );
    // In bounds while allocated.
    b.push(
        entry,
        StatementKind::Index {
            region: Region(0),
            offset: LinearExpr::constant(2),
            kind: AccessKind::Store,
        },
    );
    b.push(entry, StatementKind::Dealloc { region: Region(0) });
    // Use after free.
    b.push(
        entry,
        StatementKind::Index {
            region: Region(0),
            offset: LinearExpr::constant(0),
            kind: AccessKind::Load,
        },
    );
    b.ret(entry);

    let program = single_thread(b.finish(), 1);
    assert_eq!(program.validate(), Ok(()));
    let report = BoundsAnalysis::<PolyhedraDomain>::new(&program)
        .run_analysis()
        .unwrap();

    let verdicts: Vec<Verdict> = report.accesses.iter().map(|a| a.verdict).collect();
    assert_eq!(verdicts, [Verdict::Warn, Verdict::NoWarn, Verdict::Warn]);
    assert!(!report.accesses[0].allocation_proved);
    assert!(!report.accesses[2].allocation_proved);
}

#[test]
fn unknown_region_aborts_the_analysis() {
    let mut b = BodyBuilder::new();
    let entry = b.new_block();
    b.push(
        entry,
        StatementKind::Index {
            region: Region(5),
            offset: LinearExpr::constant(0),
            kind: AccessKind::Load,
        },
    );
    b.ret(entry);

    // Bypasses `Program::validate` on purpose: the engine must fail
    // cleanly on its own.
    let program = single_thread(b.finish(), 1);
    let err = BoundsAnalysis::<PolyhedraDomain>::new(&program)
        .run_analysis()
        .unwrap_err();
    assert!(matches!(err, AnalysisError::UnknownAllocation(..)));
    assert!(err.to_pretty_str(&program).contains("unregistered"));
}

#[test]
fn widening_terminates_unbounded_loops() {
    // i counts up forever; the analysis must still reach a fixpoint and
    // warn about the unprovable upper bound.
    let mut b = BodyBuilder::new();
    let i = b.new_local("i");
    let entry = b.new_block();
    let head = b.new_block();
    let body = b.new_block();
    let exit = b.new_block();

    b.push(
        entry,
        StatementKind::Alloc {
            region: Region(0),
            len: LinearExpr::constant(3),
        },
    );
    b.push(
        entry,
        StatementKind::Assign(Var::Local(i), Rvalue::Use(LinearExpr::constant(0))),
    );
    b.goto(entry, head);
    b.branch(
        head,
        Comparison::new(LinearExpr::local(i), CmpOp::Ge, LinearExpr::constant(0)),
        body,
        exit,
    );
    b.push(
        body,
        StatementKind::Index {
            region: Region(0),
            offset: LinearExpr::local(i),
            kind: AccessKind::Store,
        },
    );
    b.push(
        body,
        StatementKind::Assign(
            Var::Local(i),
            Rvalue::Use(LinearExpr::local(i).plus_const(1)),
        ),
    );
    b.goto(body, head);
    b.ret(exit);

    let program = single_thread(b.finish(), 1);
    assert_eq!(program.validate(), Ok(()));

    for_all_domains(&program, |report| {
        assert_eq!(report.accesses.len(), 1);
        assert_eq!(report.accesses[0].verdict, Verdict::Warn);
        // The lower bound is still provable from the loop guard.
        assert!(report.accesses[0].lower_bound_proved);
        assert!(!report.accesses[0].upper_bound_proved);
    });
}

fn for_all_domains(program: &Program, check: impl Fn(&BoundsReport)) {
    let report = BoundsAnalysis::<PolyhedraDomain>::new(program)
        .run_analysis()
        .unwrap();
    check(&report);
    let report = BoundsAnalysis::<IntervalDomain>::new(program)
        .run_analysis()
        .unwrap();
    check(&report);
}
