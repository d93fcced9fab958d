// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use cir::{
    AccessKind, BodyBuilder, CmpOp, Comparison, GlobalDecl, GlobalId, LinearExpr, LockDecl,
    LockId, Program, Region, RegionDecl, Rvalue, StatementKind, Thread, Var,
};

/// A single-threaded allocate-and-scan program, the driver's input shape.
fn scan_program() -> Program {
    let mut b = BodyBuilder::new();
    let i = b.new_local("i");
    let len = GlobalId(0);

    let entry = b.new_block();
    let head = b.new_block();
    let body = b.new_block();
    let exit = b.new_block();

    b.push(entry, StatementKind::Assign(Var::Global(len), Rvalue::Nondet));
    b.push(
        entry,
        StatementKind::Assign(
            Var::Global(len),
            Rvalue::Rem(LinearExpr::global(len), 10),
        ),
    );
    b.push(
        entry,
        StatementKind::Alloc {
            region: Region(0),
            len: LinearExpr::global(len),
        },
    );
    b.push(
        entry,
        StatementKind::Assign(Var::Local(i), Rvalue::Use(LinearExpr::constant(0))),
    );
    b.goto(entry, head);
    b.branch(
        head,
        Comparison::new(LinearExpr::local(i), CmpOp::Lt, LinearExpr::global(len)),
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
    b.push(exit, StatementKind::Lock(LockId(0)));
    b.push(exit, StatementKind::Unlock(LockId(0)));
    b.ret(exit);

    Program {
        globals: vec![GlobalDecl {
            name: "len".to_string(),
            init: Some(0),
        }],
        locks: vec![LockDecl {
            name: "mtx".to_string(),
        }],
        regions: vec![RegionDecl {
            name: "gptr".to_string(),
        }],
        threads: vec![Thread {
            name: "main".to_string(),
            body: b.finish(),
        }],
    }
}

#[test]
fn json_round_trip_preserves_the_model() {
    let program = scan_program();
    assert_eq!(program.validate(), Ok(()));

    let json = serde_json::to_string_pretty(&program).unwrap();
    let back: Program = serde_json::from_str(&json).unwrap();
    assert_eq!(back, program);
}

#[test]
fn validate_rejects_dangling_indices() {
    let mut program = scan_program();
    program.locks.clear();
    let err = program.validate().unwrap_err();
    assert!(err.contains("unknown lock"), "unexpected error: {err}");
}
