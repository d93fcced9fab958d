// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use cir::{
    AccessKind, BodyBuilder, CmpOp, Comparison, GlobalDecl, GlobalId, LinearExpr, LockDecl,
    LockId, Program, Region, RegionDecl, Rvalue, StatementKind, Thread, ThreadId, Var,
};

pub const LEN: GlobalId = GlobalId(0);
pub const GPTR: Region = Region(0);
pub const MTX: LockId = LockId(0);

/// The six accesses of the fixture loop: store and load at offsets
/// `i`, `i + 1` and `i - 1`.
fn push_accesses(b: &mut BodyBuilder, block: cir::BasicBlock, i: cir::Local) {
    for kind in [AccessKind::Store, AccessKind::Load] {
        for delta in [0, 1, -1] {
            b.push(
                block,
                StatementKind::Index {
                    region: GPTR,
                    offset: LinearExpr::local(i).plus_const(delta),
                    kind,
                },
            );
        }
    }
}

/// A loop `for i in 0..len { <accesses> }`, optionally guarded by the mutex.
fn scanning_thread(name: &str, locked: bool) -> Thread {
    let mut b = BodyBuilder::new();
    let i = b.new_local("i");
    let entry = b.new_block();
    let head = b.new_block();
    let body = b.new_block();
    let exit = b.new_block();

    if locked {
        b.push(entry, StatementKind::Lock(MTX));
    }
    b.push(
        entry,
        StatementKind::Assign(Var::Local(i), Rvalue::Use(LinearExpr::constant(0))),
    );
    b.goto(entry, head);
    b.branch(
        head,
        Comparison::new(LinearExpr::local(i), CmpOp::Lt, LinearExpr::global(LEN)),
        body,
        exit,
    );
    push_accesses(&mut b, body, i);
    b.push(
        body,
        StatementKind::Assign(
            Var::Local(i),
            Rvalue::Use(LinearExpr::local(i).plus_const(1)),
        ),
    );
    b.goto(body, head);
    if locked {
        b.push(exit, StatementKind::Unlock(MTX));
    }
    b.ret(exit);

    Thread {
        name: name.to_string(),
        body: b.finish(),
    }
}

/// The two-thread fixture: `len = rand() % 10`, a shared allocation of that
/// length, and two identical lock-guarded scanning loops.
///
/// ```c
/// len = rand(); len %= 10; gptr = malloc(sizeof(int) * len);
/// pthread_create(&thread, NULL, t_other, NULL);
/// pthread_mutex_lock(&mtx); for (i = 0; i < len; i++) { ... } ...
/// ```
pub fn multi_thread_fixture(locked: bool) -> Program {
    let mut b = BodyBuilder::new();
    let i = b.new_local("i");
    let entry = b.new_block();
    let head = b.new_block();
    let body = b.new_block();
    let exit = b.new_block();

    b.push(entry, StatementKind::Assign(Var::Global(LEN), Rvalue::Nondet));
    b.push(
        entry,
        StatementKind::Assign(Var::Global(LEN), Rvalue::Rem(LinearExpr::global(LEN), 10)),
    );
    b.push(
        entry,
        StatementKind::Alloc {
            region: GPTR,
            len: LinearExpr::global(LEN),
        },
    );
    b.push(entry, StatementKind::Spawn(ThreadId(1)));
    if locked {
        b.push(entry, StatementKind::Lock(MTX));
    }
    b.push(
        entry,
        StatementKind::Assign(Var::Local(i), Rvalue::Use(LinearExpr::constant(0))),
    );
    b.goto(entry, head);
    b.branch(
        head,
        Comparison::new(LinearExpr::local(i), CmpOp::Lt, LinearExpr::global(LEN)),
        body,
        exit,
    );
    push_accesses(&mut b, body, i);
    b.push(
        body,
        StatementKind::Assign(
            Var::Local(i),
            Rvalue::Use(LinearExpr::local(i).plus_const(1)),
        ),
    );
    b.goto(body, head);
    if locked {
        b.push(exit, StatementKind::Unlock(MTX));
    }
    b.push(exit, StatementKind::Join(ThreadId(1)));
    b.push(
        exit,
        StatementKind::Dealloc { region: GPTR },
    );
    b.ret(exit);

    let program = Program {
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
        threads: vec![
            Thread {
                name: "main".to_string(),
                body: b.finish(),
            },
            scanning_thread("t_other", locked),
        ],
    };
    assert_eq!(program.validate(), Ok(()));
    program
}

/// A protected relational invariant: the writer establishes `g == h` under
/// the lock, the reader accesses `r[g - h]` (optionally) under the same
/// lock against an allocation of length 1.
pub fn relational_invariant_fixture(reader_locked: bool) -> Program {
    let g = GlobalId(0);
    let h = GlobalId(1);
    let r = Region(0);

    let mut main = BodyBuilder::new();
    let entry = main.new_block();
    main.push(
        entry,
        StatementKind::Alloc {
            region: r,
            len: LinearExpr::constant(1),
        },
    );
    main.push(entry, StatementKind::Spawn(ThreadId(1)));
    if reader_locked {
        main.push(entry, StatementKind::Lock(MTX));
    }
    main.push(
        entry,
        StatementKind::Index {
            region: r,
            offset: LinearExpr::global(g).minus(&LinearExpr::global(h)),
            kind: AccessKind::Load,
        },
    );
    if reader_locked {
        main.push(entry, StatementKind::Unlock(MTX));
    }
    main.push(entry, StatementKind::Join(ThreadId(1)));
    main.ret(entry);

    let mut writer = BodyBuilder::new();
    let wb = writer.new_block();
    writer.push(wb, StatementKind::Lock(MTX));
    writer.push(wb, StatementKind::Assign(Var::Global(g), Rvalue::Nondet));
    writer.push(
        wb,
        StatementKind::Assign(Var::Global(h), Rvalue::Use(LinearExpr::global(g))),
    );
    writer.push(wb, StatementKind::Unlock(MTX));
    writer.ret(wb);

    let program = Program {
        globals: vec![
            GlobalDecl {
                name: "g".to_string(),
                init: Some(0),
            },
            GlobalDecl {
                name: "h".to_string(),
                init: Some(0),
            },
        ],
        locks: vec![LockDecl {
            name: "mtx".to_string(),
        }],
        regions: vec![RegionDecl {
            name: "r".to_string(),
        }],
        threads: vec![
            Thread {
                name: "main".to_string(),
                body: main.finish(),
            },
            Thread {
                name: "writer".to_string(),
                body: writer.finish(),
            },
        ],
    };
    assert_eq!(program.validate(), Ok(()));
    program
}
