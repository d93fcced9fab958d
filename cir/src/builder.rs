// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::body::{
    BasicBlock, BasicBlockData, Body, Local, LocalDecl, Statement, StatementKind, Terminator,
    TerminatorKind,
};
use crate::expr::Comparison;

/// Incremental construction of a [`Body`], used by tests and front-ends.
///
/// Blocks are created first and wired up afterwards; `finish` asserts that
/// every block got a terminator.
pub struct BodyBuilder {
    blocks: Vec<(Vec<Statement>, Option<Terminator>)>,
    local_decls: Vec<LocalDecl>,
}

impl BodyBuilder {
    pub fn new() -> Self {
        BodyBuilder {
            blocks: vec![],
            local_decls: vec![],
        }
    }

    pub fn new_local(&mut self, name: &str) -> Local {
        self.local_decls.push(LocalDecl {
            name: name.to_string(),
        });
        Local(self.local_decls.len() - 1)
    }

    pub fn new_block(&mut self) -> BasicBlock {
        self.blocks.push((vec![], None));
        BasicBlock(self.blocks.len() - 1)
    }

    pub fn push(&mut self, block: BasicBlock, kind: StatementKind) {
        self.blocks[block.0].0.push(Statement { kind });
    }

    pub fn goto(&mut self, block: BasicBlock, target: BasicBlock) {
        self.terminate(block, TerminatorKind::Goto { target });
    }

    pub fn branch(
        &mut self,
        block: BasicBlock,
        cond: Comparison,
        then_target: BasicBlock,
        else_target: BasicBlock,
    ) {
        self.terminate(
            block,
            TerminatorKind::If {
                cond,
                then_target,
                else_target,
            },
        );
    }

    pub fn ret(&mut self, block: BasicBlock) {
        self.terminate(block, TerminatorKind::Return);
    }

    fn terminate(&mut self, block: BasicBlock, kind: TerminatorKind) {
        let slot = &mut self.blocks[block.0].1;
        assert!(slot.is_none(), "{block} already has a terminator");
        *slot = Some(Terminator { kind });
    }

    pub fn finish(self) -> Body {
        let basic_blocks = self
            .blocks
            .into_iter()
            .enumerate()
            .map(|(i, (statements, terminator))| BasicBlockData {
                statements,
                terminator: terminator.unwrap_or_else(|| panic!("bb{i} has no terminator")),
            })
            .collect();
        Body {
            basic_blocks,
            local_decls: self.local_decls,
        }
    }
}

impl Default for BodyBuilder {
    fn default() -> Self {
        BodyBuilder::new()
    }
}
