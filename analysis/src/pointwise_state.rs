// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use cir::{BasicBlock, Body, Location};
use rustc_hash::FxHashMap;
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::{collections::BTreeMap, fmt};

/// Records the state of the analysis at every program point and CFG edge of
/// `body`.
pub struct PointwiseState<'a, S: Serialize> {
    state_before: FxHashMap<Location, S>,
    /// Maps each basic block to a map of its successor blocks to the state
    /// on the CFG edge.
    state_after_block: FxHashMap<BasicBlock, FxHashMap<BasicBlock, S>>,
    // Needed for translation of locations to statements in serialization.
    pub(crate) body: &'a Body,
}

impl<'a, S: Serialize + fmt::Debug> fmt::Debug for PointwiseState<'a, S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // ignore body
        f.debug_struct("PointwiseState")
            .field("state_before", &self.state_before)
            .field("state_after_block", &self.state_after_block)
            .finish()
    }
}

impl<'a, S: Serialize> Serialize for PointwiseState<'a, S> {
    /// Serialize by translating to a combination of vectors, tuples and
    /// ordered maps, such that serde can do the rest. Ordering is
    /// deterministic so that serialized dumps can be diffed.
    fn serialize<Se: Serializer>(&self, serializer: Se) -> Result<Se::Ok, Se::Error> {
        let mut map = serializer.serialize_map(Some(self.body.basic_blocks.len()))?;

        for block in self.body.block_ids() {
            let statements = &self.body[block].statements;
            let mut stmt_vec: Vec<_> = Vec::with_capacity(statements.len());
            for (statement_index, stmt) in statements.iter().enumerate() {
                let location = Location {
                    block,
                    statement_index,
                };
                let state = self.lookup_before(location);
                stmt_vec.push(("state:", state, format!("statement: {stmt}")));
            }

            let term_location = self.body.terminator_loc(block);
            let state_before = self.lookup_before(term_location);
            let terminator_str = format!("terminator: {}", self.body[block].terminator);

            let empty_map = FxHashMap::default();
            let map_after = self.lookup_after_block(block).unwrap_or(&empty_map);
            let ordered_succ_map: BTreeMap<_, _> = map_after
                .iter()
                .map(|(bb, s)| (format!("{bb}"), ("state:", s)))
                .collect();

            map.serialize_entry(
                &format!("{block}"),
                &(
                    stmt_vec,
                    "state before terminator:",
                    state_before,
                    terminator_str,
                    ordered_succ_map,
                ),
            )?;
        }
        map.end()
    }
}

impl<'a, S: Serialize> PointwiseState<'a, S> {
    pub fn new(body: &'a Body) -> Self {
        Self {
            state_before: FxHashMap::default(),
            state_after_block: FxHashMap::default(),
            body,
        }
    }

    /// Look up the state before the `location`.
    /// The `location` can point to a statement or terminator.
    pub fn lookup_before(&self, location: Location) -> Option<&S> {
        self.state_before.get(&location)
    }

    /// Look up the state after the `location`.
    /// The `location` should point to a statement, not a terminator.
    pub fn lookup_after(&self, location: Location) -> Option<&S> {
        debug_assert!(location.statement_index < self.body[location.block].statements.len());
        self.state_before.get(&location.successor_within_block())
    }

    /// Look up the state on the outgoing CFG edges of `block`.
    /// The return value maps all successor blocks to the state on the CFG
    /// edge from `block` to that block.
    pub fn lookup_after_block(&self, block: BasicBlock) -> Option<&FxHashMap<BasicBlock, S>> {
        self.state_after_block.get(&block)
    }

    /// Return the mutable state of the analysis on the outgoing CFG edges
    /// of `block`.
    pub(crate) fn lookup_mut_after_block(
        &mut self,
        block: BasicBlock,
    ) -> &mut FxHashMap<BasicBlock, S> {
        self.state_after_block.entry(block).or_default()
    }

    /// Update the state before the `location`.
    /// The `location` can point to a statement or terminator.
    pub(crate) fn set_before(&mut self, location: Location, state: S) {
        self.state_before.insert(location, state);
    }
}
