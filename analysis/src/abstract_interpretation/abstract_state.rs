// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::Serialize;

/// An element of the abstract lattice tracked per program point.
///
/// `Serialize` is required so that `PointwiseState` can be dumped for
/// inspection and tests.
pub trait AbstractState: Clone + Eq + Serialize {
    fn is_bottom(&self) -> bool;

    /// Least upper bound; must over-approximate both operands and be
    /// monotone, otherwise the fixpoint iteration loses soundness or fails
    /// to converge.
    fn join(&mut self, other: &Self);

    /// Widening, applied by the engine once a block has been revisited more
    /// than the configured threshold. `self` is the joined new state,
    /// `previous` the state it replaces; the result must over-approximate
    /// both.
    fn widen(&mut self, previous: &Self);
}
