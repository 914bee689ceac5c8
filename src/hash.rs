//! Fixed-seed hasher for the runtime's internal collections.
//!
//! Subscriber sets, the pending-watcher set and the renderer registry are
//! keyed by small ids or identifiers we control, so HashDoS resistance buys
//! nothing there. foldhash with a constant seed keeps the builder zero-sized.

use std::hash::BuildHasher;

use foldhash::fast::{FixedState, FoldHasher};

const SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Zero-sized `BuildHasher` backed by foldhash with a constant seed.
#[derive(Clone, Copy, Debug, Default)]
pub struct FastHashBuilder;

impl BuildHasher for FastHashBuilder {
    type Hasher = FoldHasher<'static>;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FixedState::with_seed(SEED).build_hasher()
    }
}
