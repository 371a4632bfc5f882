//! Id presence sets.
//!
//! Two representations, picked per use site by expected density:
//!
//! - [`DenseIdSet`]: roaring treemap, O(1)-ish queries, compact when ids
//!   cluster (e.g. "every point referenced by some line")
//! - [`SortedIdSet`]: append, then sort once, then binary search; lowest
//!   memory for a few ids spread over a huge id space (e.g. "every point
//!   at a shared location")

use roaring::RoaringTreemap;

/// Set of positive ids.
///
/// Implementations may require [`IdSet::seal`] between the last `insert` and
/// the first `contains`.
pub trait IdSet: Default {
    fn insert(&mut self, id: u64);

    /// Prepare for queries. Idempotent.
    fn seal(&mut self);

    fn contains(&self, id: u64) -> bool;

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bitmap-backed id set.
#[derive(Debug, Clone, Default)]
pub struct DenseIdSet {
    bits: RoaringTreemap,
}

impl DenseIdSet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdSet for DenseIdSet {
    fn insert(&mut self, id: u64) {
        self.bits.insert(id);
    }

    fn seal(&mut self) {}

    fn contains(&self, id: u64) -> bool {
        self.bits.contains(id)
    }

    fn len(&self) -> u64 {
        self.bits.len()
    }
}

/// Vector-backed id set with an explicit sort step.
#[derive(Debug, Clone, Default)]
pub struct SortedIdSet {
    ids: Vec<u64>,
    sealed: bool,
}

impl SortedIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn is_sealed(&self) -> bool {
        self.sealed
    }

    #[cfg(test)]
    fn as_slice(&self) -> &[u64] {
        &self.ids
    }
}

impl IdSet for SortedIdSet {
    fn insert(&mut self, id: u64) {
        self.ids.push(id);
        self.sealed = false;
    }

    fn seal(&mut self) {
        if !self.sealed {
            self.ids.sort_unstable();
            self.ids.dedup();
            self.sealed = true;
        }
    }

    fn contains(&self, id: u64) -> bool {
        debug_assert!(self.sealed, "SortedIdSet queried before seal()");
        self.ids.binary_search(&id).is_ok()
    }

    fn len(&self) -> u64 {
        self.ids.len() as u64
    }
}

impl FromIterator<u64> for SortedIdSet {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        let mut set = SortedIdSet {
            ids: iter.into_iter().collect(),
            sealed: false,
        };
        set.seal();
        set
    }
}
