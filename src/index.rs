//! Label-class index.
//!
//! Maps each [`LabelClass`] to the set of node or edge ids currently
//! bearing that class. Because the class set is small and closed, the
//! index is a fixed array of buckets addressed by
//! [`LabelClass::as_index`]; no hashing is involved.
//!
//! # Invariants
//! - Every live entity id appears in exactly the bucket of its current
//!   class, and in no other bucket.
//! - Bucket order is unspecified; callers must treat a bucket as an
//!   unordered set.

use crate::label::LabelClass;

/// Per-class buckets of entity ids.
///
/// The graph keeps one `ClassIndex<NodeId>` and one `ClassIndex<EdgeId>`
/// and updates them on every add, remove, and relabel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIndex<I> {
    buckets: [Vec<I>; LabelClass::COUNT],
}

impl<I: Copy + Eq> ClassIndex<I> {
    /// Creates an index with all buckets empty.
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// Records `id` under `class`.
    pub fn insert(&mut self, class: LabelClass, id: I) {
        self.buckets[class.as_index()].push(id);
    }

    /// Removes `id` from the bucket of `class`.
    ///
    /// Returns whether the id was present. Removal swaps with the last
    /// entry, so bucket order is not preserved.
    pub fn remove(&mut self, class: LabelClass, id: I) -> bool {
        let bucket = &mut self.buckets[class.as_index()];
        match bucket.iter().position(|entry| *entry == id) {
            Some(position) => {
                bucket.swap_remove(position);
                true
            }
            None => false,
        }
    }

    /// Moves `id` from the bucket of `old` to the bucket of `new`.
    ///
    /// A no-op when the classes are equal: no duplicate entry is created
    /// and nothing is removed. The remove/insert pair completes within
    /// this call, so no caller can observe the id in neither bucket.
    pub fn reclassify(&mut self, old: LabelClass, new: LabelClass, id: I) {
        if old == new {
            return;
        }
        self.remove(old, id);
        self.insert(new, id);
    }

    /// The ids currently classified under `class`, in unspecified order.
    #[inline]
    pub fn bucket(&self, class: LabelClass) -> &[I] {
        &self.buckets[class.as_index()]
    }

    /// Total entries across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Whether every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Empties every bucket.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }
}

impl<I: Copy + Eq> Default for ClassIndex<I> {
    fn default() -> Self {
        Self::new()
    }
}
