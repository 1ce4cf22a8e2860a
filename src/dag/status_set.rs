// src/dag/status_set.rs

//! Compact bit-indexed task sets over a fixed index space.

const WORD_BITS: usize = u64::BITS as usize;

/// Fixed-capacity bitset over phase-local task indices.
///
/// The phase scheduler keeps one per bookkeeping category (scheduled,
/// completed, failed). Out-of-range indices are ignored on insert/remove and
/// reported as absent on lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSet {
    words: Vec<u64>,
    capacity: usize,
    count: usize,
}

impl StatusSet {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut set = Self::default();
        set.reset(capacity);
        set
    }

    /// Clear the set and resize it to `capacity` indices.
    pub fn reset(&mut self, capacity: usize) {
        self.words.clear();
        self.words.resize(capacity.div_ceil(WORD_BITS), 0);
        self.capacity = capacity;
        self.count = 0;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        if index >= self.capacity {
            return false;
        }
        self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    /// Returns `true` if the index was newly inserted.
    pub fn insert(&mut self, index: usize) -> bool {
        if index >= self.capacity || self.contains(index) {
            return false;
        }
        self.words[index / WORD_BITS] |= 1 << (index % WORD_BITS);
        self.count += 1;
        true
    }

    /// Returns `true` if the index was present.
    pub fn remove(&mut self, index: usize) -> bool {
        if !self.contains(index) {
            return false;
        }
        self.words[index / WORD_BITS] &= !(1 << (index % WORD_BITS));
        self.count -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_remove_and_count() {
        let mut set = StatusSet::with_capacity(130);
        assert!(set.is_empty());
        assert!(set.insert(0));
        assert!(set.insert(64));
        assert!(set.insert(129));
        assert!(!set.insert(64));
        assert_eq!(set.len(), 3);
        assert!(set.contains(129));
        assert!(!set.contains(128));

        assert!(set.remove(64));
        assert!(!set.remove(64));
        assert_eq!(set.len(), 2);
        assert!(set.contains(0));
        assert!(!set.contains(64));
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut set = StatusSet::with_capacity(3);
        assert!(!set.insert(3));
        assert!(!set.contains(100));
        assert!(!set.remove(7));
        assert!(set.is_empty());
    }

    #[test]
    fn reset_clears_and_resizes() {
        let mut set = StatusSet::with_capacity(2);
        set.insert(0);
        set.insert(1);
        assert!(!set.insert(4));

        set.reset(5);
        assert!(set.is_empty());
        assert!(!set.contains(0));
        assert!(set.insert(4));
        assert_eq!(set.len(), 1);
    }
}
