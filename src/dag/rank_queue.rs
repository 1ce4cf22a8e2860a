// src/dag/rank_queue.rs

//! Indexed binary min-heap keyed by "unresolved dependency count".

/// Ready queue of task indices ordered by rank.
///
/// Every key is a phase-local task index. `position[key]` tracks where the key
/// currently sits in `heap`, so any entry (not just the root) can have its
/// rank decremented in `O(log n)`.
///
/// Order among equal ranks is unspecified.
#[derive(Debug, Clone, Default)]
pub struct RankQueue {
    /// `(key, rank)` pairs in heap order.
    heap: Vec<(usize, u32)>,
    /// Heap slot per key; `None` once the key was popped (or never inserted).
    position: Vec<Option<usize>>,
}

impl RankQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue contents with `items`, heapifying in one pass.
    ///
    /// Keys must be unique.
    pub fn build(&mut self, items: impl IntoIterator<Item = (usize, u32)>) {
        self.heap = items.into_iter().collect();

        let max_key = self.heap.iter().map(|&(key, _)| key + 1).max().unwrap_or(0);
        self.position = vec![None; max_key];
        for (slot, &(key, _)) in self.heap.iter().enumerate() {
            debug_assert!(self.position[key].is_none(), "duplicate key {key}");
            self.position[key] = Some(slot);
        }

        for slot in (0..self.heap.len() / 2).rev() {
            self.sift_down(slot);
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Minimum rank, without removing the entry.
    pub fn top_rank(&self) -> Option<u32> {
        self.heap.first().map(|&(_, rank)| rank)
    }

    /// Remove and return the minimum-rank key.
    pub fn pop(&mut self) -> Option<usize> {
        if self.heap.is_empty() {
            return None;
        }

        let last = self.heap.len() - 1;
        self.swap(0, last);
        let (key, _) = self.heap.pop()?;
        self.position[key] = None;

        if !self.heap.is_empty() {
            self.sift_down(0);
        }

        Some(key)
    }

    /// Lower the rank of `key` by one (saturating at zero) and restore heap
    /// order.
    ///
    /// Returns `false` if the key is not queued.
    pub fn decrement_rank(&mut self, key: usize) -> bool {
        let Some(slot) = self.slot_of(key) else {
            return false;
        };

        let rank = &mut self.heap[slot].1;
        *rank = rank.saturating_sub(1);
        self.sift_up(slot);
        true
    }

    fn slot_of(&self, key: usize) -> Option<usize> {
        self.position.get(key).copied().flatten()
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        let key_a = self.heap[a].0;
        let key_b = self.heap[b].0;
        self.position[key_a] = Some(a);
        self.position[key_b] = Some(b);
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.heap[parent].1 <= self.heap[slot].1 {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut smallest = slot;

            if left < len && self.heap[left].1 < self.heap[smallest].1 {
                smallest = left;
            }
            if right < len && self.heap[right].1 < self.heap[smallest].1 {
                smallest = right;
            }
            if smallest == slot {
                break;
            }

            self.swap(slot, smallest);
            slot = smallest;
        }
    }
}
