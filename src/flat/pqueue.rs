use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A candidate result: stored ordinal plus its squared L2 distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub distance: f32,
    pub ordinal: usize,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        // total_cmp gives NaN a fixed place (after +inf) so the heap stays consistent.
        // Equal distances order by ordinal: lower insertion position ranks first.
        self.distance
            .total_cmp(&other.distance)
            .then(self.ordinal.cmp(&other.ordinal))
    }
}

/// Bounded max-heap keeping the `k` smallest neighbors seen so far.
///
/// The heap top is always the current worst kept candidate, so each push is
/// O(log k) and a full scan is O(N log k).
pub struct TopK {
    k: usize,
    heap: BinaryHeap<Neighbor>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        TopK {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
        }
    }

    pub fn push(&mut self, candidate: Neighbor) {
        if self.k == 0 {
            return;
        }

        if self.heap.len() < self.k {
            self.heap.push(candidate);
            return;
        }

        if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Consume into `(ordinal, distance)` pairs sorted ascending by distance.
    pub fn into_sorted(self) -> Vec<(usize, f32)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|n| (n.ordinal, n.distance))
            .collect()
    }
}
