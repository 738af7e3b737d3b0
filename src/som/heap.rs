//! Fixed-capacity max-heap used to keep the `k` smallest distances.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A codebook row together with its distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    /// Distance to the query vector.
    pub distance: f64,
    /// Row index in the searched matrix.
    pub index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Max-heap holding at most `capacity` candidates.
///
/// The root is always the worst (largest) retained distance, so a full heap
/// only admits a newcomer that beats the root.
#[derive(Debug, Clone)]
pub struct BoundedMaxHeap {
    items: BinaryHeap<Candidate>,
    capacity: usize,
}

impl BoundedMaxHeap {
    /// Creates an empty heap. Returns `None` for a zero capacity.
    pub fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        Some(Self {
            items: BinaryHeap::with_capacity(capacity),
            capacity,
        })
    }

    /// Number of retained candidates.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of retained candidates.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The largest retained distance.
    pub fn peek(&self) -> Option<&Candidate> {
        self.items.peek()
    }

    /// Offers a candidate to the heap.
    pub fn push(&mut self, distance: f64, index: usize) {
        let candidate = Candidate { distance, index };
        if self.items.len() < self.capacity {
            self.items.push(candidate);
            return;
        }
        if let Some(mut root) = self.items.peek_mut() {
            if candidate.distance < root.distance {
                // PeekMut restores the heap property on drop
                *root = candidate;
            }
        }
    }

    /// Consumes the heap, returning candidates ordered from closest to farthest.
    pub fn into_sorted_vec(self) -> Vec<Candidate> {
        self.items.into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity() {
        assert!(BoundedMaxHeap::new(0).is_none());
    }

    #[test]
    fn test_keeps_smallest() {
        let mut heap = BoundedMaxHeap::new(3).unwrap();
        for (i, d) in [9.0, 7.0, 1.0, 8.0, 0.5, 3.0].iter().enumerate() {
            heap.push(*d, i);
        }
        assert_eq!(heap.len(), 3);
        assert_eq!(heap.peek().unwrap().distance, 3.0);

        let indices: Vec<usize> = heap.into_sorted_vec().iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![4, 2, 5]);
    }

    #[test]
    fn test_equal_distance_does_not_replace() {
        let mut heap = BoundedMaxHeap::new(1).unwrap();
        heap.push(1.0, 0);
        heap.push(1.0, 1);
        assert_eq!(heap.peek().unwrap().index, 0);
    }
}
