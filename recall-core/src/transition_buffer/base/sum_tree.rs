//! Sum tree for prioritized sampling.
//!
//! Leaves are the priorities of the buffer slots and every internal node holds
//! the sum of its two children, so the root is the total priority mass.
//! Internal sums are kept in `f64` to limit drift over long runs.
use crate::base::RandomSource;
use log::warn;
use segment_tree::{ops::MinIgnoreNaN, SegmentPoint};
use serde::{Deserialize, Serialize};

/// Specifies how to normalize importance weights in a prioritized batch.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum WeightNormalizer {
    /// Normalize by the smallest priority among all stored transitions,
    /// $w_i = (p_{min} / p_i)^\beta$.
    All,

    /// Normalize by the largest weight within the sampled batch.
    Batch,
}

/// Complete binary tree over `capacity` slots, `capacity` being a power of two.
///
/// Nodes are numbered breadth first. Internal node `k` has children `2k + 1`
/// and `2k + 2`, and leaf `i` is node `i + capacity - 1`.
#[derive(Debug)]
pub struct SumTree {
    capacity: usize,
    priorities: Vec<f32>,
    sums: Vec<f64>,
    min_tree: SegmentPoint<f32, MinIgnoreNaN>,
    max_priority: f32,
}

impl SumTree {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity >= 2 && capacity.is_power_of_two());
        Self {
            capacity,
            priorities: vec![0f32; capacity],
            sums: vec![0f64; capacity - 1],
            min_tree: SegmentPoint::build(vec![f32::MAX; capacity], MinIgnoreNaN),
            max_priority: 1f32,
        }
    }

    /// Total priority mass.
    pub fn total(&self) -> f64 {
        self.sums[0]
    }

    pub fn priority(&self, ix: usize) -> f32 {
        self.priorities[ix]
    }

    /// Largest priority ever set, at least 1. New slots are seeded with it.
    pub fn max(&self) -> f32 {
        self.max_priority
    }

    /// Smallest priority among slots `0..n_live`.
    pub fn min(&self, n_live: usize) -> f32 {
        debug_assert!(n_live > 0);
        self.min_tree.query(0, n_live)
    }

    #[inline]
    fn node_sum(&self, node: usize) -> f64 {
        let n_internal = self.capacity - 1;
        if node < n_internal {
            self.sums[node]
        } else {
            self.priorities[node - n_internal] as f64
        }
    }

    /// Sets the priority of slot `ix` and recomputes its ancestors.
    pub fn update(&mut self, ix: usize, p: f32) {
        debug_assert!(ix < self.capacity);

        self.priorities[ix] = p;
        self.min_tree.modify(ix, p);
        if p > self.max_priority {
            self.max_priority = p;
        }

        // Leaves `ix` and `ix ^ 1` are siblings.
        let mut parent = (ix + self.capacity) / 2 - 1;
        self.sums[parent] = self.priorities[ix] as f64 + self.priorities[ix ^ 1] as f64;
        while parent > 0 {
            parent = (parent - 1) / 2;
            self.sums[parent] = self.sums[2 * parent + 1] + self.sums[2 * parent + 2];
        }
    }

    /// Returns the slot whose cumulative priority range contains `target`.
    pub fn find(&self, mut target: f64) -> usize {
        let n_internal = self.capacity - 1;
        let mut node = 0;
        while node < n_internal {
            let left = 2 * node + 1;
            let left_sum = self.node_sum(left);
            if left_sum > target {
                node = left;
            } else {
                target -= left_sum;
                node = left + 1;
            }
        }
        node - n_internal
    }

    /// Samples slot indices in proportion to their priorities and returns them
    /// with their importance weights.
    ///
    /// Only slots `0..n_live` hold transitions. Unwritten slots have zero
    /// priority; an index beyond `n_live` can only come from rounding and is
    /// clamped to the last live slot.
    pub fn sample<R: RandomSource>(
        &self,
        rng: &mut R,
        n_live: usize,
        batch_size: usize,
        beta: f32,
        normalize: WeightNormalizer,
    ) -> (Vec<usize>, Vec<f32>) {
        let total = self.total();
        let ixs = (0..batch_size)
            .map(|_| {
                let ix = self.find(rng.uniform() * total);
                if ix >= n_live {
                    warn!("Sampled slot {} beyond {} live slots, clamped", ix, n_live);
                    n_live - 1
                } else {
                    ix
                }
            })
            .collect::<Vec<_>>();

        let p_min = match normalize {
            WeightNormalizer::All => self.min(n_live),
            WeightNormalizer::Batch => ixs
                .iter()
                .map(|&ix| self.priorities[ix])
                .fold(f32::MAX, f32::min),
        };
        let ws = ixs
            .iter()
            .map(|&ix| (p_min / self.priorities[ix]).powf(beta))
            .collect();

        (ixs, ws)
    }
}
