//! Who owns which slot, and who evaluates which slot.
//!
//! Every worker holds the whole simplex, so the layout never says where data
//! lives. It only says which worker writes a slot during the local update
//! step and which worker computes which objective values when the whole
//! simplex has to be re-evaluated.
//!
//! With `d` dimensions and `W` workers the `d + 1` physical slots split into
//!
//! ```text
//!   0 .. d+1-W        centroid pool, never replaced by a local update
//!   d+1-W ..= d       one slot per worker, worker r owns slot d - r
//! ```

use std::ops::Range;

use crate::error::{Error, Result};

/// Slot ownership and evaluation split for a fixed dimension and worker count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    dimension: usize,
    workers: usize,
}

impl Layout {
    /// Checks `1 <= workers <= dimension`.
    pub fn new(dimension: usize, workers: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::ZeroDimension);
        }
        if workers == 0 || workers > dimension {
            return Err(Error::InvalidWorkerCount { workers, dimension });
        }
        Ok(Layout { dimension, workers })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of vertices in the simplex.
    pub fn points(&self) -> usize {
        self.dimension + 1
    }

    /// The physical slot that `rank` replaces for the whole run.
    #[inline]
    pub fn owned_slot(&self, rank: usize) -> usize {
        self.dimension - rank
    }

    /// Number of slots averaged into the centroid.
    #[inline]
    pub fn pool_len(&self) -> usize {
        self.dimension + 1 - self.workers
    }

    /// Physical slots written by the exchange, in rank order of the gathered data.
    pub fn exchange_slots(&self) -> Range<usize> {
        self.pool_len()..self.points()
    }

    /// Number of points each worker evaluates during a full evaluation.
    /// The remainder goes to the lowest ranks.
    pub fn counts(&self) -> Vec<usize> {
        let per_worker = self.points() / self.workers;
        let rest = self.points() % self.workers;
        (0..self.workers)
            .map(|r| if r < rest { per_worker + 1 } else { per_worker })
            .collect()
    }

    /// Offsets of each worker's chunk in the gathered value vector.
    pub fn displs(&self) -> Vec<usize> {
        self.counts()
            .iter()
            .scan(0, |offset, &count| {
                let start = *offset;
                *offset += count;
                Some(start)
            })
            .collect()
    }

    /// The contiguous block of slots `rank` evaluates.
    pub fn evaluation_range(&self, rank: usize) -> Range<usize> {
        let per_worker = self.points() / self.workers;
        let rest = self.points() % self.workers;
        if rank < rest {
            let len = per_worker + 1;
            len * rank..len * (rank + 1)
        } else {
            per_worker * rank + rest..per_worker * (rank + 1) + rest
        }
    }
}
