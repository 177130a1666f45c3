//! The result type and the base trait shared by the parallel minimizers.
use ndarray::prelude::*;
use std::time::Duration;

use crate::comm::Communicator;
use crate::error::Result;
use crate::simplex::Simplex;

/// Why the minimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The best value reached the target.
    Converged,
    /// The iteration budget ran out first.
    MaxIterations,
    /// The best value is NaN, so no comparison against the target can succeed.
    NotANumber,
}

/// The outcome of a solve, identical on every worker except for `local_f_evals`
/// and `runtime`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimResult {
    /// The runtime of the minimization according to the system clock.
    pub runtime: Duration,
    /// Number of iterations run.
    pub iterations: usize,
    /// Function evaluations summed over all workers.
    pub f_evals: usize,
    /// Function evaluations performed by this worker.
    pub local_f_evals: usize,
    /// The final simplex, in physical slot order.
    pub simplex: Simplex,
    /// The best vertex the simplex held at the end of any iteration.
    pub incumbent: Array1<f64>,
    /// The function value at `incumbent`, never above `minimum_value()`.
    pub incumbent_value: f64,
    pub status: RunStatus,
}

impl OptimResult {
    /// The vertex of the final simplex with the smallest objective value.
    pub fn best_vertex(&self) -> ArrayView1<'_, f64> {
        self.simplex.vertex(self.simplex.sorted_slot(0))
    }

    /// Physical slot 0, the pivot of every shrink.
    pub fn anchor_vertex(&self) -> ArrayView1<'_, f64> {
        self.simplex.vertex(0)
    }

    pub fn minimum_value(&self) -> f64 {
        self.simplex.best()
    }
}

/// A minimizer whose work is split over the members of a communicator.
/// Every member must call `minimize` with the same function and guess.
pub trait Minimizer {
    fn minimize<F, C>(&self, func: F, x0: ArrayView1<f64>, comm: &C) -> Result<OptimResult>
    where
        F: Fn(ArrayView1<f64>) -> f64,
        C: Communicator;
}
