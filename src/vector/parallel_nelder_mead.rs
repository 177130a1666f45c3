//! A distributed-memory parallel Nelder-Mead search in the style of Lee and
//! Wiswall: with `W` workers, each worker proposes a replacement for one of
//! the `W` highest physical slots of a shared simplex in every iteration.
//!
//! Every worker keeps a full copy of the simplex. Only the work is split:
//!
//! * worker `r` owns physical slot `d - r` for the whole run and is the only
//!   one allowed to update it locally;
//! * the centroid is the mean of the remaining `d + 1 - W` slots, which all
//!   workers agree on;
//! * after the local step every owned vertex is exchanged with an all-gather
//!   and the workers sum their "changed" flags. If no worker accepted a trial
//!   point, the whole simplex then shrinks toward slot 0 and is re-evaluated,
//!   with the evaluations split evenly across the workers.
//!
//! After each iteration every worker holds an identical simplex, so the next
//! iteration needs no communication until its own synchronization point.
//!
//! # Use case
//!
//! Cheap objective functions and many workers, where the cost of a solve is
//! dominated by synchronization rather than by evaluations.
//!
//! # Examples
//!
//! ```
//! # extern crate ndarray;
//! # extern crate parallel_simplex;
//! # use ndarray::prelude::*;
//! # use parallel_simplex::comm::SingleProcess;
//! # use parallel_simplex::vector::ParallelNelderMeadBuilder;
//! # use parallel_simplex::Minimizer;
//!
//! let function = |x: ArrayView1<f64>| x.dot(&x);
//! let minimizer = ParallelNelderMeadBuilder::default()
//!     .max_iter(100)
//!     .build()
//!     .unwrap();
//! let args = Array::from_vec(vec![0.5]);
//! let res = minimizer.minimize(&function, args.view(), &SingleProcess).unwrap();
//! println!("res: {}", res.best_vertex());
//! assert!(res.minimum_value() <= 1e-6);
//! ```

use std::time::Instant;

use derive_builder::Builder;
use ndarray::prelude::*;
use tracing::{debug, info, trace};

use super::candidates::{Coefficients, Scratch};
use crate::comm::Communicator;
use crate::error::Result;
use crate::layout::Layout;
use crate::minimizer::{Minimizer, OptimResult, RunStatus};
use crate::simplex::Simplex;
use crate::utils::WrappedFunction;

#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(build_fn(validate = "Self::validate"))]
/// A minimizer for a scalar function of one or more variables whose iterations
/// are shared between the members of a communicator.
pub struct ParallelNelderMead {
    /// Reflection coefficient, positive.
    #[builder(default = "1.0")]
    pub rho: f64,

    /// Expansion coefficient, greater than one.
    #[builder(default = "2.0")]
    pub xi: f64,

    /// Contraction coefficient, in `(0, 1)`.
    #[builder(default = "0.5")]
    pub gamma: f64,

    /// Shrink coefficient, in `(0, 1)`.
    #[builder(default = "0.5")]
    pub sigma: f64,

    /// Offset along each coordinate used to build the initial simplex from the guess.
    #[builder(default = "1.0")]
    pub step: f64,

    /// The search stops once the best objective value is at or below this.
    #[builder(default = "1e-6")]
    pub target: f64,

    /// The maximum number of iterations. `None` or `Some(0)` runs until the
    /// target is reached.
    #[builder(default = "None")]
    #[builder(setter(strip_option))]
    pub max_iter: Option<usize>,

    /// Log progress on rank 0 every this many iterations.
    #[builder(default = "None")]
    #[builder(setter(strip_option))]
    pub report_every: Option<usize>,
}

impl ParallelNelderMeadBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        let positive = |name: &str, value: Option<f64>| match value {
            Some(v) if !(v > 0.0) => Err(format!("{} must be positive, got {}", name, v)),
            _ => Ok(()),
        };
        let unit = |name: &str, value: Option<f64>| match value {
            Some(v) if !(v > 0.0 && v < 1.0) => {
                Err(format!("{} must lie strictly between 0 and 1, got {}", name, v))
            }
            _ => Ok(()),
        };
        positive("rho", self.rho)?;
        positive("step", self.step)?;
        unit("gamma", self.gamma)?;
        unit("sigma", self.sigma)?;
        match self.xi {
            Some(xi) if !(xi > 1.0) => return Err(format!("xi must be greater than 1, got {}", xi)),
            _ => {}
        }
        match self.target {
            Some(t) if !(t >= 0.0) => return Err(format!("target must not be negative, got {}", t)),
            _ => {}
        }
        Ok(())
    }
}

impl Default for ParallelNelderMead {
    fn default() -> Self {
        ParallelNelderMead {
            rho: 1.0,
            xi: 2.0,
            gamma: 0.5,
            sigma: 0.5,
            step: 1.0,
            target: 1e-6,
            max_iter: None,
            report_every: None,
        }
    }
}

/// What a worker did with its own slot during the local step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Reflection,
    Expansion,
    OutsideContraction,
    InsideContraction,
    /// The contraction failed but the reflection beat the slot's value. The
    /// slot was overwritten without marking the worker as changed.
    LocalReflection,
    Unchanged,
}

/// State handed to the observer after every iteration.
#[derive(Debug)]
pub struct IterationReport<'a> {
    /// 1-based iteration number.
    pub iteration: usize,
    pub rank: usize,
    pub owned_slot: usize,
    /// What this worker did with its slot during the local step.
    pub action: Move,
    /// Number of workers that changed their slot.
    pub improved: usize,
    /// Whether the iteration ended in a global shrink.
    pub shrink: bool,
    /// Best value in the simplex after this iteration.
    pub best: f64,
    /// Best value the synchronized simplex has held so far.
    pub incumbent: f64,
    pub simplex: &'a Simplex,
}

impl ParallelNelderMead {
    fn coefficients(&self) -> Coefficients {
        Coefficients { rho: self.rho, xi: self.xi, gamma: self.gamma, sigma: self.sigma }
    }

    /// Minimizes `func` starting from the all-ones vector.
    pub fn minimize_default<F, C>(&self, dimension: usize, func: F, comm: &C) -> Result<OptimResult>
    where
        F: Fn(ArrayView1<f64>) -> f64,
        C: Communicator,
    {
        let x0 = Array1::ones(dimension);
        self.minimize_observed(func, x0.view(), comm, |_| {})
    }

    /// Like `minimize`, calling `observer` on every worker after every iteration.
    pub fn minimize_observed<F, C, O>(
        &self,
        func: F,
        x0: ArrayView1<f64>,
        comm: &C,
        mut observer: O,
    ) -> Result<OptimResult>
    where
        F: Fn(ArrayView1<f64>) -> f64,
        C: Communicator,
        O: FnMut(&IterationReport),
    {
        let start = Instant::now();
        let layout = Layout::new(x0.len(), comm.size())?;
        let rank = comm.rank();
        let mut worker = Worker {
            func: WrappedFunction::new(func),
            comm,
            layout,
            rank,
            owned_slot: layout.owned_slot(rank),
            coefficients: self.coefficients(),
            simplex: Simplex::new(x0, self.step)?,
            scratch: Scratch::new(layout.dimension()),
            changed: false,
        };

        worker.evaluate_all()?;
        worker.simplex.sort();
        let mut incumbent = Incumbent::of(&worker.simplex);

        let max_iter = self.max_iter.filter(|&m| m > 0);
        let mut iterations = 0;

        // A NaN best value compares false against the target and ends the run.
        while worker.simplex.best() > self.target && max_iter.map_or(true, |m| iterations < m) {
            let action = worker.iterate();
            let improved = comm.all_reduce_sum(worker.changed as u64)? as usize;
            trace!(rank, iteration = iterations + 1, ?action, improved, "local step");

            // A stalled worker may still hold a local-only replacement, so the
            // replicas are reconciled before any shrink.
            worker.exchange()?;
            let shrink = improved == 0;
            if shrink {
                worker.shrink()?;
                debug!(rank, iteration = iterations + 1, "no worker improved, shrinking");
            }

            worker.simplex.sort();
            incumbent.update(&worker.simplex);
            iterations += 1;

            if rank == 0 && self.report_every.map_or(false, |n| n > 0 && iterations % n == 0) {
                debug!(iterations, best = worker.simplex.best(), "progress");
            }

            observer(&IterationReport {
                iteration: iterations,
                rank,
                owned_slot: worker.owned_slot,
                action,
                improved,
                shrink,
                best: worker.simplex.best(),
                incumbent: incumbent.value,
                simplex: &worker.simplex,
            });
        }

        let local_f_evals = worker.func.num;
        let f_evals = comm.all_reduce_sum(local_f_evals as u64)? as usize;
        let best = worker.simplex.best();
        let status = if best <= self.target {
            RunStatus::Converged
        } else if best.is_nan() {
            RunStatus::NotANumber
        } else {
            RunStatus::MaxIterations
        };

        if rank == 0 {
            info!(
                iterations,
                f_evals,
                best,
                workers = layout.workers(),
                ?status,
                "parallel simplex search finished"
            );
        }

        Ok(OptimResult {
            runtime: start.elapsed(),
            iterations,
            f_evals,
            local_f_evals,
            simplex: worker.simplex,
            incumbent: incumbent.vertex,
            incumbent_value: incumbent.value,
            status,
        })
    }
}

impl Minimizer for ParallelNelderMead {
    /// Search for the value minimizing `func` given an initial guess. Every
    /// member of `comm` must call this with the same function and guess.
    fn minimize<F, C>(&self, func: F, x0: ArrayView1<f64>, comm: &C) -> Result<OptimResult>
    where
        F: Fn(ArrayView1<f64>) -> f64,
        C: Communicator,
    {
        self.minimize_observed(func, x0, comm, |_| {})
    }
}

/// Best vertex the synchronized simplex has held. The simplex itself may lose
/// its best vertex to a reflection or to a shrink around slot 0.
struct Incumbent {
    vertex: Array1<f64>,
    value: f64,
}

impl Incumbent {
    fn of(simplex: &Simplex) -> Self {
        let slot = simplex.sorted_slot(0);
        Incumbent { vertex: simplex.vertex(slot).to_owned(), value: simplex.objective(slot) }
    }

    fn update(&mut self, simplex: &Simplex) {
        if simplex.best() < self.value {
            *self = Incumbent::of(simplex);
        }
    }
}

/// One member's state during a solve.
struct Worker<'c, F: Fn(ArrayView1<f64>) -> f64, C> {
    func: WrappedFunction<F>,
    comm: &'c C,
    layout: Layout,
    rank: usize,
    owned_slot: usize,
    coefficients: Coefficients,
    simplex: Simplex,
    scratch: Scratch,
    changed: bool,
}

impl<'c, F, C> Worker<'c, F, C>
where
    F: Fn(ArrayView1<f64>) -> f64,
    C: Communicator,
{
    /// Evaluates this worker's share of the slots and gathers all values.
    fn evaluate_all(&mut self) -> Result<()> {
        let range = self.layout.evaluation_range(self.rank);
        let mut chunk = Vec::with_capacity(range.len());
        for slot in range {
            chunk.push(self.func.call(self.simplex.vertex(slot)));
        }

        let mut values = vec![0.0; self.layout.points()];
        self.comm.all_gather_varcount(
            &chunk,
            &mut values,
            &self.layout.counts(),
            &self.layout.displs(),
        )?;
        self.simplex.objectives_mut().assign(&ArrayView1::from(&values[..]));
        Ok(())
    }

    /// The local decision for the owned slot. Sets `changed` when the slot's
    /// coordinates were replaced by an accepted trial point.
    fn iterate(&mut self) -> Move {
        let p = self.owned_slot;
        let c = self.coefficients;
        self.changed = false;

        self.scratch.centroid(&self.simplex, self.layout.pool_len());
        self.scratch.reflect(self.simplex.vertex(p), &c);
        let f_reflected = self.func.call(self.scratch.reflection.view());

        let best = self.simplex.best();
        let f_next = self.simplex.objective(self.simplex.sorted_slot(p - 1));
        let f_rank = self.simplex.objective(self.simplex.sorted_slot(p));

        if best <= f_reflected && f_reflected <= f_next {
            self.changed = self.simplex.replace(p, self.scratch.reflection.view(), f_reflected);
            Move::Reflection
        } else if f_reflected < best {
            self.scratch.expand(self.simplex.vertex(p), &c);
            let f_expanded = self.func.call(self.scratch.expansion.view());
            if f_expanded < f_reflected {
                self.changed = self.simplex.replace(p, self.scratch.expansion.view(), f_expanded);
                Move::Expansion
            } else {
                self.changed = self.simplex.replace(p, self.scratch.reflection.view(), f_reflected);
                Move::Reflection
            }
        } else if f_next <= f_reflected && f_reflected < f_rank {
            self.scratch.contract_outside(self.simplex.vertex(p), &c);
            let f_contracted = self.func.call(self.scratch.contraction.view());
            if f_contracted <= f_reflected {
                self.changed = self.simplex.replace(p, self.scratch.contraction.view(), f_contracted);
                Move::OutsideContraction
            } else {
                self.replace_locally(f_reflected)
            }
        } else {
            self.scratch.contract_inside(self.simplex.vertex(p), &c);
            let f_contracted = self.func.call(self.scratch.contraction.view());
            if f_contracted < self.simplex.objective(p) {
                self.changed = self.simplex.replace(p, self.scratch.contraction.view(), f_contracted);
                Move::InsideContraction
            } else {
                self.replace_locally(f_reflected)
            }
        }
    }

    fn replace_locally(&mut self, f_reflected: f64) -> Move {
        let p = self.owned_slot;
        if f_reflected < self.simplex.objective(p) {
            self.simplex.replace(p, self.scratch.reflection.view(), f_reflected);
            Move::LocalReflection
        } else {
            Move::Unchanged
        }
    }

    /// All-gathers every owned vertex and value and writes each into its
    /// owner's slot.
    fn exchange(&mut self) -> Result<()> {
        let d = self.layout.dimension();
        let w = self.layout.workers();
        let p = self.owned_slot;

        let send = self.simplex.vertex(p).to_vec();
        let mut vertices = vec![0.0; d * w];
        self.comm.all_gather(&send, &mut vertices)?;

        let mut values = vec![0.0; w];
        self.comm.all_gather(&[self.simplex.objective(p)], &mut values)?;

        for (owner, (vertex, &value)) in vertices.chunks(d).zip(&values).enumerate() {
            let slot = self.layout.owned_slot(owner);
            self.simplex.vertex_mut(slot).assign(&ArrayView1::from(vertex));
            self.simplex.set_objective(slot, value);
        }
        Ok(())
    }

    /// Shrinks toward slot 0 and re-evaluates the simplex.
    fn shrink(&mut self) -> Result<()> {
        self.simplex.shrink(self.coefficients.sigma);
        self.evaluate_all()
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::comm::{SingleProcess, ThreadComm};
    use crate::error::Error;
    use float_cmp::approx_eq;

    fn sphere(x: ArrayView1<f64>) -> f64 {
        x.dot(&x)
    }

    fn worker<'c, F, C>(func: F, x0: ArrayView1<f64>, comm: &'c C) -> Worker<'c, F, C>
    where
        F: Fn(ArrayView1<f64>) -> f64,
        C: Communicator,
    {
        let layout = Layout::new(x0.len(), comm.size()).unwrap();
        let mut worker = Worker {
            func: WrappedFunction::new(func),
            comm,
            layout,
            rank: comm.rank(),
            owned_slot: layout.owned_slot(comm.rank()),
            coefficients: Coefficients::default(),
            simplex: Simplex::new(x0, 1.0).unwrap(),
            scratch: Scratch::new(layout.dimension()),
            changed: false,
        };
        worker.evaluate_all().unwrap();
        worker.simplex.sort();
        worker
    }

    #[test]
    fn builder_defaults_match_default() {
        let built = ParallelNelderMeadBuilder::default().build().unwrap();
        assert_eq!(built, ParallelNelderMead::default());
        assert_eq!(built.coefficients(), Coefficients::default());
    }

    #[test]
    fn builder_rejects_bad_coefficients() {
        assert!(ParallelNelderMeadBuilder::default().rho(0.0).build().is_err());
        assert!(ParallelNelderMeadBuilder::default().xi(1.0).build().is_err());
        assert!(ParallelNelderMeadBuilder::default().gamma(1.0).build().is_err());
        assert!(ParallelNelderMeadBuilder::default().sigma(0.0).build().is_err());
        assert!(ParallelNelderMeadBuilder::default().step(-1.0).build().is_err());
        assert!(ParallelNelderMeadBuilder::default().target(f64::NAN).build().is_err());
    }

    #[test]
    fn reflection_is_accepted_on_a_tie() {
        let comm = SingleProcess;
        let mut w = worker(|x: ArrayView1<f64>| x[0] * x[0], array![0.5].view(), &comm);
        assert_eq!(w.simplex.objectives(), array![0.25, 2.25]);

        assert_eq!(w.iterate(), Move::Reflection);
        assert!(w.changed);
        assert_eq!(w.simplex.vertex(1), array![-0.5]);
        assert_eq!(w.simplex.objective(1), 0.25);
    }

    #[test]
    fn inside_contraction_after_reflection() {
        let comm = SingleProcess;
        let mut w = worker(|x: ArrayView1<f64>| x[0] * x[0], array![0.5].view(), &comm);
        w.iterate();
        w.simplex.sort();

        assert_eq!(w.iterate(), Move::InsideContraction);
        assert!(w.changed);
        assert_eq!(w.simplex.vertex(1), array![0.0]);
        assert_eq!(w.simplex.objective(1), 0.0);
        assert_eq!(w.func.num, 5);
    }

    #[test]
    fn expansion_when_reflection_beats_the_best() {
        let comm = SingleProcess;
        // Minimum far along the reflection direction of slot 2.
        let f = |x: ArrayView1<f64>| (x[0] - 2.0).powi(2) + (x[1] + 3.0).powi(2);
        let mut w = worker(f, array![0.0, 0.0].view(), &comm);
        // Centroid (0.5, 0), reflection (1, -1), expansion (1.5, -2).
        assert_eq!(w.iterate(), Move::Expansion);
        assert_eq!(w.simplex.vertex(2), array![1.5, -2.0]);
        assert!(approx_eq!(f64, w.simplex.objective(2), 1.25, ulps = 2));
    }

    #[test]
    fn local_reflection_does_not_mark_a_change() {
        let comm = SingleProcess;
        // Reflection (1, -1) lands between the two worst values, the outside
        // contraction (0.75, -0.5) is worse than the reflection.
        let f = |x: ArrayView1<f64>| {
            if x[1] > 0.5 {
                5.0
            } else if x[1] < -0.75 {
                3.0
            } else if x[1] < -0.25 {
                4.0
            } else if x[0] > 0.5 {
                2.0
            } else {
                1.0
            }
        };
        let mut w = worker(f, array![0.0, 0.0].view(), &comm);
        assert_eq!(w.simplex.objectives(), array![1.0, 2.0, 5.0]);

        assert_eq!(w.iterate(), Move::LocalReflection);
        assert!(!w.changed);
        assert_eq!(w.simplex.vertex(2), array![1.0, -1.0]);
        assert_eq!(w.simplex.objective(2), 3.0);
    }

    #[test]
    fn unchanged_when_nothing_improves() {
        let comm = SingleProcess;
        let f = |x: ArrayView1<f64>| {
            if x == array![0.0, 0.0] {
                0.0
            } else if x == array![1.0, 0.0] {
                1.0
            } else if x == array![0.0, 1.0] {
                0.5
            } else {
                2.0
            }
        };
        let mut w = worker(f, array![0.0, 0.0].view(), &comm);
        let before = w.simplex.clone();
        assert_eq!(w.iterate(), Move::Unchanged);
        assert!(!w.changed);
        assert_eq!(w.simplex, before);
        assert_eq!(w.func.num, 5);
    }

    #[test]
    fn exchange_is_idempotent() {
        let comm = SingleProcess;
        let mut w = worker(sphere, array![1.0, 2.0, 3.0].view(), &comm);
        w.iterate();
        w.exchange().unwrap();
        let once = w.simplex.clone();
        w.exchange().unwrap();
        assert_eq!(w.simplex, once);
    }

    #[test]
    fn exchange_is_idempotent_across_threads() {
        let shifted = |x: ArrayView1<f64>| x.iter().map(|&v| (v - 0.3).powi(2)).sum::<f64>();
        let replicas = ThreadComm::run(2, |comm| {
            let mut w = worker(shifted, array![1.0, -1.0, 2.0, 0.5].view(), &comm);
            w.iterate();
            w.exchange().unwrap();
            let once = w.simplex.clone();
            w.exchange().unwrap();
            assert_eq!(w.simplex, once);
            once
        });
        assert_eq!(replicas[0], replicas[1]);
    }

    #[test]
    fn exchange_writes_each_vertex_into_its_owners_slot() {
        let replicas = ThreadComm::run(2, |comm| {
            let mut w = worker(sphere, Array1::zeros(4).view(), &comm);
            let marker = comm.rank() as f64 + 10.0;
            w.simplex.vertex_mut(w.owned_slot).fill(marker);
            w.simplex.set_objective(w.owned_slot, marker);
            w.exchange().unwrap();
            w.simplex
        });
        for simplex in replicas {
            assert_eq!(simplex.vertex(4), array![10.0, 10.0, 10.0, 10.0]);
            assert_eq!(simplex.objective(4), 10.0);
            assert_eq!(simplex.vertex(3), array![11.0, 11.0, 11.0, 11.0]);
            assert_eq!(simplex.objective(3), 11.0);
        }
    }

    #[test]
    fn shrink_re_evaluates_every_slot() {
        let comm = SingleProcess;
        let mut w = worker(sphere, array![1.0, 1.0].view(), &comm);
        w.shrink().unwrap();
        assert_eq!(w.simplex.vertex(0), array![1.0, 1.0]);
        assert_eq!(w.simplex.vertex(1), array![1.5, 1.0]);
        assert_eq!(w.simplex.objectives(), array![2.0, 3.25, 3.25]);
        assert_eq!(w.func.num, 6);
    }

    #[test]
    fn one_dimensional_parabola() {
        let minimizer = ParallelNelderMead::default();
        let f = |x: ArrayView1<f64>| x[0] * x[0];
        let res = minimizer.minimize(f, array![0.5].view(), &SingleProcess).unwrap();
        assert_eq!(res.status, RunStatus::Converged);
        assert_eq!(res.iterations, 2);
        assert_eq!(res.f_evals, 5);
        assert_eq!(res.local_f_evals, 5);
        assert_eq!(res.best_vertex(), array![0.0]);
        assert_eq!(res.anchor_vertex(), array![0.5]);
    }

    #[test]
    fn stops_at_the_iteration_budget() {
        let minimizer = ParallelNelderMeadBuilder::default().max_iter(3).build().unwrap();
        let f = |x: ArrayView1<f64>| 1.0 + x.dot(&x);
        let res = minimizer.minimize(f, array![4.0, -3.0].view(), &SingleProcess).unwrap();
        assert_eq!(res.status, RunStatus::MaxIterations);
        assert_eq!(res.iterations, 3);
    }

    #[test]
    fn nan_objective_stops_without_iterating() {
        let res = ParallelNelderMead::default()
            .minimize(|_: ArrayView1<f64>| f64::NAN, array![1.0, 2.0].view(), &SingleProcess)
            .unwrap();
        assert_eq!(res.status, RunStatus::NotANumber);
        assert_eq!(res.iterations, 0);
        assert_eq!(res.f_evals, 3);
    }

    #[test]
    fn default_guess_is_all_ones() {
        let minimizer = ParallelNelderMeadBuilder::default().max_iter(1).build().unwrap();
        let res = minimizer.minimize_default(3, sphere, &SingleProcess).unwrap();
        assert_eq!(res.anchor_vertex(), array![1.0, 1.0, 1.0]);
    }

    #[test]
    fn empty_guess_is_rejected() {
        let res = ParallelNelderMead::default().minimize(sphere, Array1::zeros(0).view(), &SingleProcess);
        assert_eq!(res, Err(Error::ZeroDimension));
    }
}
