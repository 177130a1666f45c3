//! Algorithms that search for local minima of functions along multiple dimensions,
//! with the work of each iteration split across a group of workers.

mod candidates;
mod parallel_nelder_mead;

pub use self::candidates::{Coefficients, Scratch};
pub use self::parallel_nelder_mead::{
    IterationReport, Move, ParallelNelderMead, ParallelNelderMeadBuilder,
};
