//! Distributed-memory parallel Nelder-Mead simplex search.
//!
//! A group of workers minimizes one black-box objective together. Each worker
//! keeps a full replica of the simplex, proposes a replacement for the slot it
//! owns, and the group reconciles the replicas with collective operations so
//! that all workers finish every iteration with the same simplex.
//!
//! The collectives are abstracted behind [`comm::Communicator`];
//! [`comm::SingleProcess`] runs a plain serial search,
//! [`comm::ThreadComm`] runs one worker per thread inside this process and,
//! with the `distributed` feature, `comm::MpiComm` runs one worker per MPI
//! process.

pub mod comm;
pub mod error;
pub mod layout;
pub mod minimizer;
pub mod simplex;
pub mod utils;
pub mod vector;

pub use crate::error::{Error, Result};
pub use crate::minimizer::{Minimizer, OptimResult, RunStatus};
