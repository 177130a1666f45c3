//! Run with `mpirun -n 4 cargo run --example mpi-simplex --features distributed`.
extern crate mpi;
extern crate ndarray;
extern crate parallel_simplex;
extern crate tracing_subscriber;

use ndarray::prelude::*;
use parallel_simplex::comm::{Communicator, MpiComm};
use parallel_simplex::vector::ParallelNelderMeadBuilder;

fn main() {
    let universe = mpi::initialize().expect("MPI init failed");
    let comm = MpiComm::new(universe.world());

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let n = 8;
    let f = |x: ArrayView1<f64>| x.iter().map(|&v| (v - 0.25).powi(2)).sum::<f64>();

    let nm = ParallelNelderMeadBuilder::default()
        .max_iter(2000)
        .report_every(250)
        .build()
        .unwrap();

    let res = nm.minimize_default(n, f, &comm).unwrap();
    println!("rank {}: {:?} after {} iterations, {} local evaluations", comm.rank(), res.status, res.iterations, res.local_f_evals);
    if comm.rank() == 0 {
        println!("best value: {}", res.incumbent_value);
        println!("best vertex: {}", res.incumbent);
    }
}
