extern crate ndarray;
extern crate parallel_simplex;
extern crate tracing_subscriber;

use ndarray::prelude::*;
use parallel_simplex::comm::{Communicator, ThreadComm};
use parallel_simplex::vector::ParallelNelderMeadBuilder;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let n = 8;
    let workers = 4;
    let f = |x: ArrayView1<f64>| x.iter().map(|&v| (v - 0.25).powi(2)).sum::<f64>();

    let nm = ParallelNelderMeadBuilder::default()
        .max_iter(2000)
        .report_every(250)
        .build()
        .unwrap();

    let results = ThreadComm::run(workers, |comm| {
        let x0 = Array1::zeros(n);
        let res = nm.minimize_observed(f, x0.view(), &comm, |_| {}).unwrap();
        (comm.rank(), res)
    });

    for (rank, res) in &results {
        println!("rank {}: {:?} after {} iterations, {} local evaluations", rank, res.status, res.iterations, res.local_f_evals);
    }
    let (_, res) = &results[0];
    println!("best value: {}", res.incumbent_value);
    println!("best vertex: {}", res.incumbent);
    println!("final simplex:\n{}", res.simplex);
}
