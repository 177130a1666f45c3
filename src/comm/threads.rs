//! In-process communicator: one OS thread per worker, collectives through a
//! shared table guarded by a mutex and a barrier.
//!
//! Each collective runs in two barrier phases. Every member first publishes
//! its contribution, waits, reads everyone's contribution, and waits again so
//! that no member can overwrite the table before all peers finished reading.
//! Size checks happen in the read phase so that every member passes both
//! barriers even when the call fails.

use std::panic;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use super::{check_len, Communicator};
use crate::error::{Error, Result};

#[derive(Debug)]
struct Table {
    ints: Vec<u64>,
    floats: Vec<Vec<f64>>,
}

#[derive(Debug)]
struct Shared {
    barrier: Barrier,
    table: Mutex<Table>,
}

/// One member of an in-process worker group.
#[derive(Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    /// Creates the `size` members of a new group, in rank order.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let shared = Arc::new(Shared {
            barrier: Barrier::new(size),
            table: Mutex::new(Table {
                ints: vec![0; size],
                floats: vec![Vec::new(); size],
            }),
        });
        (0..size)
            .map(|rank| ThreadComm { rank, size, shared: Arc::clone(&shared) })
            .collect()
    }

    /// Runs `worker` once per member of a new group, each on its own thread,
    /// and returns the results in rank order. A panicking worker is re-raised
    /// here once its peers have finished; peers blocked in a collective with
    /// it never finish.
    pub fn run<T, F>(size: usize, worker: F) -> Vec<T>
    where
        F: Fn(ThreadComm) -> T + Sync,
        T: Send,
    {
        let worker = &worker;
        thread::scope(|scope| {
            let handles: Vec<_> = Self::group(size)
                .into_iter()
                .map(|comm| scope.spawn(move || worker(comm)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
                .collect()
        })
    }

    fn collective<R>(
        &self,
        publish: impl FnOnce(&mut Table),
        read: impl FnOnce(&Table) -> Result<R>,
    ) -> Result<R> {
        {
            let mut table = self.shared.table.lock().map_err(|_| Error::Poisoned)?;
            publish(&mut table);
        }
        self.shared.barrier.wait();
        let out = {
            let table = self.shared.table.lock().map_err(|_| Error::Poisoned)?;
            read(&table)
        };
        self.shared.barrier.wait();
        out
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_reduce_sum(&self, local: u64) -> Result<u64> {
        let rank = self.rank;
        self.collective(
            |table| table.ints[rank] = local,
            |table| Ok(table.ints.iter().sum()),
        )
    }

    fn all_gather(&self, send: &[f64], recv: &mut [f64]) -> Result<()> {
        let rank = self.rank;
        let chunk = send.len();
        self.collective(
            |table| table.floats[rank] = send.to_vec(),
            |table| {
                check_len(chunk * table.floats.len(), recv.len())?;
                for (part, out) in table.floats.iter().zip(recv.chunks_mut(chunk.max(1))) {
                    check_len(chunk, part.len())?;
                    out.copy_from_slice(part);
                }
                Ok(())
            },
        )
    }

    fn all_gather_varcount(
        &self,
        send: &[f64],
        recv: &mut [f64],
        counts: &[usize],
        displs: &[usize],
    ) -> Result<()> {
        let rank = self.rank;
        self.collective(
            |table| table.floats[rank] = send.to_vec(),
            |table| {
                check_len(table.floats.len(), counts.len())?;
                check_len(table.floats.len(), displs.len())?;
                for (part, (&count, &start)) in table.floats.iter().zip(counts.iter().zip(displs)) {
                    check_len(count, part.len())?;
                    let end = start + count;
                    if end > recv.len() {
                        return Err(Error::SizeMismatch { expected: end, actual: recv.len() });
                    }
                    recv[start..end].copy_from_slice(part);
                }
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_reduce_sums_every_rank() {
        let sums = ThreadComm::run(4, |comm| comm.all_reduce_sum(comm.rank() as u64 + 1).unwrap());
        assert_eq!(sums, vec![10, 10, 10, 10]);
    }

    #[test]
    fn all_gather_orders_by_rank() {
        let gathered = ThreadComm::run(3, |comm| {
            let r = comm.rank() as f64;
            let mut recv = vec![0.0; 6];
            comm.all_gather(&[r, -r], &mut recv).unwrap();
            recv
        });
        for recv in gathered {
            assert_eq!(recv, vec![0.0, -0.0, 1.0, -1.0, 2.0, -2.0]);
        }
    }

    #[test]
    fn varcount_gather_places_uneven_chunks() {
        let gathered = ThreadComm::run(2, |comm| {
            let send: Vec<f64> = if comm.rank() == 0 { vec![1.0, 2.0, 3.0] } else { vec![4.0, 5.0] };
            let mut recv = vec![0.0; 5];
            comm.all_gather_varcount(&send, &mut recv, &[3, 2], &[0, 3]).unwrap();
            recv
        });
        assert_eq!(gathered[0], gathered[1]);
        assert_eq!(gathered[0], vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn size_errors_do_not_deadlock_the_group() {
        let results = ThreadComm::run(2, |comm| {
            let mut recv = vec![0.0; 3];
            let first = comm.all_gather(&[1.0], &mut recv);
            let second = comm.all_reduce_sum(1).unwrap();
            (first, second)
        });
        for (first, second) in results {
            assert_eq!(first, Err(Error::SizeMismatch { expected: 2, actual: 3 }));
            assert_eq!(second, 2);
        }
    }

    #[test]
    fn collectives_can_be_repeated() {
        let results = ThreadComm::run(3, |comm| {
            (0..50u64).map(|i| comm.all_reduce_sum(i).unwrap()).sum::<u64>()
        });
        assert_eq!(results, vec![3 * 1225; 3]);
    }
}
