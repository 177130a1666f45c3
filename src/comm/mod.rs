//! Collective operations over a fixed group of workers.
//!
//! Every call is blocking and every member of the group must make the same
//! sequence of calls. All members receive identical results.

#[cfg(feature = "distributed")]
mod mpi;
mod threads;

#[cfg(feature = "distributed")]
pub use self::mpi::MpiComm;
pub use self::threads::ThreadComm;

use crate::error::{Error, Result};

/// The collectives the parallel simplex search needs.
///
/// Implementations: `SingleProcess` (one worker, pass-through),
/// `ThreadComm` (one OS thread per worker inside this process) and, with the
/// `distributed` feature, `MpiComm` (one MPI process per worker).
pub trait Communicator {
    /// This member's rank, `0 .. size()`.
    fn rank(&self) -> usize;

    /// Number of members in the group.
    fn size(&self) -> usize;

    /// Sum of `local` over all members.
    fn all_reduce_sum(&self, local: u64) -> Result<u64>;

    /// Concatenates every member's `send`, in rank order, into `recv`.
    /// All `send` buffers have the same length and `recv` is `size()` times as long.
    fn all_gather(&self, send: &[f64], recv: &mut [f64]) -> Result<()>;

    /// Places member `r`'s `send` at `recv[displs[r] .. displs[r] + counts[r]]`.
    fn all_gather_varcount(
        &self,
        send: &[f64],
        recv: &mut [f64],
        counts: &[usize],
        displs: &[usize],
    ) -> Result<()>;
}

pub(crate) fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::SizeMismatch { expected, actual })
    }
}

/// A group with a single member. Every collective is a copy.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_sum(&self, local: u64) -> Result<u64> {
        Ok(local)
    }

    fn all_gather(&self, send: &[f64], recv: &mut [f64]) -> Result<()> {
        check_len(send.len(), recv.len())?;
        recv.copy_from_slice(send);
        Ok(())
    }

    fn all_gather_varcount(
        &self,
        send: &[f64],
        recv: &mut [f64],
        counts: &[usize],
        displs: &[usize],
    ) -> Result<()> {
        check_len(1, counts.len())?;
        check_len(1, displs.len())?;
        check_len(counts[0], send.len())?;
        let end = displs[0] + counts[0];
        if end > recv.len() {
            return Err(Error::SizeMismatch { expected: end, actual: recv.len() });
        }
        recv[displs[0]..end].copy_from_slice(send);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_process_is_pass_through() {
        let comm = SingleProcess;
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        assert_eq!(comm.all_reduce_sum(7).unwrap(), 7);

        let mut recv = [0.0; 3];
        comm.all_gather(&[1.0, 2.0, 3.0], &mut recv).unwrap();
        assert_eq!(recv, [1.0, 2.0, 3.0]);

        let mut recv = [0.0; 4];
        comm.all_gather_varcount(&[5.0, 6.0], &mut recv, &[2], &[1]).unwrap();
        assert_eq!(recv, [0.0, 5.0, 6.0, 0.0]);
    }

    #[test]
    fn single_process_checks_buffer_sizes() {
        let comm = SingleProcess;
        let mut recv = [0.0; 2];
        assert_eq!(
            comm.all_gather(&[1.0], &mut recv),
            Err(Error::SizeMismatch { expected: 1, actual: 2 })
        );
        assert_eq!(
            comm.all_gather_varcount(&[1.0], &mut recv, &[2], &[0]),
            Err(Error::SizeMismatch { expected: 2, actual: 1 })
        );
    }
}
