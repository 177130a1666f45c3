//! MPI backend: one process per worker.
//!
//! Requires the `distributed` feature and an MPI installation. The caller
//! initializes MPI and keeps the universe alive for the whole solve:
//!
//! ```ignore
//! let universe = mpi::initialize().expect("MPI init failed");
//! let comm = MpiComm::new(universe.world());
//! ```
//!
//! Buffer sizes are checked before entering a collective. Every rank derives
//! them from the same layout, so a failed check fails on all ranks alike.

use std::convert::TryFrom;

use ::mpi::collective::SystemOperation;
use ::mpi::datatype::PartitionMut;
use ::mpi::topology::SimpleCommunicator;
use ::mpi::traits::{Communicator as _, CommunicatorCollectives};
use ::mpi::Count;

use super::{check_len, Communicator};
use crate::error::{Error, Result};

/// A worker group spanning the processes of an MPI communicator.
pub struct MpiComm {
    world: SimpleCommunicator,
}

impl MpiComm {
    pub fn new(world: SimpleCommunicator) -> Self {
        MpiComm { world }
    }

    /// The world communicator. MPI must already be initialized.
    pub fn world() -> Self {
        MpiComm::new(SimpleCommunicator::world())
    }
}

fn to_counts(values: &[usize]) -> Result<Vec<Count>> {
    values
        .iter()
        .map(|&v| Count::try_from(v).map_err(|_| Error::CountOverflow(v)))
        .collect()
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn all_reduce_sum(&self, local: u64) -> Result<u64> {
        let mut global = 0u64;
        self.world
            .all_reduce_into(&local, &mut global, SystemOperation::sum());
        Ok(global)
    }

    fn all_gather(&self, send: &[f64], recv: &mut [f64]) -> Result<()> {
        check_len(send.len() * self.size(), recv.len())?;
        self.world.all_gather_into(send, recv);
        Ok(())
    }

    fn all_gather_varcount(
        &self,
        send: &[f64],
        recv: &mut [f64],
        counts: &[usize],
        displs: &[usize],
    ) -> Result<()> {
        let size = self.size();
        check_len(size, counts.len())?;
        check_len(size, displs.len())?;
        check_len(counts[self.rank()], send.len())?;
        let end = counts
            .iter()
            .zip(displs)
            .map(|(&count, &displ)| count + displ)
            .max()
            .unwrap_or(0);
        if end > recv.len() {
            return Err(Error::SizeMismatch { expected: end, actual: recv.len() });
        }

        let counts = to_counts(counts)?;
        let displs = to_counts(displs)?;
        let mut partition = PartitionMut::new(recv, &counts[..], &displs[..]);
        self.world.all_gather_varcount_into(send, &mut partition);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_convert_or_overflow() {
        assert_eq!(to_counts(&[0, 3, 7]).unwrap(), vec![0, 3, 7]);
        let big = Count::max_value() as usize + 1;
        assert_eq!(to_counts(&[1, big]), Err(Error::CountOverflow(big)));
    }
}
