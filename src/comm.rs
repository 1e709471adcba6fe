//! Communicators for distributed point location.
//!
//! Point location only needs a single collective operation: a variable-count all-gather of
//! `f64` buffers. Everything exchanged between processes (query points, match records,
//! interpolation requests and results) is encoded into such buffers.
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};

/// A group of processes participating in collective operations.
///
/// All processes of the group must call collective operations in the same order.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Gathers the (possibly differently sized) buffers of all processes on every process.
    ///
    /// Element `i` of the result is the buffer contributed by rank `i`.
    fn all_gather_varcount(&self, data: &[f64]) -> Vec<Vec<f64>>;
}

/// The trivial single-process communicator.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather_varcount(&self, data: &[f64]) -> Vec<Vec<f64>> {
        vec![data.to_vec()]
    }
}

struct SharedBuffers {
    slots: Mutex<Vec<Vec<f64>>>,
    barrier: Barrier,
}

/// A communicator between threads of the same process.
///
/// Each member of a group is moved to its own thread. This is mainly useful for testing
/// distributed code paths without an MPI installation.
#[derive(Clone)]
pub struct ThreadCommunicator {
    rank: usize,
    size: usize,
    shared: Arc<SharedBuffers>,
}

impl ThreadCommunicator {
    /// Creates the members of a group of `size` communicating threads, ordered by rank.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn create_group(size: usize) -> Vec<Self> {
        assert!(size > 0, "A communicator group needs at least one member");
        let shared = Arc::new(SharedBuffers {
            slots: Mutex::new(vec![Vec::new(); size]),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_gather_varcount(&self, data: &[f64]) -> Vec<Vec<f64>> {
        self.shared.slots.lock()[self.rank] = data.to_vec();
        self.shared.barrier.wait();
        let gathered = self.shared.slots.lock().clone();
        // Slots must not be overwritten by the next collective before everyone has read them
        self.shared.barrier.wait();
        gathered
    }
}

#[cfg(feature = "mpi")]
pub use self::mpi_communicator::MpiCommunicator;

#[cfg(feature = "mpi")]
mod mpi_communicator {
    use super::Communicator;
    use mpi::datatype::PartitionMut;
    use mpi::traits::{Communicator as MpiCommunicatorTrait, CommunicatorCollectives};
    use mpi::Count;

    /// A communicator backed by an MPI communicator.
    pub struct MpiCommunicator<C> {
        comm: C,
    }

    impl<C: MpiCommunicatorTrait> MpiCommunicator<C> {
        pub fn new(comm: C) -> Self {
            Self { comm }
        }

        pub fn inner(&self) -> &C {
            &self.comm
        }
    }

    impl<C: MpiCommunicatorTrait> Communicator for MpiCommunicator<C> {
        fn rank(&self) -> usize {
            self.comm.rank() as usize
        }

        fn size(&self) -> usize {
            self.comm.size() as usize
        }

        fn all_gather_varcount(&self, data: &[f64]) -> Vec<Vec<f64>> {
            let size = self.size();
            let count = data.len() as Count;
            let mut counts = vec![0 as Count; size];
            self.comm.all_gather_into(&count, &mut counts[..]);

            let displacements: Vec<Count> = counts
                .iter()
                .scan(0, |acc, &x| {
                    let old = *acc;
                    *acc += x;
                    Some(old)
                })
                .collect();
            let total = counts.iter().sum::<Count>() as usize;

            let mut buffer = vec![0.0; total];
            {
                let mut partition = PartitionMut::new(&mut buffer[..], &counts[..], &displacements[..]);
                self.comm.all_gather_varcount_into(data, &mut partition);
            }

            counts
                .iter()
                .zip(&displacements)
                .map(|(&count, &offset)| buffer[offset as usize..(offset + count) as usize].to_vec())
                .collect()
        }
    }
}
