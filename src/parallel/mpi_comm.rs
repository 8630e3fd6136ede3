//! MPI-based communication backend (mpi feature).
//!
//! The caller must initialize MPI before constructing `MpiComm`:
//!
//! ```ignore
//! let _universe = mpi::initialize().expect("MPI init failed");
//! let comm = MpiComm::new();
//! ```

use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use super::{CommTag, Communicator};
use crate::error::IdexError;

pub struct MpiComm {
    pub world: SimpleCommunicator,
    pub rank: usize,
    pub size: usize,
}

impl MpiComm {
    /// Wrap the world communicator. Panics if MPI has not been initialized.
    pub fn new() -> Self {
        let world = SimpleCommunicator::world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiComm { world, rank, size }
    }
}

impl Default for MpiComm {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.world.barrier();
    }

    fn all_reduce_max(&self, local: u64) -> u64 {
        let mut global = 0u64;
        self.world
            .all_reduce_into(&local, &mut global, SystemOperation::max());
        global
    }

    fn send(&self, buf: &[u8], dest: usize, tag: CommTag) -> Result<(), IdexError> {
        self.world
            .process_at_rank(dest as i32)
            .send_with_tag(buf, tag.raw() as i32);
        Ok(())
    }

    fn recv(&self, buf: &mut [u8], source: usize, tag: CommTag) -> Result<usize, IdexError> {
        let status = self
            .world
            .process_at_rank(source as i32)
            .receive_into_with_tag(&mut buf[..], tag.raw() as i32);
        Ok(status.count(u8::equivalent_datatype()) as usize)
    }

    fn send_recv(
        &self,
        out: &[u8],
        dest: usize,
        inbuf: &mut [u8],
        source: usize,
        tag: CommTag,
    ) -> Result<usize, IdexError> {
        let mut received = 0usize;
        mpi::request::scope(|scope| {
            let req = self
                .world
                .process_at_rank(dest as i32)
                .immediate_send_with_tag(scope, out, tag.raw() as i32);
            let status = self
                .world
                .process_at_rank(source as i32)
                .receive_into_with_tag(&mut inbuf[..], tag.raw() as i32);
            received = status.count(u8::equivalent_datatype()) as usize;
            req.wait();
        });
        Ok(received)
    }
}
