//! Message-passing backends for the index exchange.
//!
//! The exchange protocol only needs a handful of primitives: rank/size
//! queries, a barrier, a max-reduction for buffer sizing, and tagged
//! point-to-point byte transfers. `Communicator` captures exactly that,
//! with three implementations: [`SerialComm`] for single-process runs,
//! [`ThreadComm`] for in-process rank groups (tests, shared memory), and
//! `MpiComm` behind the `mpi` feature.

use crate::error::IdexError;

/// Message tag separating one protocol's traffic from another's.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(u16);

impl CommTag {
    pub const fn new(raw: u16) -> Self {
        CommTag(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn offset(self, delta: u16) -> Self {
        CommTag(self.0 + delta)
    }
}

/// Tag used for every hop of the index discovery ring.
pub const EXCHANGE_TAG: CommTag = CommTag::new(333);

/// Blocking point-to-point and collective primitives over byte buffers.
///
/// All collective calls (`barrier`, `all_reduce_max`) must be entered by
/// every rank of the communicator in the same epoch.
pub trait Communicator {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);

    /// Max-reduction over all ranks.
    fn all_reduce_max(&self, local: u64) -> u64;

    /// Send `buf` to `dest`.
    fn send(&self, buf: &[u8], dest: usize, tag: CommTag) -> Result<(), IdexError>;

    /// Receive from `source` into `buf`; returns the received length.
    fn recv(&self, buf: &mut [u8], source: usize, tag: CommTag) -> Result<usize, IdexError>;

    /// Simultaneous send to `dest` and receive from `source`. Must not
    /// deadlock when `dest == source == rank()` (self exchange).
    fn send_recv(
        &self,
        out: &[u8],
        dest: usize,
        inbuf: &mut [u8],
        source: usize,
        tag: CommTag,
    ) -> Result<usize, IdexError>;
}

/// Single-process communicator. Point-to-point transfers other than the
/// self exchange have no peer and fail.
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn all_reduce_max(&self, local: u64) -> u64 {
        local
    }

    fn send(&self, _buf: &[u8], dest: usize, _tag: CommTag) -> Result<(), IdexError> {
        Err(IdexError::TransportError(format!(
            "serial communicator has no peer {dest}"
        )))
    }

    fn recv(&self, _buf: &mut [u8], source: usize, _tag: CommTag) -> Result<usize, IdexError> {
        Err(IdexError::TransportError(format!(
            "serial communicator has no peer {source}"
        )))
    }

    fn send_recv(
        &self,
        out: &[u8],
        dest: usize,
        inbuf: &mut [u8],
        source: usize,
        _tag: CommTag,
    ) -> Result<usize, IdexError> {
        if dest != 0 || source != 0 {
            return Err(IdexError::TransportError(format!(
                "serial communicator has no peer {dest}/{source}"
            )));
        }
        if inbuf.len() < out.len() {
            return Err(IdexError::TransportError(
                "receive buffer too small for self exchange".into(),
            ));
        }
        inbuf[..out.len()].copy_from_slice(out);
        Ok(out.len())
    }
}

pub mod thread_comm;
pub use thread_comm::ThreadComm;

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_rank_and_size() {
        let comm = SerialComm;
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        assert_eq!(comm.all_reduce_max(7), 7);
    }

    #[test]
    fn serial_self_exchange_copies() {
        let comm = SerialComm;
        let out = [1u8, 2, 3];
        let mut inbuf = [0u8; 8];
        let n = comm.send_recv(&out, 0, &mut inbuf, 0, EXCHANGE_TAG).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&inbuf[..3], &out);
    }

    #[test]
    fn serial_rejects_remote_peers() {
        let comm = SerialComm;
        assert!(comm.send(&[0], 1, EXCHANGE_TAG).is_err());
        assert!(comm.recv(&mut [0], 1, EXCHANGE_TAG).is_err());
    }
}
