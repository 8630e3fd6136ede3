//! In-process rank groups over channels.
//!
//! Each rank of a group runs on its own thread and owns one `ThreadComm`
//! endpoint. Point-to-point transfers go through per-(source, destination)
//! mpsc channels, collectives through a shared barrier. The group counts
//! every message sent, which lets tests assert that a cached rebuild
//! produces no traffic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{mpsc, Arc, Barrier, Mutex};

use super::{CommTag, Communicator};
use crate::error::IdexError;

struct Group {
    barrier: Barrier,
    reduce: Mutex<Vec<u64>>,
    sent: AtomicUsize,
}

pub struct ThreadComm {
    rank: usize,
    size: usize,
    group: Arc<Group>,
    /// senders[d] feeds the channel (self -> d).
    senders: Vec<Sender<(u16, Vec<u8>)>>,
    /// receivers[s] drains the channel (s -> self).
    receivers: Vec<Receiver<(u16, Vec<u8>)>>,
}

impl ThreadComm {
    /// Create the endpoints of an `n`-rank group. Endpoint `r` is meant to
    /// move to the thread acting as rank `r`.
    pub fn group(n: usize) -> Vec<ThreadComm> {
        assert!(n > 0, "rank group must not be empty");
        let group = Arc::new(Group {
            barrier: Barrier::new(n),
            reduce: Mutex::new(vec![0; n]),
            sent: AtomicUsize::new(0),
        });

        let mut senders: Vec<Vec<Sender<(u16, Vec<u8>)>>> = (0..n).map(|_| Vec::new()).collect();
        let mut receivers: Vec<Vec<Receiver<(u16, Vec<u8>)>>> =
            (0..n).map(|_| Vec::new()).collect();
        for src in 0..n {
            for dst in 0..n {
                let (tx, rx) = mpsc::channel();
                senders[src].push(tx);
                receivers[dst].push(rx);
            }
        }
        // receivers[dst] was filled in src order, so receivers[dst][src]
        // drains exactly the (src -> dst) channel.
        let mut comms = Vec::with_capacity(n);
        for (rank, (senders, receivers)) in
            senders.into_iter().zip(receivers.into_iter()).enumerate()
        {
            comms.push(ThreadComm {
                rank,
                size: n,
                group: Arc::clone(&group),
                senders,
                receivers,
            });
        }
        comms
    }

    /// Total messages sent by the whole group so far.
    pub fn sent_messages(&self) -> usize {
        self.group.sent.load(Ordering::SeqCst)
    }

    fn check_peer(&self, peer: usize) -> Result<(), IdexError> {
        if peer >= self.size {
            return Err(IdexError::TransportError(format!(
                "rank {peer} outside group of size {}",
                self.size
            )));
        }
        Ok(())
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.group.barrier.wait();
    }

    fn all_reduce_max(&self, local: u64) -> u64 {
        {
            let mut slots = self.group.reduce.lock().unwrap();
            slots[self.rank] = local;
        }
        self.group.barrier.wait();
        let max = {
            let slots = self.group.reduce.lock().unwrap();
            slots.iter().copied().max().unwrap_or(local)
        };
        // Keep the slots alive until everyone has read them.
        self.group.barrier.wait();
        max
    }

    fn send(&self, buf: &[u8], dest: usize, tag: CommTag) -> Result<(), IdexError> {
        self.check_peer(dest)?;
        self.senders[dest]
            .send((tag.raw(), buf.to_vec()))
            .map_err(|_| IdexError::TransportError(format!("rank {dest} hung up")))?;
        self.group.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn recv(&self, buf: &mut [u8], source: usize, tag: CommTag) -> Result<usize, IdexError> {
        self.check_peer(source)?;
        let (got_tag, bytes) = self.receivers[source]
            .recv()
            .map_err(|_| IdexError::TransportError(format!("rank {source} hung up")))?;
        if got_tag != tag.raw() {
            return Err(IdexError::ProtocolError(format!(
                "expected tag {} from rank {source}, got {got_tag}",
                tag.raw()
            )));
        }
        if bytes.len() > buf.len() {
            return Err(IdexError::TransportError(format!(
                "message of {} bytes exceeds buffer of {}",
                bytes.len(),
                buf.len()
            )));
        }
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn send_recv(
        &self,
        out: &[u8],
        dest: usize,
        inbuf: &mut [u8],
        source: usize,
        tag: CommTag,
    ) -> Result<usize, IdexError> {
        // Channel sends never block, so send-then-receive cannot deadlock,
        // self exchange included.
        self.send(out, dest, tag)?;
        self.recv(inbuf, source, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::EXCHANGE_TAG;
    use std::thread;

    #[test]
    fn pairwise_transfer() {
        let mut comms = ThreadComm::group(2);
        let c1 = comms.pop().unwrap();
        let c0 = comms.pop().unwrap();
        let t = thread::spawn(move || {
            let mut buf = [0u8; 4];
            let n = c1.recv(&mut buf, 0, EXCHANGE_TAG).unwrap();
            (n, buf)
        });
        c0.send(&[9, 8, 7], 1, EXCHANGE_TAG).unwrap();
        let (n, buf) = t.join().unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[9, 8, 7]);
        assert_eq!(c0.sent_messages(), 1);
    }

    #[test]
    fn self_exchange() {
        let comms = ThreadComm::group(1);
        let c = &comms[0];
        let mut buf = [0u8; 2];
        let n = c.send_recv(&[5, 6], 0, &mut buf, 0, EXCHANGE_TAG).unwrap();
        assert_eq!(n, 2);
        assert_eq!(buf, [5, 6]);
    }

    #[test]
    fn max_reduction_across_ranks() {
        let comms = ThreadComm::group(3);
        let handles: Vec<_> = comms
            .into_iter()
            .enumerate()
            .map(|(i, c)| thread::spawn(move || c.all_reduce_max(10 * i as u64)))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 20);
        }
    }

    #[test]
    fn tag_mismatch_is_a_protocol_error() {
        let mut comms = ThreadComm::group(2);
        let c1 = comms.pop().unwrap();
        let c0 = comms.pop().unwrap();
        c0.send(&[1], 1, CommTag::new(7)).unwrap();
        let err = c1.recv(&mut [0u8; 4], 0, CommTag::new(8)).unwrap_err();
        assert!(matches!(err, IdexError::ProtocolError(_)));
    }
}
