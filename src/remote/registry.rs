//! The remote-index registry and its ring discovery protocol.
//!
//! Every process publishes the (global, attribute) pairs of its public
//! indices; the messages travel once around the rank ring, and each
//! receiver merge-joins them against its own sorted records to find the
//! globals it shares with the sender. The result is one entry per peer
//! with a send list (indices we send to the peer) and a receive list
//! (indices we receive), each sorted by ascending global index and
//! holding the attribute the *peer* assigned together with a slot handle
//! to the companion local record.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::collective::CollectiveIterator;
use super::index::{PeerLists, RemoteIndex, RemoteIndexList};
use super::modifier::{MutableModifier, StableModifier};
use super::wire::{self, RingHeader, WirePair};
use super::Direction;
use crate::error::IdexError;
use crate::index::{Attribute, GlobalIndex, ParallelIndexSet};
use crate::parallel::{Communicator, EXCHANGE_TAG};

/// Index sets are shared between their owner, the registry and the
/// modifiers; `Rc::ptr_eq` is the "same object" test that decides
/// whether a peer's two lists collapse into one.
pub type SharedIndexSet<G, A> = Rc<RefCell<ParallelIndexSet<G, A>>>;

pub struct RemoteIndices<G, A, C> {
    source: SharedIndexSet<G, A>,
    target: SharedIndexSet<G, A>,
    comm: C,
    peers: BTreeMap<usize, PeerLists<A>>,
    source_seq: Option<u64>,
    dest_seq: Option<u64>,
    public_ignored: bool,
    first_build: bool,
}

impl<G: GlobalIndex, A: Attribute, C: Communicator> RemoteIndices<G, A, C> {
    /// Record the index sets and communicator. No exchange happens until
    /// [`rebuild`](Self::rebuild).
    pub fn new(source: SharedIndexSet<G, A>, target: SharedIndexSet<G, A>, comm: C) -> Self {
        RemoteIndices {
            source,
            target,
            comm,
            peers: BTreeMap::new(),
            source_seq: None,
            dest_seq: None,
            public_ignored: false,
            first_build: true,
        }
    }

    /// Replace the index sets and communicator. All lists built so far
    /// are freed and the registry is marked never-built.
    pub fn set_index_sets(
        &mut self,
        source: SharedIndexSet<G, A>,
        target: SharedIndexSet<G, A>,
        comm: C,
    ) {
        self.free();
        self.source = source;
        self.target = target;
        self.comm = comm;
    }

    pub fn communicator(&self) -> &C {
        &self.comm
    }

    pub fn source_set(&self) -> &SharedIndexSet<G, A> {
        &self.source
    }

    pub fn target_set(&self) -> &SharedIndexSet<G, A> {
        &self.target
    }

    /// Number of peers any index is shared with.
    pub fn neighbours(&self) -> usize {
        self.peers.len()
    }

    /// Ordered traversal over (peer rank, lists).
    pub fn peers(&self) -> impl Iterator<Item = (usize, &PeerLists<A>)> {
        self.peers.iter().map(|(rank, lists)| (*rank, lists))
    }

    pub fn lists(&self, peer: usize) -> Option<&PeerLists<A>> {
        self.peers.get(&peer)
    }

    /// True iff the cached sequence numbers of the last successful build
    /// match the current ones on both index sets.
    pub fn synced(&self) -> bool {
        self.source_seq == Some(self.source.borrow().seq_no())
            && self.dest_seq == Some(self.target.borrow().seq_no())
    }

    /// Free all lists and mark the registry never-built.
    pub fn free(&mut self) {
        self.peers.clear();
        self.source_seq = None;
        self.dest_seq = None;
        self.first_build = true;
    }

    /// Idempotent build. Runs the discovery protocol unless the previous
    /// build used the same `ignore_public` flag and both index sets are
    /// unchanged since. Collective: every rank of the communicator must
    /// call this in the same epoch with the same flag.
    ///
    /// On failure the registry is left empty and unsynced; no partial
    /// state survives.
    pub fn rebuild(&mut self, ignore_public: bool) -> Result<(), IdexError> {
        if !self.first_build && ignore_public == self.public_ignored && self.synced() {
            return Ok(());
        }
        self.peers.clear();
        match self.build_remote(ignore_public) {
            Ok(peers) => {
                self.peers = peers;
                self.source_seq = Some(self.source.borrow().seq_no());
                self.dest_seq = Some(self.target.borrow().seq_no());
                self.public_ignored = ignore_public;
                self.first_build = false;
                Ok(())
            }
            Err(err) => {
                self.free();
                Err(err)
            }
        }
    }

    /// Modifier over one peer's list for callers whose index set stays
    /// untouched while the modifier lives. Creates the peer entry
    /// (shared or split, depending on whether source and target are the
    /// same set) if absent.
    ///
    /// Taking a modifier stamps the registry as freshly synchronized:
    /// the caller certifies that the edits leave it consistent.
    pub fn stable_modifier(
        &mut self,
        peer: usize,
        direction: Direction,
    ) -> StableModifier<'_, G, A> {
        let set = self.direction_set(direction);
        let list = self.modifier_list(peer, direction);
        StableModifier::new(set, list)
    }

    /// Modifier variant for callers that resize the index set before
    /// flushing; maintains the shadow list needed by
    /// [`repair_local_index_pointers`](MutableModifier::repair_local_index_pointers).
    pub fn mutable_modifier(
        &mut self,
        peer: usize,
        direction: Direction,
    ) -> MutableModifier<'_, G, A> {
        let set = self.direction_set(direction);
        let list = self.modifier_list(peer, direction);
        MutableModifier::new(set, list)
    }

    /// Iterator walking all peers' lists of `direction` in lockstep by
    /// ascending global index.
    pub fn collective_iterator(&self, direction: Direction) -> CollectiveIterator<'_, G, A> {
        CollectiveIterator::new(
            self.peers
                .iter()
                .map(|(rank, lists)| (*rank, lists.list(direction))),
            self.direction_set(direction),
        )
    }

    fn direction_set(&self, direction: Direction) -> SharedIndexSet<G, A> {
        match direction {
            Direction::Send => Rc::clone(&self.source),
            Direction::Receive => Rc::clone(&self.target),
        }
    }

    fn modifier_list(&mut self, peer: usize, direction: Direction) -> &mut RemoteIndexList<A> {
        // The caller takes over responsibility for consistency.
        self.source_seq = Some(self.source.borrow().seq_no());
        self.dest_seq = Some(self.target.borrow().seq_no());
        self.first_build = false;

        let shared = Rc::ptr_eq(&self.source, &self.target);
        self.peers
            .entry(peer)
            .or_insert_with(|| {
                if shared {
                    PeerLists::Shared(RemoteIndexList::new())
                } else {
                    PeerLists::split_empty()
                }
            })
            .list_mut(direction)
    }

    fn build_remote(
        &self,
        ignore_public: bool,
    ) -> Result<BTreeMap<usize, PeerLists<A>>, IdexError> {
        let rank = self.comm.rank();
        let procs = self.comm.size();

        let source = self.source.borrow();
        let target = self.target.borrow();
        let send_two = !Rc::ptr_eq(&self.source, &self.target);

        let source_slots = published_slots(&source, ignore_public);
        let dest_slots = if send_two {
            Some(published_slots(&target, ignore_public))
        } else {
            None
        };
        let source_publish = source_slots.len();
        let dest_publish = dest_slots.as_ref().map_or(0, Vec::len);

        // One max-reduction sizes both buffers identically on all ranks,
        // so any peer's message is guaranteed to fit.
        let max_publish = self
            .comm
            .all_reduce_max((source_publish + dest_publish) as u64) as usize;
        let capacity = wire::message_capacity::<G, A>(max_publish)?;
        let mut cur = vec![0u8; capacity];
        let mut aux = vec![0u8; capacity];

        let header = RingHeader {
            two_sets: send_two,
            source_count: source_publish as u32,
            dest_count: dest_publish as u32,
        };
        let mut cur_len = wire::pack_message(
            &mut cur,
            &header,
            pairs_of(&source, &source_slots),
            dest_slots
                .as_deref()
                .map(|slots| pairs_of(&target, slots))
                .into_iter()
                .flatten(),
        )?;

        let mut peers = BTreeMap::new();
        let mut scratch = Vec::with_capacity(max_publish);
        let mut scratch2 = Vec::with_capacity(max_publish);
        let dest_slots_ref = dest_slots.as_deref().unwrap_or(&source_slots);

        // Hop 0: a self exchange when two streams are sent, which also
        // yields the self entry for overlapping source/target sets.
        if send_two {
            let in_len = self
                .comm
                .send_recv(&cur[..cur_len], rank, &mut aux[..], rank, EXCHANGE_TAG)?;
            std::mem::swap(&mut cur, &mut aux);
            cur_len = in_len;
            unpack_message(
                &cur[..cur_len],
                rank,
                send_two,
                max_publish,
                &source,
                &target,
                &source_slots,
                dest_slots_ref,
                &mut scratch,
                &mut scratch2,
                &mut peers,
            )?;
        }

        // Ring hops: forward the previously received message verbatim to
        // (rank+1), receive the next one from (rank-1). Even ranks send
        // first, odd ranks receive first.
        for hop in 1..procs {
            let dest = (rank + 1) % procs;
            let src = (rank + procs - 1) % procs;
            let in_len = if rank % 2 == 0 {
                self.comm.send(&cur[..cur_len], dest, EXCHANGE_TAG)?;
                self.comm.recv(&mut aux[..], src, EXCHANGE_TAG)?
            } else {
                let n = self.comm.recv(&mut aux[..], src, EXCHANGE_TAG)?;
                self.comm.send(&cur[..cur_len], dest, EXCHANGE_TAG)?;
                n
            };
            std::mem::swap(&mut cur, &mut aux);
            cur_len = in_len;

            let remote = (rank + procs - hop) % procs;
            unpack_message(
                &cur[..cur_len],
                remote,
                send_two,
                max_publish,
                &source,
                &target,
                &source_slots,
                dest_slots_ref,
                &mut scratch,
                &mut scratch2,
                &mut peers,
            )?;
        }

        self.comm.barrier();
        Ok(peers)
    }
}

/// Slots of the records a set publishes, in ascending global order.
fn published_slots<G: GlobalIndex, A: Attribute>(
    set: &ParallelIndexSet<G, A>,
    ignore_public: bool,
) -> Vec<usize> {
    set.iter()
        .enumerate()
        .filter(|(_, pair)| ignore_public || pair.local().is_public())
        .map(|(slot, _)| slot)
        .collect()
}

fn pairs_of<'a, G: GlobalIndex, A: Attribute>(
    set: &'a ParallelIndexSet<G, A>,
    slots: &'a [usize],
) -> impl Iterator<Item = WirePair<G, A>> + 'a {
    slots.iter().map(move |&slot| {
        let pair = set.pair(slot);
        WirePair {
            global: pair.global(),
            attribute: pair.local().attribute(),
            local: pair.local().local() as u32,
            public: pair.local().is_public(),
        }
    })
}

/// Single forward pass over two G-sorted streams: emit a remote record
/// whenever the received stream and the local probe table agree on a
/// global, storing the attribute the peer reported and the local slot.
fn merge_join<G: GlobalIndex, A: Attribute>(
    stream: &[WirePair<G, A>],
    slots: &[usize],
    set: &ParallelIndexSet<G, A>,
    out: &mut RemoteIndexList<A>,
) {
    let mut s = 0usize;
    for pair in stream {
        while s < slots.len() && set.global_at(slots[s]) < pair.global {
            s += 1;
        }
        if s == slots.len() {
            break;
        }
        if set.global_at(slots[s]) == pair.global {
            out.push(RemoteIndex::new(pair.attribute, slots[s]));
            s += 1;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn unpack_message<G: GlobalIndex, A: Attribute>(
    bytes: &[u8],
    remote: usize,
    send_two: bool,
    max_publish: usize,
    source: &ParallelIndexSet<G, A>,
    target: &ParallelIndexSet<G, A>,
    source_slots: &[usize],
    dest_slots: &[usize],
    scratch: &mut Vec<WirePair<G, A>>,
    scratch2: &mut Vec<WirePair<G, A>>,
    peers: &mut BTreeMap<usize, PeerLists<A>>,
) -> Result<(), IdexError> {
    let (header, mut cursor) = wire::unpack_header(bytes)?;
    let source_count = header.source_count as usize;
    let dest_count = header.dest_count as usize;
    if source_count + dest_count > max_publish {
        return Err(IdexError::ProtocolError(format!(
            "rank {remote} announced {} pairs, buffer sized for {max_publish}",
            source_count + dest_count
        )));
    }
    wire::unpack_pairs(&mut cursor, source_count, scratch)?;

    let lists = if !header.two_sets {
        if send_two {
            // The peer merged its sets; intersect its one stream with
            // both of ours.
            let mut send = RemoteIndexList::new();
            let mut receive = RemoteIndexList::new();
            merge_join(scratch, source_slots, source, &mut send);
            merge_join(scratch, dest_slots, target, &mut receive);
            PeerLists::Split { send, receive }
        } else {
            // Both sides merged: one list serves both directions.
            let mut list = RemoteIndexList::new();
            merge_join(scratch, source_slots, source, &mut list);
            PeerLists::Shared(list)
        }
    } else {
        // The peer sent both streams: what it receives into (its target)
        // drives our send list, what it sends from (its source) drives
        // our receive list. Each probe table advances its own cursor.
        wire::unpack_pairs(&mut cursor, dest_count, scratch2)?;
        let mut send = RemoteIndexList::new();
        let mut receive = RemoteIndexList::new();
        if send_two {
            merge_join(scratch, dest_slots, target, &mut receive);
        } else {
            merge_join(scratch, source_slots, source, &mut receive);
        }
        merge_join(scratch2, source_slots, source, &mut send);
        PeerLists::Split { send, receive }
    };

    if !lists.is_empty() {
        peers.insert(remote, lists);
    }
    Ok(())
}
