//! Lockstep iteration over all peers' remote index lists.
//!
//! The iterator keeps one cursor per peer and advances them jointly by
//! ascending global index, so higher layers can build per-global
//! communication descriptors without materializing a global table.
//! Callers must advance monotonically; a non-monotone target yields an
//! empty view (checked in debug builds).

use std::cell::Ref;
use std::collections::btree_map;
use std::collections::BTreeMap;

use super::index::{RemoteIndex, RemoteIndexList};
use super::registry::SharedIndexSet;
use crate::index::{Attribute, GlobalIndex, ParallelIndexSet};

struct PeerCursor<'r, A> {
    list: &'r RemoteIndexList<A>,
    pos: usize,
}

pub struct CollectiveIterator<'r, G, A> {
    peers: BTreeMap<usize, PeerCursor<'r, A>>,
    set: SharedIndexSet<G, A>,
    current: Option<G>,
}

impl<'r, G: GlobalIndex, A: Attribute> CollectiveIterator<'r, G, A> {
    pub(crate) fn new(
        lists: impl Iterator<Item = (usize, &'r RemoteIndexList<A>)>,
        set: SharedIndexSet<G, A>,
    ) -> Self {
        let peers = lists
            .map(|(rank, list)| (rank, PeerCursor { list, pos: 0 }))
            .collect();
        CollectiveIterator {
            peers,
            set,
            current: None,
        }
    }

    /// Forward every peer's cursor to the first record with global index
    /// at least `global`, dropping peers whose list is exhausted, and
    /// make `global` the current target.
    pub fn advance(&mut self, global: G) {
        if let Some(current) = &self.current {
            debug_assert!(
                *current <= global,
                "collective iterator must advance monotonically"
            );
        }
        let set = self.set.borrow();
        self.peers.retain(|_, cursor| {
            while let Some(entry) = cursor.list.get(cursor.pos) {
                if set.global_at(entry.slot()) < global {
                    cursor.pos += 1;
                } else {
                    break;
                }
            }
            cursor.pos < cursor.list.len()
        });
        self.current = Some(global);
    }

    /// True once every peer's list is exhausted.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// The peers whose cursor sits exactly on the current target global,
    /// as (peer rank, remote record).
    pub fn matches(&self) -> Matches<'_, 'r, G, A> {
        Matches {
            inner: self.peers.iter(),
            set: self.set.borrow(),
            current: self.current,
        }
    }
}

pub struct Matches<'it, 'r, G, A> {
    inner: btree_map::Iter<'it, usize, PeerCursor<'r, A>>,
    set: Ref<'it, ParallelIndexSet<G, A>>,
    current: Option<G>,
}

impl<'it, 'r, G: GlobalIndex, A: Attribute> Iterator for Matches<'it, 'r, G, A> {
    type Item = (usize, RemoteIndex<A>);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        for (rank, cursor) in self.inner.by_ref() {
            if let Some(entry) = cursor.list.get(cursor.pos) {
                if self.set.global_at(entry.slot()) == current {
                    return Some((*rank, *entry));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::index::{ParallelIndexSet, ParallelLocalIndex};
    use crate::parallel::SerialComm;
    use crate::remote::{Direction, RemoteIndex, RemoteIndices};
    use serde::{Deserialize, Serialize};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(
        Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize,
    )]
    enum Flag {
        #[default]
        Owner,
        Copy,
    }

    /// Registry with peer 1 holding {1, 3, 7} and peer 2 holding
    /// {3, 5, 7}, injected through modifiers.
    fn two_peer_registry() -> RemoteIndices<u32, Flag, SerialComm> {
        let mut set = ParallelIndexSet::new();
        set.begin_resize().unwrap();
        for (i, g) in [1u32, 3, 5, 7].iter().enumerate() {
            set.add(*g, ParallelLocalIndex::new(i, Flag::Owner, true))
                .unwrap();
        }
        set.end_resize().unwrap();
        let set = Rc::new(RefCell::new(set));

        let mut remote = RemoteIndices::new(Rc::clone(&set), set, SerialComm);
        {
            let mut m = remote.stable_modifier(1, Direction::Send);
            for slot in [0usize, 1, 3] {
                m.insert(RemoteIndex::new(Flag::Owner, slot)).unwrap();
            }
        }
        {
            let mut m = remote.stable_modifier(2, Direction::Send);
            for slot in [1usize, 2, 3] {
                m.insert(RemoteIndex::new(Flag::Copy, slot)).unwrap();
            }
        }
        remote
    }

    #[test]
    fn advance_walks_peers_in_lockstep() {
        let remote = two_peer_registry();
        let mut it = remote.collective_iterator(Direction::Send);

        it.advance(3);
        let ranks: Vec<usize> = it.matches().map(|(rank, _)| rank).collect();
        assert_eq!(ranks, vec![1, 2]);

        it.advance(7);
        let ranks: Vec<usize> = it.matches().map(|(rank, _)| rank).collect();
        assert_eq!(ranks, vec![1, 2]);

        it.advance(8);
        assert!(it.is_empty());
        assert_eq!(it.matches().count(), 0);
    }

    #[test]
    fn only_matching_peers_are_yielded() {
        let remote = two_peer_registry();
        let mut it = remote.collective_iterator(Direction::Send);

        it.advance(1);
        let hits: Vec<(usize, Flag)> = it
            .matches()
            .map(|(rank, entry)| (rank, entry.attribute()))
            .collect();
        assert_eq!(hits, vec![(1, Flag::Owner)]);

        it.advance(5);
        let ranks: Vec<usize> = it.matches().map(|(rank, _)| rank).collect();
        assert_eq!(ranks, vec![2]);
    }

    #[test]
    fn no_matches_before_first_advance() {
        let remote = two_peer_registry();
        let it = remote.collective_iterator(Direction::Send);
        assert_eq!(it.matches().count(), 0);
        assert!(!it.is_empty());
    }
}
