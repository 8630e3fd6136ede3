//! The parallel index set: a sorted sequence of (global, local) records
//! with resize-epoch bookkeeping.
//!
//! Between resizes the set is in *ground* state: records are strictly
//! sorted by global index and their slot positions are stable, so other
//! components may hold slot handles into the set. A resize
//! (`begin_resize` .. `end_resize`) stages additions and deletions, then
//! merges them in one pass, bumps the sequence number and returns to
//! ground state. Anything holding slot handles across a resize must
//! repair them afterwards.

use super::{Attribute, GlobalIndex, ParallelLocalIndex};
use crate::error::IdexError;

/// One record of the set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IndexPair<G, A> {
    global: G,
    local: ParallelLocalIndex<A>,
}

impl<G: GlobalIndex, A: Attribute> IndexPair<G, A> {
    pub fn new(global: G, local: ParallelLocalIndex<A>) -> Self {
        IndexPair { global, local }
    }

    pub fn global(&self) -> G {
        self.global
    }

    pub fn local(&self) -> &ParallelLocalIndex<A> {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut ParallelLocalIndex<A> {
        &mut self.local
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IndexSetState {
    Ground,
    Resizing,
}

pub struct ParallelIndexSet<G, A> {
    pairs: Vec<IndexPair<G, A>>,
    staged: Vec<IndexPair<G, A>>,
    deleted: Vec<usize>,
    state: IndexSetState,
    seq_no: u64,
}

impl<G: GlobalIndex, A: Attribute> Default for ParallelIndexSet<G, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: GlobalIndex, A: Attribute> ParallelIndexSet<G, A> {
    pub fn new() -> Self {
        ParallelIndexSet {
            pairs: Vec::new(),
            staged: Vec::new(),
            deleted: Vec::new(),
            state: IndexSetState::Ground,
            seq_no: 0,
        }
    }

    pub fn state(&self) -> IndexSetState {
        self.state
    }

    /// Monotonic counter, bumped at every `end_resize`.
    pub fn seq_no(&self) -> u64 {
        self.seq_no
    }

    /// Number of ground-state records. Staged additions are not counted.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over the ground-state records in ascending global order.
    pub fn iter(&self) -> std::slice::Iter<'_, IndexPair<G, A>> {
        self.pairs.iter()
    }

    /// The record at `slot`, if the handle is in range.
    pub fn get(&self, slot: usize) -> Option<&IndexPair<G, A>> {
        self.pairs.get(slot)
    }

    /// The record at `slot`. Panics on a stale out-of-range handle.
    pub fn pair(&self, slot: usize) -> &IndexPair<G, A> {
        &self.pairs[slot]
    }

    /// The global index referenced by `slot`. Panics on a stale
    /// out-of-range handle.
    pub fn global_at(&self, slot: usize) -> G {
        self.pairs[slot].global
    }

    /// Slot of `global`, by binary search. Only meaningful in ground state.
    pub fn position_of(&self, global: &G) -> Option<usize> {
        self.pairs
            .binary_search_by(|p| p.global.cmp(global))
            .ok()
    }

    pub fn begin_resize(&mut self) -> Result<(), IdexError> {
        if self.state != IndexSetState::Ground {
            return Err(IdexError::InvalidIndexSetState(
                "begin_resize requires ground state".into(),
            ));
        }
        self.state = IndexSetState::Resizing;
        Ok(())
    }

    /// Stage a new record. Only allowed while resizing.
    pub fn add(&mut self, global: G, local: ParallelLocalIndex<A>) -> Result<(), IdexError> {
        if self.state != IndexSetState::Resizing {
            return Err(IdexError::InvalidIndexSetState(
                "add requires an open resize".into(),
            ));
        }
        self.staged.push(IndexPair::new(global, local));
        Ok(())
    }

    /// Mark an existing record for deletion at `end_resize`.
    pub fn mark_deleted(&mut self, global: &G) -> Result<bool, IdexError> {
        if self.state != IndexSetState::Resizing {
            return Err(IdexError::InvalidIndexSetState(
                "mark_deleted requires an open resize".into(),
            ));
        }
        match self.pairs.binary_search_by(|p| p.global.cmp(global)) {
            Ok(slot) => {
                if !self.deleted.contains(&slot) {
                    self.deleted.push(slot);
                }
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Merge staged changes, bump the sequence number and return to
    /// ground state. Fails on duplicate globals, leaving the resize open.
    pub fn end_resize(&mut self) -> Result<(), IdexError> {
        if self.state != IndexSetState::Resizing {
            return Err(IdexError::InvalidIndexSetState(
                "end_resize requires an open resize".into(),
            ));
        }
        let mut merged: Vec<IndexPair<G, A>> =
            Vec::with_capacity(self.pairs.len() + self.staged.len());
        for (slot, pair) in self.pairs.iter().enumerate() {
            if !self.deleted.contains(&slot) {
                merged.push(*pair);
            }
        }
        merged.extend(self.staged.iter().copied());
        merged.sort_by(|a, b| a.global.cmp(&b.global));
        if merged.windows(2).any(|w| w[0].global == w[1].global) {
            return Err(IdexError::InvalidIndexSetState(
                "duplicate global index staged".into(),
            ));
        }
        self.pairs = merged;
        self.staged.clear();
        self.deleted.clear();
        self.seq_no += 1;
        self.state = IndexSetState::Ground;
        Ok(())
    }
}

/// Ground-state view adding local-id resolution next to the global one.
///
/// Built once and queried many times by adapters that translate between
/// local array positions and global identifiers.
pub struct GlobalLookup<'s, G, A> {
    set: &'s ParallelIndexSet<G, A>,
    by_local: Vec<Option<usize>>,
}

impl<'s, G: GlobalIndex, A: Attribute> GlobalLookup<'s, G, A> {
    pub fn new(set: &'s ParallelIndexSet<G, A>) -> Result<Self, IdexError> {
        if set.state() != IndexSetState::Ground {
            return Err(IdexError::InvalidIndexSetState(
                "lookup requires ground state".into(),
            ));
        }
        let max_local = set.iter().map(|p| p.local().local()).max();
        let mut by_local = vec![None; max_local.map_or(0, |m| m + 1)];
        for (slot, pair) in set.iter().enumerate() {
            by_local[pair.local().local()] = Some(slot);
        }
        Ok(GlobalLookup { set, by_local })
    }

    pub fn set(&self) -> &ParallelIndexSet<G, A> {
        self.set
    }

    /// The record whose dense local id is `local`.
    pub fn pair_of_local(&self, local: usize) -> Option<&IndexPair<G, A>> {
        let slot = (*self.by_local.get(local)?)?;
        self.set.get(slot)
    }

    /// The local index registered for `global`.
    pub fn local_of(&self, global: &G) -> Option<&ParallelLocalIndex<A>> {
        let slot = self.set.position_of(global)?;
        Some(self.set.pair(slot).local())
    }
}
