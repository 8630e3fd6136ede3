//! Cursor-style editors over one peer's remote index list.
//!
//! Both modifiers enforce the list discipline: every insertion or removal
//! must name a global index at least as large as the last one touched,
//! so a sequence of edits is a single forward pass. They differ in what
//! may happen to the underlying index set while they live:
//!
//! * [`StableModifier`] — the index set is guaranteed unchanged; slot
//!   handles stay valid and ordering is read through them.
//! * [`MutableModifier`] — the index set may resize before the edits are
//!   flushed. A shadow list of global ids is maintained next to the
//!   records, and [`MutableModifier::repair_local_index_pointers`]
//!   restores every handle once the set is back in ground state.

use super::index::{RemoteIndex, RemoteIndexList};
use super::registry::SharedIndexSet;
use crate::error::IdexError;
use crate::index::{Attribute, GlobalIndex, IndexSetState, ParallelIndexSet};

/// Forward cursor shared by both modifier modes.
struct Cursor<G> {
    pos: usize,
    last: Option<G>,
}

impl<G: GlobalIndex> Cursor<G> {
    fn new() -> Self {
        Cursor {
            pos: 0,
            last: None,
        }
    }

    fn check_ascending(&self, global: &G) -> Result<(), IdexError> {
        match &self.last {
            Some(last) if global < last => Err(IdexError::InvalidPosition),
            _ => Ok(()),
        }
    }
}

fn referenced_global<G: GlobalIndex, A: Attribute>(
    set: &ParallelIndexSet<G, A>,
    entry: &RemoteIndex<A>,
) -> Result<G, IdexError> {
    Ok(set
        .get(entry.slot())
        .ok_or(IdexError::NoSuchGlobalIndex)?
        .global())
}

/// Modifier for a list whose index set stays untouched while the
/// modifier lives.
pub struct StableModifier<'l, G, A> {
    set: SharedIndexSet<G, A>,
    list: &'l mut RemoteIndexList<A>,
    cursor: Cursor<G>,
}

impl<'l, G: GlobalIndex, A: Attribute> StableModifier<'l, G, A> {
    pub(crate) fn new(set: SharedIndexSet<G, A>, list: &'l mut RemoteIndexList<A>) -> Self {
        StableModifier {
            set,
            list,
            cursor: Cursor::new(),
        }
    }

    /// Insert a record at the position determined by the global index of
    /// its referenced local record.
    pub fn insert(&mut self, index: RemoteIndex<A>) -> Result<(), IdexError> {
        let set = self.set.borrow();
        let global = referenced_global(&set, &index)?;
        self.cursor.check_ascending(&global)?;
        while let Some(entry) = self.list.get(self.cursor.pos) {
            if referenced_global(&set, entry)? < global {
                self.cursor.pos += 1;
            } else {
                break;
            }
        }
        if let Some(entry) = self.list.get(self.cursor.pos) {
            if referenced_global(&set, entry)? == global {
                return Err(IdexError::DuplicateIndex);
            }
        }
        drop(set);
        // The cursor stays on the inserted record, so an immediate
        // removal of the same global finds it again.
        self.list.insert_at(self.cursor.pos, index);
        self.cursor.last = Some(global);
        Ok(())
    }

    /// Remove the record for `global`; returns whether one existed.
    pub fn remove(&mut self, global: &G) -> Result<bool, IdexError> {
        self.cursor.check_ascending(global)?;
        let found = {
            let set = self.set.borrow();
            while let Some(entry) = self.list.get(self.cursor.pos) {
                if referenced_global(&set, entry)? < *global {
                    self.cursor.pos += 1;
                } else {
                    break;
                }
            }
            match self.list.get(self.cursor.pos) {
                Some(entry) => referenced_global(&set, entry)? == *global,
                None => false,
            }
        };
        if found {
            self.list.remove_at(self.cursor.pos);
        }
        self.cursor.last = Some(*global);
        Ok(found)
    }
}

/// Modifier for a list whose index set may resize before the edits are
/// flushed.
///
/// Construct it while the slot handles are still valid: the shadow list
/// is captured by reading through them.
pub struct MutableModifier<'l, G, A> {
    set: SharedIndexSet<G, A>,
    list: &'l mut RemoteIndexList<A>,
    shadow: Vec<G>,
    cursor: Cursor<G>,
}

impl<'l, G: GlobalIndex, A: Attribute> MutableModifier<'l, G, A> {
    pub(crate) fn new(set: SharedIndexSet<G, A>, list: &'l mut RemoteIndexList<A>) -> Self {
        let shadow = {
            let set = set.borrow();
            list.iter().map(|e| set.global_at(e.slot())).collect()
        };
        MutableModifier {
            set,
            list,
            shadow,
            cursor: Cursor::new(),
        }
    }

    /// Insert a record under an explicitly named global index (the set
    /// may no longer be consulted through the record's handle).
    pub fn insert(&mut self, index: RemoteIndex<A>, global: G) -> Result<(), IdexError> {
        self.cursor.check_ascending(&global)?;
        while self.cursor.pos < self.shadow.len() && self.shadow[self.cursor.pos] < global {
            self.cursor.pos += 1;
        }
        if self.cursor.pos < self.shadow.len() && self.shadow[self.cursor.pos] == global {
            return Err(IdexError::DuplicateIndex);
        }
        self.list.insert_at(self.cursor.pos, index);
        self.shadow.insert(self.cursor.pos, global);
        self.cursor.last = Some(global);
        Ok(())
    }

    /// Remove the record for `global`; returns whether one existed.
    pub fn remove(&mut self, global: &G) -> Result<bool, IdexError> {
        self.cursor.check_ascending(global)?;
        while self.cursor.pos < self.shadow.len() && self.shadow[self.cursor.pos] < *global {
            self.cursor.pos += 1;
        }
        let found =
            self.cursor.pos < self.shadow.len() && self.shadow[self.cursor.pos] == *global;
        if found {
            self.list.remove_at(self.cursor.pos);
            self.shadow.remove(self.cursor.pos);
        }
        self.cursor.last = Some(*global);
        Ok(found)
    }

    /// Re-resolve every slot handle by walking the shadow list against a
    /// fresh traversal of the index set.
    ///
    /// The set must be back in ground state. If a shadow global no
    /// longer exists in the set, `NoSuchGlobalIndex` is returned and the
    /// list is left untouched.
    pub fn repair_local_index_pointers(&mut self) -> Result<(), IdexError> {
        let set = self.set.borrow();
        if set.state() != IndexSetState::Ground {
            return Err(IdexError::InvalidIndexSetState(
                "repair requires ground state".into(),
            ));
        }
        // Resolve everything first so a missing global leaves the list
        // unchanged.
        let mut slots = Vec::with_capacity(self.shadow.len());
        let mut slot = 0usize;
        for global in &self.shadow {
            while slot < set.len() && set.global_at(slot) < *global {
                slot += 1;
            }
            if slot >= set.len() || set.global_at(slot) != *global {
                return Err(IdexError::NoSuchGlobalIndex);
            }
            slots.push(slot);
        }
        for (pos, slot) in slots.into_iter().enumerate() {
            self.list.entry_mut(pos).set_slot(slot);
        }
        Ok(())
    }
}
