//! Global view of a process-local aggregates map.
//!
//! Coarsening assigns every vertex to a local aggregate id. To exchange
//! that assignment between processes it must be expressed in global ids:
//! reading position `i` yields the global id of the aggregate owning
//! vertex `i`, and writing (global, i) resolves the global id back to a
//! local one through the index-set lookup. The adapter carries a fixed
//! per-element payload size of one, which generic communication code
//! uses to size its buffers.

use crate::error::IdexError;
use crate::index::{Attribute, GlobalIndex, GlobalLookup};

/// Vertex → local aggregate id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregatesMap {
    map: Vec<usize>,
}

impl AggregatesMap {
    pub fn new(map: Vec<usize>) -> Self {
        AggregatesMap { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn aggregate_of(&self, vertex: usize) -> Option<usize> {
        self.map.get(vertex).copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.map
    }
}

/// Number of indexed values each vertex contributes on the wire.
pub const ELEMENT_SIZE: usize = 1;

/// The aggregates map read and written through global ids.
pub struct GlobalAggregates<'a, G, A> {
    aggregates: &'a mut AggregatesMap,
    lookup: GlobalLookup<'a, G, A>,
}

impl<'a, G: GlobalIndex, A: Attribute> GlobalAggregates<'a, G, A> {
    pub fn new(aggregates: &'a mut AggregatesMap, lookup: GlobalLookup<'a, G, A>) -> Self {
        GlobalAggregates { aggregates, lookup }
    }

    /// Global id of the aggregate owning `vertex`.
    pub fn global_of(&self, vertex: usize) -> Result<G, IdexError> {
        let aggregate = self
            .aggregates
            .aggregate_of(vertex)
            .ok_or(IdexError::NoSuchGlobalIndex)?;
        let pair = self
            .lookup
            .pair_of_local(aggregate)
            .ok_or(IdexError::NoSuchGlobalIndex)?;
        Ok(pair.global())
    }

    /// Store the aggregate known as `global` for `vertex`.
    pub fn put(&mut self, global: G, vertex: usize) -> Result<(), IdexError> {
        let local = self
            .lookup
            .local_of(&global)
            .ok_or(IdexError::NoSuchGlobalIndex)?
            .local();
        *self
            .aggregates
            .map
            .get_mut(vertex)
            .ok_or(IdexError::NoSuchGlobalIndex)? = local;
        Ok(())
    }
}

/// Gather/scatter pair consumed by the generic communication framework.
pub fn gather<G: GlobalIndex, A: Attribute>(
    aggregates: &GlobalAggregates<'_, G, A>,
    vertex: usize,
) -> Result<G, IdexError> {
    aggregates.global_of(vertex)
}

pub fn scatter<G: GlobalIndex, A: Attribute>(
    aggregates: &mut GlobalAggregates<'_, G, A>,
    global: G,
    vertex: usize,
) -> Result<(), IdexError> {
    aggregates.put(global, vertex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ParallelIndexSet, ParallelLocalIndex};
    use serde::{Deserialize, Serialize};

    #[derive(
        Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize,
    )]
    enum Flag {
        #[default]
        Owner,
    }

    fn lookup_set() -> ParallelIndexSet<u32, Flag> {
        // Aggregates 0..3 carry globals 10, 20, 30.
        let mut set = ParallelIndexSet::new();
        set.begin_resize().unwrap();
        for (local, g) in [10u32, 20, 30].iter().enumerate() {
            set.add(*g, ParallelLocalIndex::new(local, Flag::Owner, true))
                .unwrap();
        }
        set.end_resize().unwrap();
        set
    }

    #[test]
    fn reads_resolve_to_globals() {
        let set = lookup_set();
        let lookup = GlobalLookup::new(&set).unwrap();
        let mut map = AggregatesMap::new(vec![2, 0, 1, 0]);
        let view = GlobalAggregates::new(&mut map, lookup);
        assert_eq!(view.global_of(0).unwrap(), 30);
        assert_eq!(view.global_of(1).unwrap(), 10);
        assert_eq!(gather(&view, 2).unwrap(), 20);
    }

    #[test]
    fn writes_resolve_to_locals() {
        let set = lookup_set();
        let lookup = GlobalLookup::new(&set).unwrap();
        let mut map = AggregatesMap::new(vec![0, 0]);
        let mut view = GlobalAggregates::new(&mut map, lookup);
        scatter(&mut view, 30, 1).unwrap();
        assert_eq!(map.aggregate_of(1), Some(2));
    }

    #[test]
    fn unknown_global_is_an_error() {
        let set = lookup_set();
        let lookup = GlobalLookup::new(&set).unwrap();
        let mut map = AggregatesMap::new(vec![0]);
        let mut view = GlobalAggregates::new(&mut map, lookup);
        let err = view.put(99, 0).unwrap_err();
        assert!(matches!(err, IdexError::NoSuchGlobalIndex));
    }

    #[test]
    fn payload_size_is_one() {
        assert_eq!(ELEMENT_SIZE, 1);
    }
}
