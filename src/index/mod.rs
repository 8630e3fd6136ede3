//! Per-process index sets mapping global to local identifiers.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Bound for global identifiers. Ordering is the only comparison
/// primitive the exchange relies on.
pub trait GlobalIndex:
    Copy + Ord + Debug + Default + Serialize + DeserializeOwned + 'static
{
}

impl<T> GlobalIndex for T where
    T: Copy + Ord + Debug + Default + Serialize + DeserializeOwned + 'static
{
}

/// Bound for per-index attributes (small user enumerations such as
/// owner/overlap/copy).
pub trait Attribute: Copy + Eq + Debug + Default + Serialize + DeserializeOwned + 'static {}

impl<T> Attribute for T where T: Copy + Eq + Debug + Default + Serialize + DeserializeOwned + 'static
{
}

pub mod index_set;
pub mod local;

pub use index_set::{GlobalLookup, IndexPair, IndexSetState, ParallelIndexSet};
pub use local::ParallelLocalIndex;
