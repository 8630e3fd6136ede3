//! Knowledge about indices replicated on remote processes.
//!
//! The registry ([`RemoteIndices`]) maps each peer rank to the lists of
//! indices shared with it, either discovered through the ring exchange
//! protocol or injected through the modifiers.

/// Which of a peer's two descriptor lists an operation addresses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

pub mod collective;
pub mod index;
pub mod modifier;
pub mod registry;
pub(crate) mod wire;

pub use collective::CollectiveIterator;
pub use index::{PeerLists, RemoteIndex, RemoteIndexList};
pub use modifier::{MutableModifier, StableModifier};
pub use registry::{RemoteIndices, SharedIndexSet};
