//! Process-local indices with attribute and public flag.

/// A dense process-local index. The attribute describes the role of the
/// index on this process (owner, overlap, copy, ...); the public flag
/// enables it for cross-process discovery.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParallelLocalIndex<A> {
    local: usize,
    attribute: A,
    public: bool,
}

impl<A: Copy> ParallelLocalIndex<A> {
    pub fn new(local: usize, attribute: A, public: bool) -> Self {
        ParallelLocalIndex {
            local,
            attribute,
            public,
        }
    }

    /// The dense local index number.
    pub fn local(&self) -> usize {
        self.local
    }

    pub fn attribute(&self) -> A {
        self.attribute
    }

    /// Whether this index takes part in cross-process discovery.
    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn set_attribute(&mut self, attribute: A) {
        self.attribute = attribute;
    }
}
