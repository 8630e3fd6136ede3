use thiserror::Error;

// Unified error type for idex

#[derive(Error, Debug)]
pub enum IdexError {
    #[error("invalid position: modifications must advance with ascending global index")]
    InvalidPosition,
    #[error("duplicate remote index at current position")]
    DuplicateIndex,
    #[error("invalid index set state: {0}")]
    InvalidIndexSetState(String),
    #[error("no such global index in set")]
    NoSuchGlobalIndex,
    #[error("protocol error: {0}")]
    ProtocolError(String),
    #[error("transport error: {0}")]
    TransportError(String),
    #[error("codec error: {0}")]
    CodecError(#[from] bincode::Error),
    #[error("category mismatch: {0}")]
    CategoryMismatch(String),
    #[error("solve error: {0}")]
    SolveError(String),
}
