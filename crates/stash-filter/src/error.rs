use stash_io::StorageError;
use stash_lzo::LzoError;

use crate::links::NodeId;

/// Errors produced by filter chains and filters.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// The handle does not name a live node of this chain.
    #[error("unknown filter node {0}")]
    UnknownNode(NodeId),

    /// The node was re-entered while already executing.
    #[error("filter node {0} re-entered while running")]
    Reentrant(NodeId),

    /// The requested link would break the chain's list shape.
    #[error("cannot link {from} to {to}: {reason}")]
    InvalidLink {
        from: NodeId,
        to: NodeId,
        reason: &'static str,
    },

    /// Storage failure from a storage-backed filter.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A compressed block failed to decode.
    #[error("lzo error: {0}")]
    Lzo(#[from] LzoError),

    /// A block frame ended early.
    #[error("truncated lzo block: expected {expected} bytes, got {actual}")]
    TruncatedBlock { expected: usize, actual: usize },

    /// A block header is not valid.
    #[error("malformed lzo block: {0}")]
    MalformedBlock(String),

    /// A block decoded to a different length than its header announced.
    #[error("lzo block length mismatch: header says {expected}, decoded {actual}")]
    BlockLengthMismatch { expected: usize, actual: usize },

    /// A decoder was used again after an earlier frame failed.
    #[error("lzo stream unusable after an earlier decode error")]
    StreamFailed,

    /// A compressed block does not fit the 16-bit length field.
    #[error("compressed block of {len} bytes does not fit a block header")]
    BlockTooLarge { len: usize },

    /// Configuration rejected by validation.
    #[error("invalid filter configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias used throughout the filter crate.
pub type FilterResult<T> = Result<T, FilterError>;
