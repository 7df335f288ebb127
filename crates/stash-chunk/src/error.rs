use stash_io::StorageError;
use thiserror::Error;

/// Errors produced while writing or reading chunk files.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("no chunk is open")]
    NoOpenChunk,

    #[error("no micro-chunk is open")]
    NoOpenMicroChunk,

    #[error("a micro-chunk is still open")]
    MicroChunkOpen,

    #[error("chunk nesting exceeds the maximum depth of {max_depth}")]
    NestingTooDeep { max_depth: usize },

    /// Data and nested chunks were mixed in one chunk.
    #[error("chunk {id:#010x} cannot hold both data and nested chunks")]
    MixedContent { id: u32 },

    #[error("chunk {id:#010x} payload of {len} bytes exceeds the 2^31-1 limit")]
    ChunkTooLarge { id: u32, len: u64 },

    #[error("micro-chunk {id} payload of {len} bytes exceeds the 255 byte limit")]
    MicroChunkOverflow { id: u8, len: usize },

    /// A read or seek reached past the end of the innermost open chunk.
    #[error("request for {requested} bytes but only {available} remain in the open chunk")]
    OutOfBounds { requested: u64, available: u64 },

    #[error("unexpected end of storage: expected {expected} bytes, got {actual}")]
    UnexpectedEof { expected: usize, actual: usize },

    /// A header announced more bytes than its parent has left.
    #[error("chunk {id:#010x} of {len} bytes overruns its parent ({available} bytes left)")]
    ChunkOverrun { id: u32, len: u64, available: u64 },

    #[error("{depth} chunks still open")]
    ChunksStillOpen { depth: usize },

    #[error("micro-chunk string is not valid UTF-8: {0}")]
    InvalidString(#[from] std::string::FromUtf8Error),

    #[error("invalid chunk configuration: {0}")]
    InvalidConfig(String),
}

pub type ChunkResult<T> = Result<T, ChunkError>;
