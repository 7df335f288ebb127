use std::io;

/// Errors produced by the storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backend accepted zero bytes while data remained to be written.
    #[error("storage refused write with {remaining} bytes remaining")]
    WriteZero { remaining: usize },
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
