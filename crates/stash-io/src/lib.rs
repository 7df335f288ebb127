//! Storage collaborator for stash.
//!
//! Every stash component that touches persistent bytes goes through the
//! narrow [`Storage`] interface: sequential read, sequential write and
//! absolute seek over a finite byte extent. Anything implementing
//! `std::io::{Read, Write, Seek}` is a `Storage`, so files and
//! `std::io::Cursor` plug in directly.
//!
//! # Key Types
//!
//! - [`Storage`]: the collaborator trait consumed by filters and chunk I/O
//! - [`MemoryStorage`]: in-memory extent with optional write-failure injection
//! - [`StorageError`]: I/O failures surfaced to callers, never retried

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use traits::Storage;

pub use std::io::SeekFrom;
