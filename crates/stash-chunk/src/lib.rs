//! Chunked container format for stash.
//!
//! A chunk file is a sequence of chunks, each an 8-byte [`ChunkHeader`]
//! followed by its payload. A chunk holds either raw data or further
//! chunks, never both. Data chunks may be structured as micro-chunks, each a
//! 2-byte [`MicroChunkHeader`] followed by up to 255 bytes.
//!
//! [`ChunkWriter`] writes headers with a placeholder size and patches them
//! once the chunk is closed, so the storage must be seekable.
//! [`ChunkReader`] walks the tree and refuses to read past the end of the
//! innermost open chunk.
//!
//! ```
//! use stash_chunk::{ChunkReader, ChunkWriter};
//! use stash_io::{MemoryStorage, SeekFrom, Storage};
//!
//! let mut writer = ChunkWriter::new(MemoryStorage::new());
//! writer.begin_chunk(0x4d415020)?;
//! writer.write_micro_str(1, "harbour")?;
//! writer.write_micro_value(2, 42u32)?;
//! writer.end_chunk()?;
//! let mut storage = writer.finish()?;
//! storage.seek(SeekFrom::Start(0))?;
//!
//! let mut reader = ChunkReader::new(storage);
//! assert!(reader.open_chunk()?);
//! assert_eq!(reader.chunk_id(), Some(0x4d415020));
//! assert!(reader.open_micro_chunk()?);
//! assert_eq!(reader.read_str()?, "harbour");
//! reader.close_micro_chunk()?;
//! assert!(reader.open_micro_chunk()?);
//! assert_eq!(reader.read_value::<u32>()?, 42);
//! # Ok::<(), stash_chunk::ChunkError>(())
//! ```

pub mod config;
pub mod error;
pub mod header;
pub mod reader;
pub mod value;
pub mod writer;

pub use config::ChunkConfig;
pub use error::{ChunkError, ChunkResult};
pub use header::{ChunkHeader, MicroChunkHeader};
pub use reader::ChunkReader;
pub use value::LeValue;
pub use writer::ChunkWriter;
