use stash_io::{SeekFrom, Storage};
use tracing::debug;

use crate::config::ChunkConfig;
use crate::error::{ChunkError, ChunkResult};
use crate::header::{ChunkHeader, MicroChunkHeader, MAX_CHUNK_LEN, MAX_MICRO_CHUNK_LEN};
use crate::value::LeValue;

#[derive(Debug)]
struct OpenChunk {
    start: u64,
    header: ChunkHeader,
}

#[derive(Debug)]
struct OpenMicroChunk {
    start: u64,
    id: u8,
    len: usize,
}

/// Writes a chunk tree to seekable storage.
///
/// Every header is first written with a zero size and patched when the
/// chunk (or micro-chunk) is closed.
#[derive(Debug)]
pub struct ChunkWriter<S> {
    storage: S,
    stack: Vec<OpenChunk>,
    micro: Option<OpenMicroChunk>,
    max_depth: usize,
}

impl<S: Storage> ChunkWriter<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            stack: Vec::new(),
            micro: None,
            max_depth: ChunkConfig::default().max_depth,
        }
    }

    /// Build with explicit limits, rejecting a configuration that fails
    /// [`ChunkConfig::validate`].
    pub fn with_config(storage: S, config: &ChunkConfig) -> ChunkResult<Self> {
        config.validate()?;
        Ok(Self {
            max_depth: config.max_depth,
            ..Self::new(storage)
        })
    }

    /// Number of open chunks.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Open a chunk inside the current one (or at top level).
    pub fn begin_chunk(&mut self, id: u32) -> ChunkResult<()> {
        if self.stack.len() >= self.max_depth {
            return Err(ChunkError::NestingTooDeep {
                max_depth: self.max_depth,
            });
        }
        if self.micro.is_some() {
            return Err(ChunkError::MicroChunkOpen);
        }
        if let Some(parent) = self.stack.last_mut() {
            if parent.header.len > 0 && !parent.header.contains_chunks {
                return Err(ChunkError::MixedContent {
                    id: parent.header.id,
                });
            }
            parent.header.contains_chunks = true;
        }

        let start = self.storage.position()?;
        let header = ChunkHeader::new(id);
        self.storage.write_all(&header.to_bytes())?;
        self.stack.push(OpenChunk { start, header });
        debug!(id, start, depth = self.stack.len(), "chunk begin");
        Ok(())
    }

    /// Append raw bytes to the current data chunk (and open micro-chunk).
    pub fn write(&mut self, data: &[u8]) -> ChunkResult<()> {
        let chunk = self.stack.last().ok_or(ChunkError::NoOpenChunk)?;
        if chunk.header.contains_chunks {
            return Err(ChunkError::MixedContent {
                id: chunk.header.id,
            });
        }
        let chunk_len = u64::from(chunk.header.len) + data.len() as u64;
        if chunk_len > u64::from(MAX_CHUNK_LEN) {
            return Err(ChunkError::ChunkTooLarge {
                id: chunk.header.id,
                len: chunk_len,
            });
        }
        if let Some(micro) = &self.micro {
            let micro_len = micro.len + data.len();
            if micro_len > MAX_MICRO_CHUNK_LEN {
                return Err(ChunkError::MicroChunkOverflow {
                    id: micro.id,
                    len: micro_len,
                });
            }
        }

        self.storage.write_all(data)?;
        if let Some(chunk) = self.stack.last_mut() {
            chunk.header.len = chunk_len as u32;
        }
        if let Some(micro) = &mut self.micro {
            micro.len += data.len();
        }
        Ok(())
    }

    /// Append one little-endian value.
    pub fn write_value<T: LeValue>(&mut self, value: T) -> ChunkResult<()> {
        let mut buf = [0u8; 8];
        value.encode(&mut buf);
        self.write(&buf[..T::SIZE])
    }

    /// Close the current chunk, patching its header and charging its full
    /// size to the parent.
    pub fn end_chunk(&mut self) -> ChunkResult<()> {
        if self.micro.is_some() {
            return Err(ChunkError::MicroChunkOpen);
        }
        let chunk = self.stack.pop().ok_or(ChunkError::NoOpenChunk)?;

        self.storage.seek(SeekFrom::Start(chunk.start))?;
        self.storage.write_all(&chunk.header.to_bytes())?;
        self.storage.seek(SeekFrom::End(0))?;

        if let Some(parent) = self.stack.last_mut() {
            let len = u64::from(parent.header.len) + chunk.header.total_len();
            if len > u64::from(MAX_CHUNK_LEN) {
                return Err(ChunkError::ChunkTooLarge {
                    id: parent.header.id,
                    len,
                });
            }
            parent.header.len = len as u32;
        }
        debug!(
            id = chunk.header.id,
            len = chunk.header.len,
            contains_chunks = chunk.header.contains_chunks,
            depth = self.stack.len(),
            "chunk end"
        );
        Ok(())
    }

    /// Open a micro-chunk inside the current data chunk.
    pub fn begin_micro_chunk(&mut self, id: u8) -> ChunkResult<()> {
        if self.micro.is_some() {
            return Err(ChunkError::MicroChunkOpen);
        }
        let start = self.storage.position()?;
        // The header counts toward the enclosing chunk's size.
        self.write(&MicroChunkHeader { id, len: 0 }.to_bytes())?;
        self.micro = Some(OpenMicroChunk { start, id, len: 0 });
        Ok(())
    }

    /// Close the open micro-chunk, patching its header.
    pub fn end_micro_chunk(&mut self) -> ChunkResult<()> {
        let micro = self.micro.take().ok_or(ChunkError::NoOpenMicroChunk)?;
        let header = MicroChunkHeader {
            id: micro.id,
            len: micro.len as u8,
        };
        self.storage.seek(SeekFrom::Start(micro.start))?;
        self.storage.write_all(&header.to_bytes())?;
        self.storage.seek(SeekFrom::End(0))?;
        Ok(())
    }

    /// Write a complete micro-chunk.
    pub fn write_micro_chunk(&mut self, id: u8, data: &[u8]) -> ChunkResult<()> {
        self.begin_micro_chunk(id)?;
        self.write(data)?;
        self.end_micro_chunk()
    }

    pub fn write_micro_value<T: LeValue>(&mut self, id: u8, value: T) -> ChunkResult<()> {
        self.begin_micro_chunk(id)?;
        self.write_value(value)?;
        self.end_micro_chunk()
    }

    /// Write `s` as a NUL-terminated micro-chunk.
    pub fn write_micro_str(&mut self, id: u8, s: &str) -> ChunkResult<()> {
        let len = s.len() + 1;
        if len > MAX_MICRO_CHUNK_LEN {
            return Err(ChunkError::MicroChunkOverflow { id, len });
        }
        self.begin_micro_chunk(id)?;
        self.write(s.as_bytes())?;
        self.write(&[0])?;
        self.end_micro_chunk()
    }

    pub fn get_ref(&self) -> &S {
        &self.storage
    }

    /// Flush and return the storage; every chunk must be closed.
    pub fn finish(mut self) -> ChunkResult<S> {
        if !self.stack.is_empty() || self.micro.is_some() {
            return Err(ChunkError::ChunksStillOpen {
                depth: self.stack.len(),
            });
        }
        self.storage.flush()?;
        Ok(self.storage)
    }
}
