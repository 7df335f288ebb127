use stash_io::{SeekFrom, Storage};
use tracing::{debug, warn};

use crate::config::ChunkConfig;
use crate::error::{ChunkError, ChunkResult};
use crate::header::{ChunkHeader, MicroChunkHeader};
use crate::value::LeValue;

#[derive(Debug)]
struct ReadChunk {
    header: ChunkHeader,
    /// Payload bytes read or skipped so far.
    consumed: u64,
}

impl ReadChunk {
    fn remaining(&self) -> u64 {
        u64::from(self.header.len) - self.consumed
    }
}

#[derive(Debug)]
struct ReadMicroChunk {
    header: MicroChunkHeader,
    consumed: u64,
}

impl ReadMicroChunk {
    fn remaining(&self) -> u64 {
        u64::from(self.header.len) - self.consumed
    }
}

/// Walks a chunk tree, never reading past the end of the innermost open
/// chunk or micro-chunk.
#[derive(Debug)]
pub struct ChunkReader<S> {
    storage: S,
    stack: Vec<ReadChunk>,
    micro: Option<ReadMicroChunk>,
    max_depth: usize,
}

impl<S: Storage> ChunkReader<S> {
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

    /// Open the next chunk at the current level.
    ///
    /// Returns `Ok(false)` once the enclosing chunk is exhausted, or at a
    /// clean end of storage at top level.
    pub fn open_chunk(&mut self) -> ChunkResult<bool> {
        if self.micro.is_some() {
            return Err(ChunkError::MicroChunkOpen);
        }
        let available = match self.stack.last() {
            Some(parent) if parent.remaining() == 0 => return Ok(false),
            Some(parent) if !parent.header.contains_chunks => {
                return Err(ChunkError::MixedContent {
                    id: parent.header.id,
                });
            }
            Some(parent) => Some(parent.remaining()),
            None => None,
        };
        if self.stack.len() >= self.max_depth {
            return Err(ChunkError::NestingTooDeep {
                max_depth: self.max_depth,
            });
        }

        let mut raw = [0u8; ChunkHeader::LEN];
        let n = self.storage.read_full(&mut raw)?;
        if n == 0 && available.is_none() {
            return Ok(false);
        }
        if n < ChunkHeader::LEN {
            warn!(actual = n, depth = self.stack.len(), "truncated chunk header");
            return Err(ChunkError::UnexpectedEof {
                expected: ChunkHeader::LEN,
                actual: n,
            });
        }
        let header = ChunkHeader::from_bytes(raw);
        if let Some(available) = available {
            if header.total_len() > available {
                warn!(id = header.id, len = header.len, available, "chunk overruns its parent");
                return Err(ChunkError::ChunkOverrun {
                    id: header.id,
                    len: header.total_len(),
                    available,
                });
            }
        }

        self.stack.push(ReadChunk {
            header,
            consumed: 0,
        });
        debug!(
            id = header.id,
            len = header.len,
            contains_chunks = header.contains_chunks,
            depth = self.stack.len(),
            "chunk open"
        );
        Ok(true)
    }

    /// Close the current chunk, skipping whatever was not read.
    pub fn close_chunk(&mut self) -> ChunkResult<()> {
        let chunk = self.stack.pop().ok_or(ChunkError::NoOpenChunk)?;
        self.micro = None;
        let skip = chunk.remaining();
        if skip > 0 {
            self.storage.seek(SeekFrom::Current(skip as i64))?;
        }
        if let Some(parent) = self.stack.last_mut() {
            parent.consumed += chunk.header.total_len();
        }
        debug!(id = chunk.header.id, skipped = skip, depth = self.stack.len(), "chunk close");
        Ok(())
    }

    pub fn chunk_id(&self) -> Option<u32> {
        self.stack.last().map(|c| c.header.id)
    }

    /// Payload length of the current chunk.
    pub fn chunk_len(&self) -> Option<u32> {
        self.stack.last().map(|c| c.header.len)
    }

    pub fn contains_chunks(&self) -> bool {
        self.stack.last().is_some_and(|c| c.header.contains_chunks)
    }

    /// Number of open chunks.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Unread bytes of the innermost open chunk or micro-chunk.
    pub fn remaining(&self) -> u64 {
        match (&self.micro, self.stack.last()) {
            (Some(micro), _) => micro.remaining(),
            (None, Some(chunk)) => chunk.remaining(),
            (None, None) => 0,
        }
    }

    /// Open the next micro-chunk of the current data chunk.
    ///
    /// Returns `Ok(false)` once the chunk is exhausted.
    pub fn open_micro_chunk(&mut self) -> ChunkResult<bool> {
        if self.micro.is_some() {
            return Err(ChunkError::MicroChunkOpen);
        }
        let chunk = self.stack.last().ok_or(ChunkError::NoOpenChunk)?;
        if chunk.header.contains_chunks {
            return Err(ChunkError::MixedContent {
                id: chunk.header.id,
            });
        }
        if chunk.remaining() == 0 {
            return Ok(false);
        }

        let mut raw = [0u8; MicroChunkHeader::LEN];
        self.read(&mut raw)?;
        let header = MicroChunkHeader::from_bytes(raw);
        let available = self.remaining();
        if u64::from(header.len) > available {
            warn!(id = header.id, len = header.len, available, "micro-chunk overruns its chunk");
            return Err(ChunkError::OutOfBounds {
                requested: u64::from(header.len),
                available,
            });
        }
        self.micro = Some(ReadMicroChunk {
            header,
            consumed: 0,
        });
        Ok(true)
    }

    /// Close the open micro-chunk, skipping whatever was not read.
    pub fn close_micro_chunk(&mut self) -> ChunkResult<()> {
        let micro = self.micro.take().ok_or(ChunkError::NoOpenMicroChunk)?;
        let skip = micro.remaining();
        if skip > 0 {
            self.storage.seek(SeekFrom::Current(skip as i64))?;
            if let Some(chunk) = self.stack.last_mut() {
                chunk.consumed += skip;
            }
        }
        Ok(())
    }

    pub fn micro_chunk_id(&self) -> Option<u8> {
        self.micro.as_ref().map(|m| m.header.id)
    }

    pub fn micro_chunk_len(&self) -> Option<u8> {
        self.micro.as_ref().map(|m| m.header.len)
    }

    fn check_bounds(&self, requested: u64) -> ChunkResult<()> {
        let chunk = self.stack.last().ok_or(ChunkError::NoOpenChunk)?;
        // Raw bytes of a chunk of chunks are the children's headers.
        if chunk.header.contains_chunks && self.micro.is_none() {
            return Err(ChunkError::MixedContent {
                id: chunk.header.id,
            });
        }
        let available = self.remaining();
        if requested > available {
            return Err(ChunkError::OutOfBounds {
                requested,
                available,
            });
        }
        Ok(())
    }

    fn consume(&mut self, count: u64) {
        if let Some(micro) = &mut self.micro {
            micro.consumed += count;
        }
        if let Some(chunk) = self.stack.last_mut() {
            chunk.consumed += count;
        }
    }

    /// Fill `buf` from the current chunk.
    pub fn read(&mut self, buf: &mut [u8]) -> ChunkResult<()> {
        self.check_bounds(buf.len() as u64)?;
        let n = self.storage.read_full(buf)?;
        if n < buf.len() {
            warn!(expected = buf.len(), actual = n, "chunk payload truncated");
            return Err(ChunkError::UnexpectedEof {
                expected: buf.len(),
                actual: n,
            });
        }
        self.consume(n as u64);
        Ok(())
    }

    /// Skip `count` bytes of the current chunk.
    pub fn seek(&mut self, count: u64) -> ChunkResult<()> {
        self.check_bounds(count)?;
        // Bounded by the chunk length, which fits in 31 bits.
        self.storage.seek(SeekFrom::Current(count as i64))?;
        self.consume(count);
        Ok(())
    }

    pub fn read_value<T: LeValue>(&mut self) -> ChunkResult<T> {
        let mut buf = [0u8; 8];
        self.read(&mut buf[..T::SIZE])?;
        Ok(T::decode(&buf))
    }

    pub fn read_vec(&mut self, len: usize) -> ChunkResult<Vec<u8>> {
        self.check_bounds(len as u64)?;
        let mut buf = vec![0u8; len];
        self.read(&mut buf)?;
        Ok(buf)
    }

    /// Read the rest of the open micro-chunk as a NUL-terminated string.
    pub fn read_str(&mut self) -> ChunkResult<String> {
        if self.micro.is_none() {
            return Err(ChunkError::NoOpenMicroChunk);
        }
        let mut bytes = self.read_vec(self.remaining() as usize)?;
        if let Some(nul) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(nul);
        }
        Ok(String::from_utf8(bytes)?)
    }

    pub fn get_ref(&self) -> &S {
        &self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}
