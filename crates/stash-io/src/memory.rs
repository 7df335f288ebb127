use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::debug;

/// In-memory byte extent.
///
/// Intended for tests and for building a stream in memory before handing it
/// to a file. Writes past the end grow the extent; seeking past the end and
/// writing zero-fills the gap. A write budget can be set to make the storage
/// fail once a number of bytes has been accepted, which lets callers exercise
/// their I/O failure paths.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    data: Vec<u8>,
    pos: usize,
    write_budget: Option<usize>,
}

impl MemoryStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage over existing bytes, positioned at the start.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            write_budget: None,
        }
    }

    /// Fail every write once `bytes` more bytes have been accepted.
    pub fn fail_writes_after(mut self, bytes: usize) -> Self {
        self.write_budget = Some(bytes);
        self
    }

    /// Contents of the extent.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the storage and return its contents.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Length of the extent in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the extent is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Read for MemoryStorage {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.pos.min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos = start + n;
        Ok(n)
    }
}

impl Write for MemoryStorage {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match self.write_budget {
            Some(0) if !buf.is_empty() => {
                debug!(pos = self.pos, len = buf.len(), "injected write failure");
                return Err(io::Error::other("memory storage write budget exhausted"));
            }
            Some(budget) => buf.len().min(budget),
            None => buf.len(),
        };
        if let Some(budget) = self.write_budget.as_mut() {
            *budget -= n;
        }

        let end = self.pos + n;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(&buf[..n]);
        self.pos = end;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryStorage {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset as i128),
            SeekFrom::Current(delta) => Some(self.pos as i128 + delta as i128),
            SeekFrom::End(delta) => Some(self.data.len() as i128 + delta as i128),
        };
        match target {
            Some(t) if t >= 0 && t <= usize::MAX as i128 => {
                self.pos = t as usize;
                Ok(self.pos as u64)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of memory storage",
            )),
        }
    }
}
