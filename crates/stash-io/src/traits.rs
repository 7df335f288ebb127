use std::io::{self, SeekFrom};

use crate::error::{StorageError, StorageResult};

/// Random-access byte storage.
///
/// Implementations must satisfy these invariants:
/// - `read` may return fewer bytes than requested and returns 0 at the end.
/// - `write` may accept fewer bytes than offered; callers that need the whole
///   buffer written use [`Storage::write_all`].
/// - `seek` positions are absolute byte offsets from the start of the extent.
/// - Failures are reported, never retried.
pub trait Storage {
    /// Read up to `buf.len()` bytes at the current position.
    fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize>;

    /// Write up to `data.len()` bytes at the current position.
    fn write(&mut self, data: &[u8]) -> StorageResult<usize>;

    /// Move the cursor and return the new absolute position.
    fn seek(&mut self, pos: SeekFrom) -> StorageResult<u64>;

    /// Push buffered writes to the backing store.
    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    /// Current absolute position.
    fn position(&mut self) -> StorageResult<u64> {
        self.seek(SeekFrom::Current(0))
    }

    /// Write the whole buffer or fail.
    fn write_all(&mut self, mut data: &[u8]) -> StorageResult<()> {
        while !data.is_empty() {
            let n = self.write(data)?;
            if n == 0 {
                return Err(StorageError::WriteZero {
                    remaining: data.len(),
                });
            }
            data = &data[n..];
        }
        Ok(())
    }

    /// Read until `buf` is full or the storage is exhausted.
    ///
    /// Returns the number of bytes read; less than `buf.len()` only at the end.
    fn read_full(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

impl<T: io::Read + io::Write + io::Seek> Storage for T {
    fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        loop {
            match io::Read::read(self, buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return Ok(other?),
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> StorageResult<usize> {
        loop {
            match io::Write::write(self, data) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return Ok(other?),
            }
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> StorageResult<u64> {
        Ok(io::Seek::seek(self, pos)?)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(io::Write::flush(self)?)
    }
}
