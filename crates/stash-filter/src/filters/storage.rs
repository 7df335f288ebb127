use stash_io::Storage;
use tracing::warn;

use crate::error::FilterResult;
use crate::pull::{PullFilter, Upstream};
use crate::push::{Downstream, PushFilter};

/// Pull source reading from a [`Storage`].
///
/// Once a read returns 0 or fails, the source stays exhausted; the failing
/// read reports its error exactly once.
#[derive(Debug)]
pub struct StorageSource<S> {
    storage: S,
    exhausted: bool,
}

impl<S: Storage> StorageSource<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            exhausted: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn get_ref(&self) -> &S {
        &self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}

impl<S: Storage + 'static> PullFilter for StorageSource<S> {
    fn get(&mut self, _upstream: &mut Upstream<'_>, buf: &mut [u8]) -> FilterResult<usize> {
        if self.exhausted || buf.is_empty() {
            return Ok(0);
        }
        match self.storage.read(buf) {
            Ok(0) => {
                self.exhausted = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                warn!(error = %e, "storage read failed");
                self.exhausted = true;
                Err(e.into())
            }
        }
    }
}

/// Push sink writing every `put` to a [`Storage`].
#[derive(Debug)]
pub struct StorageSink<S> {
    storage: S,
    written: u64,
}

impl<S: Storage> StorageSink<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            written: 0,
        }
    }

    /// Total bytes written through this sink.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &S {
        &self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}

impl<S: Storage + 'static> PushFilter for StorageSink<S> {
    fn put(&mut self, _downstream: &mut Downstream<'_>, data: &[u8]) -> FilterResult<usize> {
        self.storage.write_all(data)?;
        self.written += data.len() as u64;
        Ok(data.len())
    }

    fn flush(&mut self, downstream: &mut Downstream<'_>) -> FilterResult<usize> {
        self.storage.flush()?;
        downstream.flush()
    }
}
