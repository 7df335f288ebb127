use crate::config::{FilterConfig, DEFAULT_CACHE_SIZE};
use crate::error::{FilterError, FilterResult};
use crate::pull::{PullFilter, Upstream};

/// Read-ahead cache for pull chains.
///
/// Serves cached bytes first; when the cache runs dry and the caller still
/// wants more, refills the whole cache with a single upstream call. The byte
/// stream is passed through unchanged.
#[derive(Debug)]
pub struct CacheFilter {
    cache: Box<[u8]>,
    start: usize,
    end: usize,
}

impl CacheFilter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_SIZE)
    }

    /// A cache of `capacity` bytes; at least one byte is always allocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: vec![0u8; capacity.max(1)].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    pub fn from_config(config: &FilterConfig) -> FilterResult<Self> {
        if config.cache_size == 0 {
            return Err(FilterError::InvalidConfig(
                "cache_size must be greater than zero".into(),
            ));
        }
        Ok(Self::with_capacity(config.cache_size))
    }

    pub fn capacity(&self) -> usize {
        self.cache.len()
    }

    /// Bytes currently cached and not yet served.
    pub fn cached(&self) -> usize {
        self.end - self.start
    }
}

impl Default for CacheFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl PullFilter for CacheFilter {
    fn get(&mut self, upstream: &mut Upstream<'_>, buf: &mut [u8]) -> FilterResult<usize> {
        let mut filled = 0;
        loop {
            let n = self.cached().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&self.cache[self.start..self.start + n]);
            self.start += n;
            filled += n;
            if filled == buf.len() {
                return Ok(filled);
            }

            let refill = upstream.get(&mut self.cache)?;
            self.start = 0;
            self.end = refill;
            if refill == 0 {
                return Ok(filled);
            }
        }
    }
}
