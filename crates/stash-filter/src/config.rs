use serde::{Deserialize, Serialize};

use crate::error::{FilterError, FilterResult};

/// Default read-ahead cache size in bytes.
pub const DEFAULT_CACHE_SIZE: usize = 4096;
/// Default LZO block size in bytes.
pub const DEFAULT_LZO_BLOCK_SIZE: usize = 16 * 1024;
/// Largest block whose worst-case compressed size fits a 16-bit length.
pub const MAX_LZO_BLOCK_SIZE: usize = 56 * 1024;

/// Tunables for the concrete filters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Size of the read-ahead cache used by [`crate::CacheFilter`].
    pub cache_size: usize,
    /// Uncompressed bytes per LZO block.
    pub lzo_block_size: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            lzo_block_size: DEFAULT_LZO_BLOCK_SIZE,
        }
    }
}

impl FilterConfig {
    /// Reject sizes the filters cannot honour.
    pub fn validate(&self) -> FilterResult<()> {
        if self.cache_size == 0 {
            return Err(FilterError::InvalidConfig(
                "cache_size must be greater than zero".into(),
            ));
        }
        validate_block_size(self.lzo_block_size)
    }
}

pub(crate) fn validate_block_size(block_size: usize) -> FilterResult<()> {
    if block_size == 0 || block_size > MAX_LZO_BLOCK_SIZE {
        return Err(FilterError::InvalidConfig(format!(
            "lzo_block_size must be between 1 and {MAX_LZO_BLOCK_SIZE}, got {block_size}"
        )));
    }
    Ok(())
}
