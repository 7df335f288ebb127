use serde::{Deserialize, Serialize};

use crate::error::{ChunkError, ChunkResult};

/// Default maximum chunk nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Limits applied by [`crate::ChunkWriter`] and [`crate::ChunkReader`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Deepest allowed chunk nesting.
    pub max_depth: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ChunkConfig {
    pub fn validate(&self) -> ChunkResult<()> {
        if self.max_depth == 0 {
            return Err(ChunkError::InvalidConfig(
                "max_depth must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
