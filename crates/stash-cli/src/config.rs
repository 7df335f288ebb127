use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use stash_chunk::ChunkConfig;
use stash_filter::FilterConfig;

/// Settings file read with `--config`.
///
/// ```toml
/// [filter]
/// cache_size = 8192
/// lzo_block_size = 32768
///
/// [chunk]
/// max_depth = 64
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StashConfig {
    pub filter: FilterConfig,
    pub chunk: ChunkConfig,
}

impl StashConfig {
    /// Load from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("in config {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.filter.validate()?;
        config.chunk.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(StashConfig::parse("").unwrap(), StashConfig::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = StashConfig::parse("[filter]\nlzo_block_size = 1024\n").unwrap();
        assert_eq!(config.filter.lzo_block_size, 1024);
        assert_eq!(config.filter.cache_size, 4096);
        assert_eq!(config.chunk.max_depth, 256);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(StashConfig::parse("[filter]\nlzo_block_size = 100000\n").is_err());
        assert!(StashConfig::parse("[chunk]\nmax_depth = 0\n").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stash.toml");
        std::fs::write(&path, "[chunk]\nmax_depth = 8\n").unwrap();
        assert_eq!(StashConfig::load(Some(&path)).unwrap().chunk.max_depth, 8);
        assert_eq!(StashConfig::load(None).unwrap(), StashConfig::default());
    }
}
