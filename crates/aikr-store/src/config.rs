//! TOML configuration loading. Every field is optional; missing ones take
//! the defaults from [`MemoryConfig::default`].

use std::fs;
use std::path::Path;

use aikr_core::MemoryConfig;

use crate::error::{Result, StoreError};

pub fn parse_config(text: &str) -> Result<MemoryConfig> {
    let config: MemoryConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<MemoryConfig> {
    let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&text)?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Load `path` if given, otherwise fall back to defaults.
pub fn load_config_or_default(path: Option<&Path>) -> Result<MemoryConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(MemoryConfig::default()),
    }
}
