use std::path::PathBuf;

use aikr_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    ConfigSyntax(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
