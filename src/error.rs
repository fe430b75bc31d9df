use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolioError {
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Catalog parse error: {0}")]
    Catalog(#[from] serde_json::Error),
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}
