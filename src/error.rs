use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("base path is not set (use --base-path or DATA_FOLDERS_PATH)")]
    #[diagnostic(help("set DATA_FOLDERS_PATH to the directory that receives the mirrored files"))]
    MissingBasePath,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("unexpected catalog response: {0}")]
    CatalogShape(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to parse state file: {0}")]
    StateParse(String),

    #[error("catalog discovery stopped after {rounds} rounds with {found} of {target} datasets")]
    DiscoveryExhausted {
        found: usize,
        target: usize,
        rounds: u32,
    },
}

impl SyncError {
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SyncError::CatalogHttp(_) | SyncError::CatalogStatus { .. }
        )
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SyncError::MissingBasePath | SyncError::ConfigRead(_) | SyncError::ConfigParse(_)
        )
    }
}
