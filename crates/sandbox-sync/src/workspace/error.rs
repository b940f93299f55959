use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Workspace not found: {0}")]
    NotFound(String),

    #[error("Failed to read workspace descriptor '{path}': {source}")]
    ReadDescriptor {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write workspace descriptor '{path}': {source}")]
    WriteDescriptor {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid workspace descriptor '{path}': {source}")]
    ParseDescriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid workspace origin: {0}")]
    InvalidOrigin(String),

    #[error("Failed to list workspace files: {0}")]
    ListFiles(#[from] walkdir::Error),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;
