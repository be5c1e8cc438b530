//! Error taxonomy for the tree instrumentor
//!
//! Every variant is recoverable at the level of a single file or resource:
//! the walk logs it and keeps going. Catalog presence on disk is not an
//! error and is reported through [`crate::catalog::CatalogPersistence`].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("failed to read source file {}: {source}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write source file {}: {source}", .path.display())]
    FileUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read directory {}: {source}", .path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timing collector boilerplate not found at {}: {source}", .path.display())]
    ResourceMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize function catalog: {0}")]
    CatalogSerializationFailed(#[from] serde_json::Error),

    #[error("failed to write function catalog {}: {source}", .path.display())]
    CatalogWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type InstrumentResult<T> = std::result::Result<T, InstrumentError>;
