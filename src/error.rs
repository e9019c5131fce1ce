//! Error types for the media sorter

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media sorter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media sorter
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("File hash computation failed for {path}: {message}")]
    HashComputation { path: PathBuf, message: String },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Copy of {from} to {to} does not match the source content")]
    CopyVerification { from: PathBuf, to: PathBuf },

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Pipeline is no longer accepting items")]
    PipelineClosed,
}

impl Error {
    /// Attach a path to a bare I/O error
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::PathIo {
            path: path.into(),
            source,
        }
    }
}
