//! Error types for archive operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImgError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid archive format: {0}")]
    Format(String),

    #[error("archive not found: {0:?}")]
    NotFound(PathBuf),

    #[error("entry not available: {0}")]
    Unavailable(String),

    #[error("archive rebuild failed: {0}")]
    Rebuild(String),

    #[error("archive is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ImgError>;
