//! Error types for fb2scan operations.

use thiserror::Error;

/// Errors that can occur while scanning FictionBook documents.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The tokenizer could not produce any usable events for the document.
    #[error("FB2 verification failed: {0}")]
    Structure(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;
