use std::path::PathBuf;
use thiserror::Error;

/// Errors from reading and parsing USFM documents and stylesheets.
#[derive(Error, Debug)]
pub enum UsfmError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
