//! Journal errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid journal line in {file}:{line}: {reason}")]
    InvalidLine {
        file: String,
        line: usize,
        reason: String,
    },
}
