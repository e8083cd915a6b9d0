//! Crate-wide error type.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StepwiseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{file}:{line}:{column}: parse error: {message}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("failed to emit code for {file}: {message}")]
    Emit { file: String, message: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store error at {}: {message}", path.display())]
    Store { path: PathBuf, message: String },
}

pub type StepwiseResult<T> = Result<T, StepwiseError>;
