//! Application error taxonomy
//!
//! Errors surfaced at the action boundary. Background work (auto-save,
//! content protection, queue stalls) logs and continues instead of
//! returning these.

use std::fmt;

/// Error types for user-triggered operations
#[derive(Debug, Clone)]
pub enum AppError {
    /// Caller precondition violated (missing id, empty prompt, missing API key)
    Validation(String),
    /// The generation or document service returned a failure status or unexpected shape
    Api(String),
    /// Local store read/write failure
    Persistence(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "{}", msg),
            AppError::Api(msg) => write!(f, "API error: {}", msg),
            AppError::Persistence(msg) => write!(f, "Save failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Wrap a storage failure, preserving the error chain as text
    pub fn persistence(err: impl fmt::Display) -> Self {
        AppError::Persistence(err.to_string())
    }
}
