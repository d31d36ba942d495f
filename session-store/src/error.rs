//! Session persistence error types.

use thiserror::Error;

/// Errors that can occur when loading or saving sessions.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
