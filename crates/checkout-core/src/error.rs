//! Error Types

use thiserror::Error;

/// Result type alias for domain and storage operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Domain and storage errors
#[derive(Error, Debug)]
pub enum CoreError {
    /// Backing store failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record failed a domain invariant
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unknown enum value in stored or seeded data
    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error (seed files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Storage(_) | CoreError::Io(_))
    }
}
