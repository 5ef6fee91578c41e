//! History walk error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for history walks.
pub type HistoryResult<T> = Result<T, HistoryError>;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("history walk cancelled")]
    Cancelled,
}

impl HistoryError {
    /// check if the start ref or a commit along the way is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, HistoryError::Storage(e) if e.is_not_found())
    }
}
