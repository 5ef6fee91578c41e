//! Storage layer error types
//!
//! All errors that can occur while talking to the object store are defined here.
//! We use `thiserror` for ergonomic error definition and better error messages

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::InvalidNameError;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// the specified ref (branch, tag, revision expression) was not found
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// the commit was not found
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// a tree or blob id does not resolve in the object database
    #[error("object not found: {kind} {id}")]
    ObjectNotFound { kind: &'static str, id: String },

    /// a tree entry or commit record is structurally inconsistent
    #[error("malformed object at {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// invalid branch or tag name
    #[error("invalid ref name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// repo could not be opened
    #[error("not a git repository: {0}")]
    NotInitialized(PathBuf),

    /// repo is empty (no commits)
    #[error("repository is empty: no commits found")]
    EmptyRepository,

    /// branch already exists
    #[error("branch already exists: {0}")]
    BranchAlreadyExists(String),

    /// tag already exists
    #[error("tag already exists: {0}")]
    TagAlreadyExists(String),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::RefNotFound(_)
                | StorageError::CommitNotFound(_)
                | StorageError::ObjectNotFound { .. }
                | StorageError::EmptyRepository
        )
    }

    /// check if this error reports a structurally broken object
    pub fn is_malformed(&self) -> bool {
        matches!(self, StorageError::Malformed { .. })
    }

    /// check if this error is a filesystem failure
    pub fn is_io(&self) -> bool {
        matches!(self, StorageError::Io(_))
    }

    pub(crate) fn object_not_found(kind: &'static str, id: impl ToString) -> Self {
        StorageError::ObjectNotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = StorageError::RefNotFound("feature".to_string());
        assert!(not_found.is_not_found());
        assert!(!not_found.is_malformed());

        let blob = StorageError::object_not_found("blob", "abc123");
        assert!(blob.is_not_found());
        assert_eq!(blob.to_string(), "object not found: blob abc123");

        let malformed = StorageError::Malformed {
            path: "docs/readme".into(),
            reason: "unknown file mode 0o170000".to_string(),
        };
        assert!(!malformed.is_not_found());
        assert!(malformed.is_malformed());
    }

    #[test]
    fn test_io_classification() {
        let io = StorageError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(io.is_io());
        assert!(!io.is_not_found());
    }
}
