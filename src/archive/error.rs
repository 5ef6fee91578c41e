//! Archive error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors that can occur while building or compressing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Storage layer error (unknown ref, missing blob, malformed tree).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Filesystem or pipe failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container could not be written.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The external compressor exited unsuccessfully.
    #[error("compressor `{program}` failed ({status}): {stderr}")]
    CompressorFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// No compressor command configured for a tar format.
    #[error("empty compressor command for {0}")]
    EmptyCompressor(String),

    /// Requested format string isn't one we know.
    #[error("unknown archive format: {0}")]
    UnknownFormat(String),

    /// The archive target has no parent directory.
    #[error("invalid archive path: {0}")]
    InvalidPath(PathBuf),

    /// The job was cancelled before it completed.
    #[error("archive cancelled")]
    Cancelled,
}

impl ArchiveError {
    /// check if this error means the requested ref or an object is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::Storage(e) if e.is_not_found())
    }

    /// check if a tree entry could not be turned into an archive record
    pub fn is_malformed(&self) -> bool {
        matches!(self, ArchiveError::Storage(e) if e.is_malformed())
    }

    /// check if this error came from the filesystem or the compressor process
    pub fn is_io(&self) -> bool {
        match self {
            ArchiveError::Io(_) | ArchiveError::CompressorFailed { .. } => true,
            ArchiveError::Storage(e) => e.is_io(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let missing = ArchiveError::from(StorageError::RefNotFound("v9".to_string()));
        assert!(missing.is_not_found());
        assert!(!missing.is_io());

        let failed = ArchiveError::CompressorFailed {
            program: "gzip".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "gzip: stdout: No space left on device".to_string(),
        };
        assert!(failed.is_io());
        assert!(!failed.is_not_found());
        assert!(failed.to_string().contains("No space left"));
    }
}
