//! Blob access.
//!
//! Blobs are the file contents of a tree. The archive writer is the main
//! reader: every non-submodule entry of a snapshot is fetched through here.

use git2::Repository;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::BlobId;

/// read a blob's content from the repository
pub fn read_blob(repo: &Repository, blob_id: BlobId) -> StorageResult<Vec<u8>> {
    let blob = repo.find_blob(blob_id.raw()).map_err(|e| {
        if e.code() == git2::ErrorCode::NotFound {
            StorageError::object_not_found("blob", blob_id)
        } else {
            StorageError::Git(e)
        }
    })?;
    Ok(blob.content().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_blob() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let oid = repo.blob(b"hello archive").unwrap();

        let bytes = read_blob(&repo, BlobId::new(oid)).unwrap();
        assert_eq!(bytes, b"hello archive");
    }

    #[test]
    fn test_missing_blob_is_not_found() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let missing = git2::Oid::from_str("0123456789abcdef0123456789abcdef01234567").unwrap();

        let result = read_blob(&repo, BlobId::new(missing));
        assert!(matches!(result, Err(StorageError::ObjectNotFound { kind: "blob", .. })));
    }
}
