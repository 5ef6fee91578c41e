//! The object store seam.
//!
//! Snapshot reading, archive writing and the history walker only need these
//! five questions answered. `GitRepository` answers them from libgit2; tests
//! can answer them from anything else.

use crate::storage::commit::CommitInfo;
use crate::storage::error::StorageResult;
use crate::storage::types::{BlobId, Change, CommitId, TreeEntry, TreeId};

/// Read-only access to a content-addressed object database.
pub trait ObjectStore {
    /// resolve a branch, tag, sha or revision expression to a commit
    fn resolve(&self, ref_or_sha: &str) -> StorageResult<CommitId>;

    /// load a commit record
    fn commit(&self, id: CommitId) -> StorageResult<CommitInfo>;

    /// flattened, path-ordered entries of a tree
    fn tree_entries(&self, id: TreeId) -> StorageResult<Vec<TreeEntry>>;

    /// raw content of a blob
    fn blob_bytes(&self, id: BlobId) -> StorageResult<Vec<u8>>;

    /// changes from `old` (the empty tree when `None`) to `new`
    fn diff(&self, old: Option<TreeId>, new: TreeId, detect_renames: bool) -> StorageResult<Vec<Change>>;
}
