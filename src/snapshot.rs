//! Tree snapshots: a ref resolved all the way down to its file list.

use crate::storage::{CommitInfo, ObjectStore, StorageResult, TreeEntry, TreeId};

/// The flattened tree of one commit.
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    pub commit: CommitInfo,
    /// file, symlink and submodule entries in the tree's natural order
    pub entries: Vec<TreeEntry>,
}

impl TreeSnapshot {
    pub fn tree_id(&self) -> TreeId {
        self.commit.tree_id
    }

    /// entries whose content lives in this repository
    pub fn files(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter().filter(|e| !e.is_submodule())
    }

    pub fn submodules(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter().filter(|e| e.is_submodule())
    }
}

/// Resolve `ref_or_sha` to a commit and read that commit's tree.
///
/// Fails with a not-found error when the ref doesn't resolve or the tree is
/// missing from the object store.
pub fn snapshot<S>(store: &S, ref_or_sha: &str) -> StorageResult<TreeSnapshot>
where
    S: ObjectStore + ?Sized,
{
    let id = store.resolve(ref_or_sha)?;
    let commit = store.commit(id)?;
    snapshot_commit(store, commit)
}

/// Read the tree of an already loaded commit.
pub fn snapshot_commit<S>(store: &S, commit: CommitInfo) -> StorageResult<TreeSnapshot>
where
    S: ObjectStore + ?Sized,
{
    let entries = store.tree_entries(commit.tree_id)?;
    tracing::debug!(
        commit = %commit.id,
        entries = entries.len(),
        "read tree snapshot"
    );
    Ok(TreeSnapshot { commit, entries })
}
