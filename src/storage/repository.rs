//! Core Git repository wrapper.
//!
//! This is the central component of the storage layer. It wraps `git2::Repository`
//! with thread-safe access and provides the operations the rest of the
//! crate uses.
//!
//! All other storage modules use this for Git access.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::Repository;
use parking_lot::Mutex;

use crate::storage::blob;
use crate::storage::commit::{self, CommitInfo};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::refs::{BranchInfo, RefCache, RefManager, TagInfo};
use crate::storage::store::ObjectStore;
use crate::storage::tree;
use crate::storage::types::{
    BlobId, BranchName, Change, CommitId, GitSignature, TagName, TreeEntry, TreeId,
};

/// The main Git repository wrapper.
///
/// This provides thread-safe access to all Git operations.
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone)]
pub struct GitRepository {
    inner: Arc<GitRepositoryInner>,
}

struct GitRepositoryInner {
    // git2::Repository is Send but not Sync, so readers serialize too
    repo: Mutex<Repository>,
    path: PathBuf,
    name: String,
    refs: RefCache,
    signature: GitSignature,
}

impl GitRepository {
    /// Open an existing repository (bare or with a work tree).
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|_| StorageError::NotInitialized(path.to_path_buf()))?;
        let name = repository_name(&repo);

        Ok(Self {
            inner: Arc::new(GitRepositoryInner {
                repo: Mutex::new(repo),
                path: path.to_path_buf(),
                name,
                refs: RefCache::new(),
                signature: GitSignature::gitsnap(),
            }),
        })
    }

    /// Get the repository path, as it was opened.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Repository name: the work tree's directory name, or the bare
    /// directory's name without its `.git` suffix.
    pub fn name(&self) -> String {
        self.inner.name.clone()
    }

    /// Execute a function with access to the repository.
    pub fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    // ==================== Refs ====================

    /// Get the current HEAD commit.
    pub fn head(&self) -> StorageResult<CommitId> {
        self.with_repo(RefManager::head_commit)
    }

    /// The branch HEAD points at, `None` when unborn or detached.
    pub fn head_branch(&self) -> StorageResult<Option<String>> {
        self.with_repo(|repo| Ok(RefManager::head_branch(repo)))
    }

    /// Get the commit ID for a branch.
    pub fn resolve_branch(&self, branch: &BranchName) -> StorageResult<CommitId> {
        self.with_repo(|repo| RefManager::resolve_branch(repo, branch))
    }

    pub fn discover_default_branch(&self) -> StorageResult<Option<String>> {
        self.with_repo(RefManager::discover_default_branch)
    }

    /// List all branches.
    pub fn list_branches(&self) -> StorageResult<Vec<BranchInfo>> {
        self.with_repo(RefManager::list_branches)
    }

    /// List all tags.
    pub fn list_tags(&self) -> StorageResult<Vec<TagInfo>> {
        self.with_repo(RefManager::list_tags)
    }

    /// Every branch and tag by full ref name, served from the ref cache.
    pub fn ref_map(&self) -> StorageResult<BTreeMap<String, CommitId>> {
        self.inner
            .refs
            .get_or_load(|| self.with_repo(RefManager::ref_map))
    }

    /// Drop the memoized ref map.
    pub fn invalidate_refs(&self) {
        self.inner.refs.invalidate();
    }

    /// Create a new branch at the given commit.
    pub fn create_branch(&self, branch: &BranchName, at: CommitId) -> StorageResult<()> {
        let result = self.with_repo(|repo| RefManager::create_branch(repo, branch, at));
        self.invalidate_refs();
        result
    }

    /// Delete a branch.
    pub fn delete_branch(&self, branch: &BranchName) -> StorageResult<()> {
        let result = self.with_repo(|repo| RefManager::delete_branch(repo, branch));
        self.invalidate_refs();
        result
    }

    /// Create a tag; annotated when `message` is given.
    pub fn create_tag(&self, tag: &TagName, at: CommitId, message: Option<&str>) -> StorageResult<()> {
        let result = self.with_repo(|repo| {
            RefManager::create_tag(repo, tag, at, message, &self.inner.signature)
        });
        self.invalidate_refs();
        result
    }

    /// Delete a tag.
    pub fn delete_tag(&self, tag: &TagName) -> StorageResult<()> {
        let result = self.with_repo(|repo| RefManager::delete_tag(repo, tag));
        self.invalidate_refs();
        result
    }

    // ==================== Commits ====================

    /// Check if the repository has no commits at all.
    pub fn is_empty(&self) -> StorageResult<bool> {
        self.with_repo(|repo| Ok(repo.is_empty()?))
    }

    /// Number of commits reachable from `start`.
    pub fn count_commits(&self, start: CommitId) -> StorageResult<usize> {
        self.with_repo(|repo| commit::count_commits(repo, start))
    }

    /// Commits reachable from `to` but not `from`, oldest first.
    pub fn commits_between(&self, from: CommitId, to: CommitId) -> StorageResult<Vec<CommitInfo>> {
        self.with_repo(|repo| commit::commits_between(repo, from, to))
    }

    /// Get the merge base between two commits.
    pub fn merge_base(&self, a: CommitId, b: CommitId) -> StorageResult<Option<CommitId>> {
        self.with_repo(|repo| commit::find_merge_base(repo, a, b))
    }

    /// Get diff between two commits.
    pub fn diff_commits(&self, old: CommitId, new: CommitId) -> StorageResult<Vec<Change>> {
        self.with_repo(|repo| commit::diff_commits(repo, old, new))
    }
}

/// Name a repository after where it actually lives, not how it was opened.
///
/// `.`, `..`, `work/.git` and `project.git` all resolve to a real directory
/// name first.
fn repository_name(repo: &Repository) -> String {
    let location = repo.workdir().unwrap_or_else(|| repo.path());
    let location = location
        .canonicalize()
        .unwrap_or_else(|_| location.to_path_buf());

    let components = location
        .iter()
        .rev()
        .map(|c| c.to_string_lossy().into_owned())
        .filter(|c| !c.is_empty() && c != "/");

    for component in components {
        match component.strip_suffix(".git") {
            // a bare `.git` directory: its parent names the project
            Some("") => continue,
            Some(stripped) => return stripped.to_string(),
            None => return component,
        }
    }
    "repository".to_string()
}

impl ObjectStore for GitRepository {
    fn resolve(&self, ref_or_sha: &str) -> StorageResult<CommitId> {
        self.with_repo(|repo| RefManager::resolve(repo, ref_or_sha))
    }

    fn commit(&self, id: CommitId) -> StorageResult<CommitInfo> {
        self.with_repo(|repo| commit::get_commit(repo, id))
    }

    fn tree_entries(&self, id: TreeId) -> StorageResult<Vec<TreeEntry>> {
        self.with_repo(|repo| tree::read_entries(repo, id))
    }

    fn blob_bytes(&self, id: BlobId) -> StorageResult<Vec<u8>> {
        self.with_repo(|repo| blob::read_blob(repo, id))
    }

    fn diff(&self, old: Option<TreeId>, new: TreeId, detect_renames: bool) -> StorageResult<Vec<Change>> {
        self.with_repo(|repo| commit::diff_trees(repo, old, new, detect_renames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::{FixtureFile, TestRepo};
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_repository() {
        let dir = TempDir::new().unwrap();
        let result = GitRepository::open(dir.path().join("nothing-here"));
        assert!(matches!(result, Err(StorageError::NotInitialized(_))));
    }

    #[test]
    fn test_name_strips_git_suffix() {
        let dir = TempDir::new().unwrap();
        let bare = dir.path().join("project.git");
        Repository::init_bare(&bare).unwrap();

        let repo = GitRepository::open(&bare).unwrap();
        assert_eq!(repo.name(), "project");

        let fixture = TestRepo::new();
        assert_eq!(fixture.storage().name(), "fixture");
    }

    #[test]
    fn test_name_ignores_how_the_path_was_spelled() {
        let dir = TempDir::new().unwrap();
        let work = dir.path().join("myproject");
        Repository::init(&work).unwrap();
        std::fs::create_dir(work.join("sub")).unwrap();

        let through_git_dir = GitRepository::open(work.join(".git")).unwrap();
        assert_eq!(through_git_dir.name(), "myproject");

        // no file name at all: `sub/..` is the work tree
        let through_parent = GitRepository::open(work.join("sub").join("..")).unwrap();
        assert_eq!(through_parent.name(), "myproject");

        let through_dot = GitRepository::open(work.join(".")).unwrap();
        assert_eq!(through_dot.name(), "myproject");
    }

    #[test]
    fn test_name_of_bare_git_dir() {
        let dir = TempDir::new().unwrap();
        let bare = dir.path().join("hosted").join(".git");
        Repository::init_bare(&bare).unwrap();

        let repo = GitRepository::open(&bare).unwrap();
        assert_eq!(repo.name(), "hosted");
    }

    #[test]
    fn test_object_store_round_trip() {
        let fixture = TestRepo::new();
        let c1 = fixture.commit(&[("docs/a.md", FixtureFile::text("alpha"))], &[], 1_000, "one");
        fixture.set_branch("master", c1);
        let store = fixture.storage();

        assert_eq!(store.resolve("master").unwrap(), c1);
        let info = store.commit(c1).unwrap();
        let entries = store.tree_entries(info.tree_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "docs/a.md");

        let bytes = store.blob_bytes(entries[0].blob_id().unwrap()).unwrap();
        assert_eq!(bytes, b"alpha");

        let changes = store.diff(None, info.tree_id, true).unwrap();
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_ref_mutations_invalidate_cache() {
        let fixture = TestRepo::new();
        let c1 = fixture.commit(&[("a", FixtureFile::text("1"))], &[], 1_000, "one");
        fixture.set_branch("master", c1);
        let repo = fixture.storage();

        let before = repo.ref_map().unwrap();
        assert_eq!(before.len(), 1);

        let branch = BranchName::new("feature").unwrap();
        repo.create_branch(&branch, c1).unwrap();
        assert!(repo.ref_map().unwrap().contains_key("refs/heads/feature"));

        let tag = TagName::new("v1.0").unwrap();
        repo.create_tag(&tag, c1, Some("first release")).unwrap();
        assert!(repo.ref_map().unwrap().contains_key("refs/tags/v1.0"));

        repo.delete_branch(&branch).unwrap();
        repo.delete_tag(&tag).unwrap();
        assert_eq!(repo.ref_map().unwrap(), before);
    }

    #[test]
    fn test_repository_is_shareable_across_threads() {
        let fixture = TestRepo::new();
        let c1 = fixture.commit(&[("a", FixtureFile::text("1"))], &[], 1_000, "one");
        fixture.set_branch("master", c1);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let repo = fixture.storage().clone();
                std::thread::spawn(move || repo.resolve("master").unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), c1);
        }
    }
}
