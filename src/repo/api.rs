//! Repo API - high-level interface over one repository.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveFormat, Archiver};
use crate::cancel::CancellationToken;
use crate::history::{self, HistoryError, WalkOptions};
use crate::repo::config::RepoConfig;
use crate::snapshot::{self, TreeSnapshot};
use crate::storage::{
    BranchInfo, BranchName, Change, CommitId, CommitInfo, GitRepository, ObjectStore, StorageError,
    TagInfo, TagName,
};

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

/// Repository errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RepoError {
    /// check if a ref, commit or object was missing
    pub fn is_not_found(&self) -> bool {
        match self {
            RepoError::Storage(e) => e.is_not_found(),
            RepoError::Archive(e) => e.is_not_found(),
            RepoError::History(e) => e.is_not_found(),
            RepoError::InvalidConfig(_) => false,
        }
    }

    /// check if the operation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            RepoError::Archive(ArchiveError::Cancelled) | RepoError::History(HistoryError::Cancelled)
        )
    }
}

/// The main repository handle.
///
/// Cheap to clone; clones share the underlying git handle and the ref cache.
/// Cancellation is per call: pass a token to the `*_with` variants.
#[derive(Clone)]
pub struct Repo {
    config: RepoConfig,
    storage: GitRepository,
}

impl Repo {
    /// Open the repository named by `config`.
    pub fn open(config: RepoConfig) -> RepoResult<Self> {
        config.validate()?;
        let storage = GitRepository::open(&config.path)?;
        tracing::debug!(path = %config.path.display(), name = %storage.name(), "opened repository");

        Ok(Self {
            config,
            storage,
        })
    }

    /// Open a repository with the default configuration.
    pub fn open_path(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::open(RepoConfig::new(path.as_ref()))
    }

    /// Get the repository path.
    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    /// Repository basename without a `.git` suffix.
    pub fn name(&self) -> String {
        self.storage.name()
    }

    /// Get the configuration.
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// The object store behind this handle.
    pub fn storage(&self) -> &GitRepository {
        &self.storage
    }

    // ==================== Refs ====================

    /// Branch names, sorted.
    pub fn branch_names(&self) -> RepoResult<Vec<String>> {
        self.names_under(BranchName::PREFIX)
    }

    /// Tag names, sorted.
    pub fn tag_names(&self) -> RepoResult<Vec<String>> {
        self.names_under(TagName::PREFIX)
    }

    /// Branch names followed by tag names.
    pub fn ref_names(&self) -> RepoResult<Vec<String>> {
        let mut names = self.branch_names()?;
        names.extend(self.tag_names()?);
        Ok(names)
    }

    pub fn branch_count(&self) -> RepoResult<usize> {
        Ok(self.branch_names()?.len())
    }

    pub fn tag_count(&self) -> RepoResult<usize> {
        Ok(self.tag_names()?.len())
    }

    /// Branches with their target commits.
    pub fn branches(&self) -> RepoResult<Vec<BranchInfo>> {
        Ok(self.storage.list_branches()?)
    }

    /// Tags with their target commits and annotations.
    pub fn tags(&self) -> RepoResult<Vec<TagInfo>> {
        Ok(self.storage.list_tags()?)
    }

    fn names_under(&self, prefix: &str) -> RepoResult<Vec<String>> {
        Ok(self
            .storage
            .ref_map()?
            .into_keys()
            .filter_map(|name| name.strip_prefix(prefix).map(str::to_string))
            .collect())
    }

    /// HEAD's branch if it exists, else `master`, else the first branch.
    ///
    /// `None` when the repository has no branches.
    pub fn discover_default_branch(&self) -> RepoResult<Option<String>> {
        Ok(self.storage.discover_default_branch()?)
    }

    /// The ref clients land on; same as the default branch.
    pub fn root_ref(&self) -> RepoResult<Option<String>> {
        self.discover_default_branch()
    }

    pub fn is_empty(&self) -> RepoResult<bool> {
        Ok(self.storage.is_empty()?)
    }

    pub fn has_commits(&self) -> RepoResult<bool> {
        Ok(!self.is_empty()?)
    }

    /// Create a branch at `target` (any ref or sha).
    pub fn create_branch(&self, name: &str, target: &str) -> RepoResult<()> {
        let branch = BranchName::new(name).map_err(StorageError::from)?;
        let at = self.storage.resolve(target)?;
        self.storage.create_branch(&branch, at)?;
        tracing::info!(branch = name, target = %at, "created branch");
        Ok(())
    }

    pub fn delete_branch(&self, name: &str) -> RepoResult<()> {
        let branch = BranchName::new(name).map_err(StorageError::from)?;
        self.storage.delete_branch(&branch)?;
        tracing::info!(branch = name, "deleted branch");
        Ok(())
    }

    /// Create a tag at `target`; annotated when `message` is given.
    pub fn create_tag(&self, name: &str, target: &str, message: Option<&str>) -> RepoResult<()> {
        let tag = TagName::new(name).map_err(StorageError::from)?;
        let at = self.storage.resolve(target)?;
        self.storage.create_tag(&tag, at, message)?;
        tracing::info!(tag = name, target = %at, annotated = message.is_some(), "created tag");
        Ok(())
    }

    pub fn delete_tag(&self, name: &str) -> RepoResult<()> {
        let tag = TagName::new(name).map_err(StorageError::from)?;
        self.storage.delete_tag(&tag)?;
        tracing::info!(tag = name, "deleted tag");
        Ok(())
    }

    // ==================== Commits ====================

    /// Resolve a ref, sha or revision expression.
    pub fn resolve(&self, ref_or_sha: &str) -> RepoResult<CommitId> {
        Ok(self.storage.resolve(ref_or_sha)?)
    }

    /// Look up the commit a ref or sha names.
    pub fn commit(&self, ref_or_sha: &str) -> RepoResult<CommitInfo> {
        let id = self.resolve(ref_or_sha)?;
        Ok(self.storage.commit(id)?)
    }

    /// Commits reachable from `reference`, itself included.
    pub fn commit_count(&self, reference: &str) -> RepoResult<usize> {
        let id = self.resolve(reference)?;
        Ok(self.storage.count_commits(id)?)
    }

    /// Commits in `to` but not in `from`, oldest first.
    pub fn commits_between(&self, from: &str, to: &str) -> RepoResult<Vec<CommitInfo>> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        Ok(self.storage.commits_between(from, to)?)
    }

    pub fn merge_base(&self, a: &str, b: &str) -> RepoResult<Option<CommitId>> {
        let a = self.resolve(a)?;
        let b = self.resolve(b)?;
        Ok(self.storage.merge_base(a, b)?)
    }

    /// File changes from `from` to `to`, renames detected.
    pub fn diff(&self, from: &str, to: &str) -> RepoResult<Vec<Change>> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        Ok(self.storage.diff_commits(from, to)?)
    }

    /// Filtered, windowed history.
    pub fn log(&self, options: &WalkOptions) -> RepoResult<Vec<CommitInfo>> {
        self.log_with(options, &CancellationToken::new())
    }

    /// Like [`Repo::log`], stopping with `Cancelled` once `cancel` fires.
    pub fn log_with(&self, options: &WalkOptions, cancel: &CancellationToken) -> RepoResult<Vec<CommitInfo>> {
        let mut options = options.clone();
        if self.config.detect_renames {
            options.detect_renames = true;
        }
        Ok(history::walk(&self.storage, &options, cancel)?)
    }

    // ==================== Snapshots ====================

    /// The file list of a ref's tree.
    pub fn snapshot(&self, reference: &str) -> RepoResult<TreeSnapshot> {
        Ok(snapshot::snapshot(&self.storage, reference)?)
    }

    /// Where `archive` puts (or finds) the archive of `reference`.
    pub fn archive_path(&self, reference: &str, format: ArchiveFormat) -> RepoResult<PathBuf> {
        let commit = self.commit(reference)?;
        Ok(self.archiver(CancellationToken::new()).archive_path(&commit, format))
    }

    /// Export a ref as an archive under the storage path and return its path.
    ///
    /// Repeated requests for the same commit and format return the existing
    /// file.
    pub fn archive(&self, reference: &str, format: ArchiveFormat) -> RepoResult<PathBuf> {
        self.archive_with(reference, format, &CancellationToken::new())
    }

    /// Like [`Repo::archive`]; cancelling kills a running compressor and
    /// leaves no file behind.
    pub fn archive_with(
        &self,
        reference: &str,
        format: ArchiveFormat,
        cancel: &CancellationToken,
    ) -> RepoResult<PathBuf> {
        Ok(self.archiver(cancel.clone()).archive(reference, format)?)
    }

    fn archiver(&self, cancel: CancellationToken) -> Archiver<'_, GitRepository> {
        Archiver::new(&self.storage, self.name(), &self.config.storage_path)
            .compressors(&self.config.compressor_overrides)
            .cancel_token(cancel)
    }
}
