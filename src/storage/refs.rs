//! Branch, tag and reference management.
//!
//! Git refs are pointers to commits. This module handles:
//! - resolving branch names, tags, shas and revision expressions
//! - branch and tag enumeration, creation and deletion
//! - default branch discovery
//! - the ref cache, which must be invalidated on every ref mutation

use std::collections::BTreeMap;

use git2::{BranchType, ObjectType, Repository};
use parking_lot::RwLock;
use serde::Serialize;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BranchName, CommitId, GitSignature, TagName};

/// A branch and the commit it points to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchInfo {
    pub name: String,
    pub target: CommitId,
}

/// A tag, the commit it peels to, and its annotation if it has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagInfo {
    pub name: String,
    pub target: CommitId,
    pub message: Option<String>,
}

/// Manages Git references.
pub struct RefManager;

impl RefManager {
    /// The branch tried when HEAD doesn't name an existing branch.
    pub const FALLBACK_BRANCH: &'static str = "master";

    /// Resolve a branch, tag, sha or revision expression to a commit.
    pub fn resolve(repo: &Repository, ref_or_sha: &str) -> StorageResult<CommitId> {
        let object = repo
            .revparse_single(ref_or_sha)
            .map_err(|_| StorageError::RefNotFound(ref_or_sha.to_string()))?;

        let commit = object
            .peel_to_commit()
            .map_err(|_| StorageError::RefNotFound(ref_or_sha.to_string()))?;

        Ok(CommitId::new(commit.id()))
    }

    /// Resolve a branch name to its current commit ID.
    pub fn resolve_branch(repo: &Repository, branch: &BranchName) -> StorageResult<CommitId> {
        let reference = repo
            .find_reference(&branch.as_ref_path())
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        let commit = reference
            .peel_to_commit()
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        Ok(CommitId::new(commit.id()))
    }

    /// Get the current HEAD commit.
    pub fn head_commit(repo: &Repository) -> StorageResult<CommitId> {
        let head = repo.head().map_err(|e| match e.code() {
            git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound => StorageError::EmptyRepository,
            _ => StorageError::Git(e),
        })?;

        let commit = head.peel_to_commit()?;
        Ok(CommitId::new(commit.id()))
    }

    /// The branch HEAD points to, if it exists.
    ///
    /// An unborn or detached HEAD is not an error, just no answer.
    pub fn head_branch(repo: &Repository) -> Option<String> {
        let head = repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(str::to_string)
    }

    /// Pick the branch a client should see first.
    ///
    /// HEAD's branch wins; then `master`; then the first branch by name.
    pub fn discover_default_branch(repo: &Repository) -> StorageResult<Option<String>> {
        let branches = Self::list_branches(repo)?;
        if branches.is_empty() {
            return Ok(None);
        }

        if let Some(head) = Self::head_branch(repo) {
            if branches.iter().any(|b| b.name == head) {
                return Ok(Some(head));
            }
        }

        if branches.iter().any(|b| b.name == Self::FALLBACK_BRANCH) {
            return Ok(Some(Self::FALLBACK_BRANCH.to_string()));
        }

        Ok(branches.into_iter().next().map(|b| b.name))
    }

    /// Check if a branch exists.
    pub fn branch_exists(repo: &Repository, branch: &BranchName) -> bool {
        repo.find_reference(&branch.as_ref_path()).is_ok()
    }

    /// Check if a tag exists.
    pub fn tag_exists(repo: &Repository, tag: &TagName) -> bool {
        repo.find_reference(&tag.as_ref_path()).is_ok()
    }

    /// Create a new branch pointing to the given commit.
    pub fn create_branch(repo: &Repository, branch: &BranchName, target: CommitId) -> StorageResult<()> {
        if Self::branch_exists(repo, branch) {
            return Err(StorageError::BranchAlreadyExists(branch.to_string()));
        }

        let commit = repo
            .find_commit(target.raw())
            .map_err(|_| StorageError::CommitNotFound(target.to_string()))?;
        repo.branch(branch.as_str(), &commit, false)?;

        Ok(())
    }

    /// Delete a branch.
    pub fn delete_branch(repo: &Repository, branch: &BranchName) -> StorageResult<()> {
        let mut git_branch = repo
            .find_branch(branch.as_str(), BranchType::Local)
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        git_branch.delete()?;

        Ok(())
    }

    /// Create a tag; annotated when a message is given, lightweight otherwise.
    pub fn create_tag(
        repo: &Repository,
        tag: &TagName,
        target: CommitId,
        message: Option<&str>,
        tagger: &GitSignature,
    ) -> StorageResult<()> {
        if Self::tag_exists(repo, tag) {
            return Err(StorageError::TagAlreadyExists(tag.to_string()));
        }

        let object = repo
            .find_object(target.raw(), Some(ObjectType::Commit))
            .map_err(|_| StorageError::CommitNotFound(target.to_string()))?;

        match message {
            Some(message) => {
                let sig = tagger.to_git2_signature()?;
                repo.tag(tag.as_str(), &object, &sig, message, false)?;
            }
            None => {
                repo.tag_lightweight(tag.as_str(), &object, false)?;
            }
        }

        Ok(())
    }

    /// Delete a tag.
    pub fn delete_tag(repo: &Repository, tag: &TagName) -> StorageResult<()> {
        if !Self::tag_exists(repo, tag) {
            return Err(StorageError::RefNotFound(tag.to_string()));
        }
        repo.tag_delete(tag.as_str())?;
        Ok(())
    }

    /// List all local branches, sorted by name.
    pub fn list_branches(repo: &Repository) -> StorageResult<Vec<BranchInfo>> {
        let mut result = Vec::new();
        for reference in repo.references_glob(&format!("{}*", BranchName::PREFIX))? {
            let reference = reference?;
            let name = match reference.name() {
                Some(name) => name.trim_start_matches(BranchName::PREFIX).to_string(),
                None => continue,
            };
            // branches pointing at non-commits are skipped, like `git branch` does
            if let Ok(commit) = reference.peel_to_commit() {
                result.push(BranchInfo {
                    name,
                    target: CommitId::new(commit.id()),
                });
            }
        }

        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    /// List all tags that peel to a commit, sorted by name.
    pub fn list_tags(repo: &Repository) -> StorageResult<Vec<TagInfo>> {
        let mut result = Vec::new();
        for reference in repo.references_glob(&format!("{}*", TagName::PREFIX))? {
            let reference = reference?;
            let name = match reference.name() {
                Some(name) => name.trim_start_matches(TagName::PREFIX).to_string(),
                None => continue,
            };
            let commit = match reference.peel_to_commit() {
                Ok(commit) => commit,
                Err(_) => continue,
            };
            let message = reference
                .peel_to_tag()
                .ok()
                .and_then(|tag| tag.message().map(|m| m.trim_end().to_string()));

            result.push(TagInfo {
                name,
                target: CommitId::new(commit.id()),
                message,
            });
        }

        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    /// Full ref name -> commit for every branch and tag.
    pub fn ref_map(repo: &Repository) -> StorageResult<BTreeMap<String, CommitId>> {
        let mut map = BTreeMap::new();
        for branch in Self::list_branches(repo)? {
            map.insert(format!("{}{}", BranchName::PREFIX, branch.name), branch.target);
        }
        for tag in Self::list_tags(repo)? {
            map.insert(format!("{}{}", TagName::PREFIX, tag.name), tag.target);
        }
        Ok(map)
    }
}

/// Memoized ref map.
///
/// Filled on first read; anything that creates, moves or deletes a ref must
/// call [`RefCache::invalidate`] afterwards.
#[derive(Debug, Default)]
pub struct RefCache {
    refs: RwLock<Option<BTreeMap<String, CommitId>>>,
}

impl RefCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// return the cached map, loading it with `load` if the cache is cold
    pub fn get_or_load<F>(&self, load: F) -> StorageResult<BTreeMap<String, CommitId>>
    where
        F: FnOnce() -> StorageResult<BTreeMap<String, CommitId>>,
    {
        if let Some(refs) = self.refs.read().as_ref() {
            return Ok(refs.clone());
        }

        let mut slot = self.refs.write();
        if let Some(refs) = slot.as_ref() {
            return Ok(refs.clone());
        }
        let refs = load()?;
        *slot = Some(refs.clone());
        Ok(refs)
    }

    pub fn invalidate(&self) {
        *self.refs.write() = None;
    }

    pub fn is_warm(&self) -> bool {
        self.refs.read().is_some()
    }
}
