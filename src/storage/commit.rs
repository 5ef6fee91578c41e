//! Commit lookup, diffs and ancestry queries
//!
//! commits are the nodes of the history graph. This module turns git2 commits
//! into plain `CommitInfo` records and answers the graph questions that are a
//! straight delegation to libgit2 (merge base, counting, ranges). The
//! filtered, windowed walk lives in `crate::history`.

use chrono::{DateTime, TimeZone, Utc};
use git2::{Delta, Diff, DiffFindOptions, DiffOptions, Repository, Sort};
use serde::Serialize;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tree::find_tree;
use crate::storage::types::{Change, ChangeStatus, CommitId, TreeId};

/// information about a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub id: CommitId,
    pub tree_id: TreeId,
    pub parent_ids: Vec<CommitId>,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    /// committer time; history ordering ties are broken on this
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let time = commit.committer().when();
        let timestamp = Utc
            .timestamp_opt(time.seconds(), 0)
            .single()
            .unwrap_or_default();

        Self {
            id: CommitId::new(commit.id()),
            tree_id: TreeId::new(commit.tree_id()),
            parent_ids: commit.parent_ids().map(CommitId::new).collect(),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            author_name: author.name().unwrap_or("Unknown").to_string(),
            author_email: author.email().unwrap_or("unknown@unknown").to_string(),
            timestamp,
        }
    }

    /// check if this is a merge commit (has multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }

    /// check if this is a root commit
    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }

    /// get the first (or only) parent
    pub fn first_parent(&self) -> Option<CommitId> {
        self.parent_ids.first().copied()
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

/// get information about a commit
pub fn get_commit(repo: &Repository, id: CommitId) -> StorageResult<CommitInfo> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StorageError::CommitNotFound(id.to_string()))?;

    Ok(CommitInfo::from_git2(&commit))
}

/// compute the diff between two trees
///
/// `old == None` diffs against the empty tree, which is how a root commit is
/// compared. With `detect_renames`, similar delete/add pairs are folded into
/// a single renamed change.
pub fn diff_trees(
    repo: &Repository,
    old: Option<TreeId>,
    new: TreeId,
    detect_renames: bool,
) -> StorageResult<Vec<Change>> {
    let old_tree = old.map(|id| find_tree(repo, id)).transpose()?;
    let new_tree = find_tree(repo, new)?;

    let mut opts = DiffOptions::new();
    let mut diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), Some(&mut opts))?;

    if detect_renames {
        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))?;
    }

    Ok(extract_changes_from_diff(&diff))
}

/// compute the diff between two commits, with rename detection
pub fn diff_commits(repo: &Repository, old: CommitId, new: CommitId) -> StorageResult<Vec<Change>> {
    let old_commit = get_commit(repo, old)?;
    let new_commit = get_commit(repo, new)?;
    diff_trees(repo, Some(old_commit.tree_id), new_commit.tree_id, true)
}

/// compute changes from a diff
fn extract_changes_from_diff(diff: &Diff<'_>) -> Vec<Change> {
    diff.deltas()
        .map(|delta| {
            let new_path = delta.new_file().path().map(|p| p.to_string_lossy().into_owned());
            let old_path = delta.old_file().path().map(|p| p.to_string_lossy().into_owned());

            let status = match delta.status() {
                Delta::Added => ChangeStatus::Added,
                Delta::Deleted => ChangeStatus::Deleted,
                Delta::Modified => ChangeStatus::Modified,
                Delta::Renamed => ChangeStatus::Renamed,
                Delta::Copied => ChangeStatus::Copied,
                Delta::Typechange => ChangeStatus::TypeChange,
                _ => ChangeStatus::Other,
            };

            let new_path = new_path.or_else(|| old_path.clone()).unwrap_or_default();
            let old_path = old_path.unwrap_or_else(|| new_path.clone());

            Change {
                renamed: status == ChangeStatus::Renamed,
                old_path,
                new_path,
                status,
            }
        })
        .collect()
}

/// find the merge base (common ancestor) of two commits
///
/// returns None if there is no common ancestor
pub fn find_merge_base(repo: &Repository, a: CommitId, b: CommitId) -> StorageResult<Option<CommitId>> {
    match repo.merge_base(a.raw(), b.raw()) {
        Ok(oid) => Ok(Some(CommitId::new(oid))),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(StorageError::Git(e)),
    }
}

/// number of commits reachable from `start`, `start` included
pub fn count_commits(repo: &Repository, start: CommitId) -> StorageResult<usize> {
    let mut revwalk = repo.revwalk()?;
    revwalk.push(start.raw())?;

    let mut count = 0;
    for oid in revwalk {
        oid?;
        count += 1;
    }
    Ok(count)
}

/// commits reachable from `to` but not from `from`, oldest first
pub fn commits_between(repo: &Repository, from: CommitId, to: CommitId) -> StorageResult<Vec<CommitInfo>> {
    let mut revwalk = repo.revwalk()?;
    revwalk.push(to.raw())?;
    revwalk.hide(from.raw())?;
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

    revwalk
        .map(|oid| get_commit(repo, CommitId::new(oid?)))
        .collect()
}
