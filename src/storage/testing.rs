//! Test fixtures: throwaway repositories with hand-built histories.

use std::collections::BTreeMap;
use std::path::Path;

use git2::{Oid, Repository, Signature, Time};
use tempfile::TempDir;

use crate::storage::error::StorageResult;
use crate::storage::repository::GitRepository;
use crate::storage::types::{CommitId, FileMode, TreeId};

/// content of one path in a fixture commit
#[derive(Debug, Clone)]
pub enum FixtureFile {
    Blob { bytes: Vec<u8>, mode: FileMode },
    Submodule(Oid),
}

impl FixtureFile {
    pub fn text(content: &str) -> Self {
        FixtureFile::Blob {
            bytes: content.as_bytes().to_vec(),
            mode: FileMode::Regular,
        }
    }

    pub fn executable(content: &str) -> Self {
        FixtureFile::Blob {
            bytes: content.as_bytes().to_vec(),
            mode: FileMode::Executable,
        }
    }

    pub fn symlink(target: &str) -> Self {
        FixtureFile::Blob {
            bytes: target.as_bytes().to_vec(),
            mode: FileMode::Symlink,
        }
    }

    pub fn submodule(commit_hex: &str) -> Self {
        FixtureFile::Submodule(Oid::from_str(commit_hex).unwrap())
    }
}

/// builder for fixture commits with a fluent interface
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    files: Vec<(String, FixtureFile)>,
    parents: Vec<CommitId>,
    message: String,
    time: i64,
}

impl<'a> CommitBuilder<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            files: Vec::new(),
            parents: Vec::new(),
            message: String::new(),
            time: 0,
        }
    }

    /// the complete file set of the commit's tree
    pub fn files(mut self, files: &[(&str, FixtureFile)]) -> Self {
        self.files = files
            .iter()
            .map(|(path, file)| (path.to_string(), file.clone()))
            .collect();
        self
    }

    pub fn parents(mut self, parents: &[CommitId]) -> Self {
        self.parents = parents.to_vec();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// committer and author time, seconds since the epoch
    pub fn time(mut self, time: i64) -> Self {
        self.time = time;
        self
    }

    pub fn commit(self) -> Result<CommitId, git2::Error> {
        let tree_oid = write_tree(self.repo, &self.files)?;
        let tree = self.repo.find_tree(tree_oid)?;
        let sig = Signature::new("Test", "test@example.com", &Time::new(self.time, 0))?;

        let parent_commits: Vec<git2::Commit<'_>> = self
            .parents
            .iter()
            .map(|id| self.repo.find_commit(id.raw()))
            .collect::<Result<_, _>>()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let oid = self
            .repo
            .commit(None, &sig, &sig, &self.message, &tree, &parent_refs)?;
        Ok(CommitId::new(oid))
    }
}

/// write nested trees for a flat path -> file map
fn write_tree(repo: &Repository, files: &[(String, FixtureFile)]) -> Result<Oid, git2::Error> {
    let mut builder = repo.treebuilder(None)?;
    let mut subdirs: BTreeMap<String, Vec<(String, FixtureFile)>> = BTreeMap::new();

    for (path, file) in files {
        match path.split_once('/') {
            Some((dir, rest)) => subdirs
                .entry(dir.to_string())
                .or_default()
                .push((rest.to_string(), file.clone())),
            None => {
                let (oid, mode) = match file {
                    FixtureFile::Blob { bytes, mode } => (repo.blob(bytes)?, mode.raw()),
                    FixtureFile::Submodule(commit) => (*commit, FileMode::SUBMODULE),
                };
                builder.insert(path, oid, mode)?;
            }
        }
    }

    for (dir, children) in subdirs {
        let oid = write_tree(repo, &children)?;
        builder.insert(&dir, oid, FileMode::TREE)?;
    }

    builder.write()
}

/// a repository in a temp dir, opened through the storage layer
pub struct TestRepo {
    dir: TempDir,
    repo: GitRepository,
}

impl TestRepo {
    /// a commit id that only exists in some other repository
    pub const FOREIGN_COMMIT: &'static str = "0123456789abcdef0123456789abcdef01234567";

    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixture");
        Repository::init(&path).unwrap();
        let repo = GitRepository::open(&path).unwrap();
        Self { dir, repo }
    }

    pub fn storage(&self) -> &GitRepository {
        &self.repo
    }

    pub fn path(&self) -> &Path {
        self.repo.path()
    }

    /// a scratch directory next to the repository
    pub fn scratch(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    pub fn with_raw<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        self.repo.with_repo(f)
    }

    pub fn commit(
        &self,
        files: &[(&str, FixtureFile)],
        parents: &[CommitId],
        time: i64,
        message: &str,
    ) -> CommitId {
        self.repo
            .with_repo(|repo| {
                Ok(CommitBuilder::new(repo)
                    .files(files)
                    .parents(parents)
                    .message(message)
                    .time(time)
                    .commit()?)
            })
            .unwrap()
    }

    pub fn tree_of(&self, commit: CommitId) -> TreeId {
        self.repo
            .with_repo(|repo| Ok(TreeId::new(repo.find_commit(commit.raw())?.tree_id())))
            .unwrap()
    }

    /// point a branch at a commit without going through the ref cache
    pub fn set_branch(&self, name: &str, commit: CommitId) {
        self.repo
            .with_repo(|repo| {
                repo.reference(&format!("refs/heads/{}", name), commit.raw(), true, "fixture")?;
                Ok(())
            })
            .unwrap();
    }

    pub fn set_head(&self, branch: &str) {
        self.repo
            .with_repo(|repo| Ok(repo.set_head(&format!("refs/heads/{}", branch))?))
            .unwrap();
    }
}
