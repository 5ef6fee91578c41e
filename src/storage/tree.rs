//! Tree reading.
//!
//! In Git, a tree is a directory. A snapshot of a commit is its root tree
//! flattened into `(path, mode, object id)` entries. Directories themselves are
//! implied by the paths and never emitted as entries.

use git2::{ObjectType, Repository, Tree, TreeWalkMode, TreeWalkResult};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{FileMode, ObjectId, TreeEntry, TreeId};

/// look up a tree, mapping a missing object to `ObjectNotFound`
pub fn find_tree(repo: &Repository, tree_id: TreeId) -> StorageResult<Tree<'_>> {
    repo.find_tree(tree_id.raw()).map_err(|e| {
        if e.code() == git2::ErrorCode::NotFound {
            StorageError::object_not_found("tree", tree_id)
        } else {
            StorageError::Git(e)
        }
    })
}

/// flatten a tree into its file, symlink and submodule entries
///
/// entries come back in git's natural pre-order, which is path sorted
/// within each directory. No re-sorting happens here.
pub fn read_entries(repo: &Repository, tree_id: TreeId) -> StorageResult<Vec<TreeEntry>> {
    let tree = find_tree(repo, tree_id)?;

    let mut entries = Vec::new();
    let mut failure = None;

    let walked = tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() == Some(ObjectType::Tree) {
            return TreeWalkResult::Ok;
        }

        let parsed = match std::str::from_utf8(entry.name_bytes()) {
            Ok(name) => entry_from_raw(format!("{}{}", root, name), entry.filemode(), entry.id()),
            Err(_) => Err(StorageError::Malformed {
                path: format!("{}{}", root, String::from_utf8_lossy(entry.name_bytes())).into(),
                reason: "entry name is not valid UTF-8".to_string(),
            }),
        };
        match parsed {
            Ok(parsed) => {
                entries.push(parsed);
                TreeWalkResult::Ok
            }
            Err(err) => {
                failure = Some(err);
                TreeWalkResult::Abort
            }
        }
    });

    // an aborted walk surfaces as a generic git error; report our own reason
    if let Some(err) = failure {
        return Err(err);
    }
    walked?;

    Ok(entries)
}

/// map one raw tree record to an entry; unknown modes are malformed
fn entry_from_raw(path: String, raw_mode: i32, oid: git2::Oid) -> StorageResult<TreeEntry> {
    match FileMode::from_raw(raw_mode) {
        Some(FileMode::Tree) | None => Err(StorageError::Malformed {
            path: path.into(),
            reason: format!("unexpected file mode {:o}", raw_mode),
        }),
        Some(mode) => Ok(TreeEntry::new(path, mode, ObjectId::new(oid))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::{FixtureFile, TestRepo};

    #[test]
    fn test_read_entries_flattens_nested_tree() {
        let fixture = TestRepo::new();
        let commit = fixture.commit(
            &[
                ("README.md", FixtureFile::text("hello")),
                ("src/lib.rs", FixtureFile::text("pub fn x() {}")),
                ("src/bin/tool.sh", FixtureFile::executable("#!/bin/sh")),
            ],
            &[],
            1_000,
            "initial",
        );
        let tree_id = fixture.tree_of(commit);

        let entries = fixture.with_raw(|repo| read_entries(repo, tree_id)).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src/bin/tool.sh", "src/lib.rs"]);
        assert_eq!(entries[1].mode, FileMode::Executable);
    }

    #[test]
    fn test_read_entries_keeps_submodules_and_symlinks() {
        let fixture = TestRepo::new();
        let commit = fixture.commit(
            &[
                ("link", FixtureFile::symlink("README.md")),
                ("README.md", FixtureFile::text("hello")),
                ("vendor/dep", FixtureFile::submodule(TestRepo::FOREIGN_COMMIT)),
            ],
            &[],
            1_000,
            "initial",
        );
        let tree_id = fixture.tree_of(commit);

        let entries = fixture.with_raw(|repo| read_entries(repo, tree_id)).unwrap();
        assert_eq!(entries.len(), 3);

        let link = entries.iter().find(|e| e.path == "link").unwrap();
        assert_eq!(link.mode, FileMode::Symlink);

        let dep = entries.iter().find(|e| e.path == "vendor/dep").unwrap();
        assert!(dep.is_submodule());
        assert_eq!(
            dep.submodule_commit().unwrap().to_string(),
            TestRepo::FOREIGN_COMMIT
        );
    }

    #[test]
    fn test_unknown_mode_is_malformed() {
        let oid = git2::Oid::from_str(TestRepo::FOREIGN_COMMIT).unwrap();

        let err = entry_from_raw("weird".to_string(), 0o170000, oid).unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("170000"));

        let err = entry_from_raw("dir".to_string(), FileMode::TREE, oid).unwrap_err();
        assert!(err.is_malformed());

        let ok = entry_from_raw("a.txt".to_string(), FileMode::REGULAR, oid).unwrap();
        assert_eq!(ok.mode, FileMode::Regular);
    }

    #[test]
    fn test_group_writable_mode_reads_as_regular() {
        let fixture = TestRepo::new();
        // legacy trees can carry 100664; libgit2 normalizes it on read
        let tree_id = fixture
            .with_raw(|repo| {
                let blob = repo.blob(b"legacy")?;
                let mut raw = b"100664 old.txt\0".to_vec();
                raw.extend_from_slice(blob.as_bytes());
                let oid = repo.odb()?.write(ObjectType::Tree, &raw)?;
                Ok(TreeId::new(oid))
            })
            .unwrap();

        let entries = fixture.with_raw(|repo| read_entries(repo, tree_id)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "old.txt");
        assert_eq!(entries[0].mode, FileMode::Regular);
    }

    #[test]
    fn test_non_utf8_name_is_malformed() {
        let fixture = TestRepo::new();
        let tree_id = fixture
            .with_raw(|repo| {
                let blob = repo.blob(b"bytes")?;
                let mut builder = repo.treebuilder(None)?;
                builder.insert(b"caf\xe9.txt".to_vec(), blob, FileMode::REGULAR)?;
                Ok(TreeId::new(builder.write()?))
            })
            .unwrap();

        let err = fixture.with_raw(|repo| read_entries(repo, tree_id)).unwrap_err();
        assert!(err.is_malformed(), "got {:?}", err);
    }

    #[test]
    fn test_missing_tree_is_not_found() {
        let fixture = TestRepo::new();
        let missing = TreeId::new(git2::Oid::from_str(TestRepo::FOREIGN_COMMIT).unwrap());

        let result = fixture.with_raw(|repo| read_entries(repo, missing));
        assert!(matches!(result, Err(StorageError::ObjectNotFound { kind: "tree", .. })));
    }
}
