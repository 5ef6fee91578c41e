//! Snapshot export as tar, tar.gz, tar.bz2 or zip.
//!
//! ```text
//!  ref ──► snapshot ──► entries ──► write_tar ──► compress (cat|gzip|bzip2) ──► file
//!                              └──► write_zip ─────────────────────────────────► file
//! ```
//!
//! Archives land at `<storage_path>/<name>/<name>-<commit>.<ext>`. The path
//! depends only on the resolved commit, so an existing file is reused as is.
//! Files are always written to a temp file in the target directory first and
//! renamed into place, so readers never see a partial archive.

mod compress;
mod error;
mod format;
mod writer;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

pub use compress::compress;
pub use error::{ArchiveError, ArchiveResult};
pub use format::ArchiveFormat;
pub use writer::{write_tar, write_zip};

use crate::cancel::CancellationToken;
use crate::snapshot::snapshot_commit;
use crate::storage::{CommitInfo, ObjectStore};

/// Builds archives of one repository into a storage directory.
pub struct Archiver<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    name: String,
    storage_path: PathBuf,
    compressors: HashMap<ArchiveFormat, Vec<String>>,
    cancel: CancellationToken,
}

impl<'a, S: ObjectStore + ?Sized> Archiver<'a, S> {
    /// `name` is the repository name; it is both the archive's top-level
    /// directory and the storage subdirectory.
    pub fn new(store: &'a S, name: impl Into<String>, storage_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            name: name.into(),
            storage_path: storage_path.into(),
            compressors: HashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the compressor argv for a tar format.
    pub fn compressor(mut self, format: ArchiveFormat, argv: Vec<String>) -> Self {
        self.compressors.insert(format, argv);
        self
    }

    /// Use several compressor overrides at once.
    pub fn compressors(mut self, overrides: &HashMap<ArchiveFormat, Vec<String>>) -> Self {
        self.compressors
            .extend(overrides.iter().map(|(format, argv)| (*format, argv.clone())));
        self
    }

    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Where the archive of `commit` in `format` lives.
    pub fn archive_path(&self, commit: &CommitInfo, format: ArchiveFormat) -> PathBuf {
        self.storage_path.join(&self.name).join(format!(
            "{}-{}.{}",
            self.name,
            commit.id,
            format.extension()
        ))
    }

    /// Export `ref_or_sha` and return the archive path.
    ///
    /// The path is computed and checked before any tree is read; when a file
    /// is already there it is returned untouched.
    pub fn archive(&self, ref_or_sha: &str, format: ArchiveFormat) -> ArchiveResult<PathBuf> {
        let id = self.store.resolve(ref_or_sha)?;
        let commit = self.store.commit(id)?;
        let path = self.archive_path(&commit, format);

        if path.exists() {
            tracing::info!(path = %path.display(), "reusing existing archive");
            return Ok(path);
        }

        let dir = path
            .parent()
            .ok_or_else(|| ArchiveError::InvalidPath(path.clone()))?;
        fs::create_dir_all(dir)?;

        let mtime = commit.timestamp;
        let snapshot = snapshot_commit(self.store, commit)?;
        tracing::debug!(
            reference = ref_or_sha,
            commit = %snapshot.commit.id,
            %format,
            entries = snapshot.entries.len(),
            "building archive"
        );

        match format {
            ArchiveFormat::Zip => self.build_zip(&snapshot.entries, mtime, &path)?,
            _ => {
                let raw = write_tar(self.store, &snapshot.entries, &self.name, mtime, &self.cancel)?;
                let argv = self.compressor_argv(format);
                compress(raw, &argv, &path, &self.cancel)?;
            }
        }

        tracing::info!(path = %path.display(), %format, "archive created");
        Ok(path)
    }

    fn build_zip(
        &self,
        entries: &[crate::storage::TreeEntry],
        mtime: chrono::DateTime<chrono::Utc>,
        path: &Path,
    ) -> ArchiveResult<()> {
        let dir = path
            .parent()
            .ok_or_else(|| ArchiveError::InvalidPath(path.to_path_buf()))?;
        let temp = NamedTempFile::new_in(dir)?;
        let file = write_zip(self.store, entries, &self.name, mtime, temp, &self.cancel)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn compressor_argv(&self, format: ArchiveFormat) -> Vec<String> {
        match self.compressors.get(&format) {
            Some(argv) => argv.clone(),
            None => format
                .compressor()
                .unwrap_or_default()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use std::sync::Arc;

    use crate::storage::testing::{FixtureFile, TestRepo};
    use crate::storage::CommitId;

    fn fixture() -> (TestRepo, CommitId) {
        let fixture = TestRepo::new();
        let c1 = fixture.commit(
            &[
                ("README", FixtureFile::text("read me\n")),
                ("src/main.c", FixtureFile::text("int main() { return 0; }\n")),
                ("third_party/lib", FixtureFile::submodule(TestRepo::FOREIGN_COMMIT)),
            ],
            &[],
            1_500_000_000,
            "initial",
        );
        fixture.set_branch("master", c1);
        (fixture, c1)
    }

    fn tar_paths(bytes: &[u8]) -> Vec<String> {
        tar::Archive::new(Cursor::new(bytes))
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().trim_end_matches('/').to_string())
            .collect()
    }

    #[test]
    fn test_archive_path_layout() {
        let (fixture, c1) = fixture();
        let storage = fixture.scratch("archives");
        let archiver = Archiver::new(fixture.storage(), "fixture", &storage);

        let path = archiver.archive("master", ArchiveFormat::Tar).unwrap();
        assert_eq!(path, storage.join("fixture").join(format!("fixture-{}.tar", c1)));
        assert!(path.exists());

        let paths = tar_paths(&fs::read(&path).unwrap());
        assert_eq!(
            paths,
            vec!["fixture", "fixture/README", "fixture/src/main.c", "fixture/third_party/lib"]
        );
    }

    #[test]
    fn test_archive_is_idempotent() {
        let (fixture, _) = fixture();
        let storage = fixture.scratch("archives");
        let archiver = Archiver::new(fixture.storage(), "fixture", &storage);

        let first = archiver.archive("master", ArchiveFormat::Tar).unwrap();
        let modified = fs::metadata(&first).unwrap().modified().unwrap();

        // a sentinel proves the second call never rewrites the file
        fs::write(&first, b"sentinel").unwrap();
        let second = archiver.archive("master", ArchiveFormat::Tar).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read(&second).unwrap(), b"sentinel");
        assert!(fs::metadata(&second).unwrap().modified().unwrap() >= modified);
    }

    #[test]
    fn test_tar_gz_matches_plain_tar() {
        if std::process::Command::new("gzip").arg("--version").output().is_err() {
            return;
        }
        let (fixture, _) = fixture();
        let storage = fixture.scratch("archives");
        let archiver = Archiver::new(fixture.storage(), "fixture", &storage);

        let plain = archiver.archive("master", ArchiveFormat::Tar).unwrap();
        let gz = archiver.archive("master", ArchiveFormat::TarGz).unwrap();
        assert!(gz.to_string_lossy().ends_with(".tar.gz"));

        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(fs::File::open(&gz).unwrap())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, fs::read(&plain).unwrap());
    }

    #[test]
    fn test_zip_archive() {
        let (fixture, c1) = fixture();
        let storage = fixture.scratch("archives");
        let archiver = Archiver::new(fixture.storage(), "fixture", &storage);

        let path = archiver.archive("master", ArchiveFormat::Zip).unwrap();
        assert_eq!(path.file_name().unwrap().to_string_lossy(), format!("fixture-{}.zip", c1));

        let mut zip = zip::ZipArchive::new(fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(zip.len(), 4);
        assert!(zip.by_name("fixture/third_party/lib/").unwrap().is_dir());
        // only the archive itself is left in the directory
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_compressor_override_and_failure() {
        let (fixture, _) = fixture();
        let storage = fixture.scratch("archives");
        let archiver = Archiver::new(fixture.storage(), "fixture", &storage)
            .compressor(ArchiveFormat::TarBz2, vec!["false".to_string()]);

        let result = archiver.archive("master", ArchiveFormat::TarBz2);
        assert!(matches!(result, Err(ArchiveError::CompressorFailed { .. })));
        assert!(result.unwrap_err().is_io());

        let dir = storage.join("fixture");
        assert_eq!(fs::read_dir(dir).unwrap().count(), 0);
    }

    #[test]
    fn test_unknown_ref() {
        let (fixture, _) = fixture();
        let archiver = Archiver::new(fixture.storage(), "fixture", fixture.scratch("archives"));

        let result = archiver.archive("no-such-branch", ArchiveFormat::Tar);
        assert!(result.unwrap_err().is_not_found());
    }

    #[test]
    fn test_concurrent_requests_produce_one_intact_file() {
        let (fixture, _) = fixture();
        let storage = Arc::new(fixture.scratch("archives"));
        let expected = {
            let reference = fixture.scratch("reference");
            let path = Archiver::new(fixture.storage(), "fixture", &reference)
                .archive("master", ArchiveFormat::Tar)
                .unwrap();
            fs::read(path).unwrap()
        };

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let repo = fixture.storage().clone();
                let storage = Arc::clone(&storage);
                std::thread::spawn(move || {
                    Archiver::new(&repo, "fixture", storage.as_path())
                        .archive("master", ArchiveFormat::Tar)
                        .unwrap()
                })
            })
            .collect();

        let paths: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(fs::read(&paths[0]).unwrap(), expected);
        assert_eq!(fs::read_dir(paths[0].parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_cancelled_before_start() {
        let (fixture, _) = fixture();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let archiver = Archiver::new(fixture.storage(), "fixture", fixture.scratch("archives"))
            .cancel_token(cancel);

        let result = archiver.archive("master", ArchiveFormat::Tar);
        assert!(matches!(result, Err(ArchiveError::Cancelled)));
    }
}
