//! Tar and zip writers over a tree snapshot.
//!
//! Both containers get the same layout: a directory for the prefix first, then
//! one record per tree entry under `<prefix>/`. Submodules become empty
//! directories and their commit is never looked up.

use std::io::{self, Seek, Write};

use chrono::{DateTime, Datelike, Timelike, Utc};
use tar::{EntryType, Header};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::cancel::CancellationToken;
use crate::storage::{FileMode, ObjectStore, StorageError, TreeEntry};

/// permissions of the prefix and submodule directories
const DIR_PERMISSIONS: u32 = 0o755;

/// Build an uncompressed tar stream in memory.
///
/// Every header carries `mtime` and zeroed ownership, so one commit always
/// yields the same bytes.
pub fn write_tar<S>(
    store: &S,
    entries: &[TreeEntry],
    prefix: &str,
    mtime: DateTime<Utc>,
    cancel: &CancellationToken,
) -> ArchiveResult<Vec<u8>>
where
    S: ObjectStore + ?Sized,
{
    let mtime = mtime.timestamp().max(0) as u64;
    let mut builder = tar::Builder::new(Vec::new());

    append_tar_dir(&mut builder, prefix, mtime)?;

    for entry in entries {
        if cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }

        let path = format!("{}/{}", prefix, entry.path);
        match entry.mode {
            FileMode::Submodule => append_tar_dir(&mut builder, &path, mtime)?,
            FileMode::Symlink => {
                let target = link_target(store, entry)?;
                let mut header = tar_header(EntryType::Symlink, entry.mode.permissions(), 0, mtime);
                builder.append_link(&mut header, &path, &target)?;
            }
            _ => {
                let content = read_content(store, entry)?;
                let mut header = tar_header(
                    EntryType::Regular,
                    entry.mode.permissions(),
                    content.len() as u64,
                    mtime,
                );
                builder.append_data(&mut header, &path, content.as_slice())?;
            }
        }
    }

    Ok(builder.into_inner()?)
}

/// Write a zip archive into `out` and hand the writer back.
///
/// Zip needs a seekable sink because the central directory is written last.
pub fn write_zip<S, W>(
    store: &S,
    entries: &[TreeEntry],
    prefix: &str,
    mtime: DateTime<Utc>,
    out: W,
    cancel: &CancellationToken,
) -> ArchiveResult<W>
where
    S: ObjectStore + ?Sized,
    W: Write + Seek,
{
    let mtime = zip_time(mtime);
    let mut zip = ZipWriter::new(out);

    zip.add_directory(prefix.to_string(), zip_options(mtime, DIR_PERMISSIONS))?;

    for entry in entries {
        if cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }

        let path = format!("{}/{}", prefix, entry.path);
        match entry.mode {
            FileMode::Submodule => {
                zip.add_directory(path, zip_options(mtime, DIR_PERMISSIONS))?;
            }
            FileMode::Symlink => {
                let target = link_target(store, entry)?;
                zip.add_symlink(
                    path,
                    target,
                    zip_options(mtime, entry.mode.permissions()),
                )?;
            }
            _ => {
                let content = read_content(store, entry)?;
                let options = zip_options(mtime, entry.mode.permissions())
                    .compression_method(CompressionMethod::Deflated);
                zip.start_file(path, options)?;
                zip.write_all(&content)?;
            }
        }
    }

    Ok(zip.finish()?)
}

fn read_content<S>(store: &S, entry: &TreeEntry) -> ArchiveResult<Vec<u8>>
where
    S: ObjectStore + ?Sized,
{
    let blob_id = entry.blob_id().ok_or_else(|| StorageError::Malformed {
        path: entry.path.clone().into(),
        reason: "entry has no blob content".to_string(),
    })?;
    Ok(store.blob_bytes(blob_id)?)
}

/// symlink targets go into the archive verbatim, so they must be UTF-8
fn link_target<S>(store: &S, entry: &TreeEntry) -> ArchiveResult<String>
where
    S: ObjectStore + ?Sized,
{
    String::from_utf8(read_content(store, entry)?).map_err(|_| {
        StorageError::Malformed {
            path: entry.path.clone().into(),
            reason: "symlink target is not valid UTF-8".to_string(),
        }
        .into()
    })
}

fn tar_header(kind: EntryType, mode: u32, size: u64, mtime: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(kind);
    header.set_mode(mode);
    header.set_size(size);
    header.set_mtime(mtime);
    header.set_uid(0);
    header.set_gid(0);
    header
}

fn append_tar_dir(builder: &mut tar::Builder<Vec<u8>>, path: &str, mtime: u64) -> io::Result<()> {
    let mut header = tar_header(EntryType::Directory, DIR_PERMISSIONS, 0, mtime);
    builder.append_data(&mut header, path, io::empty())
}

fn zip_options(mtime: zip::DateTime, permissions: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .last_modified_time(mtime)
        .unix_permissions(permissions)
}

// zip timestamps start at 1980; anything earlier is clamped to that
fn zip_time(time: DateTime<Utc>) -> zip::DateTime {
    let year = time.year().clamp(1980, 2107) as u16;
    zip::DateTime::from_date_and_time(
        year,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
    )
    .unwrap_or_default()
}
