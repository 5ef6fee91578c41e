//! gitsnap - repository queries and snapshot archives over git
//!
//! This crate wraps a git repository with the operations a code-hosting
//! backend needs: branch and tag enumeration, commit lookup and history
//! walks with path filtering, and export of any ref as a tar, tar.gz,
//! tar.bz2 or zip archive.
//!
//! # Example
//!
//! ```no_run
//! use gitsnap::archive::ArchiveFormat;
//! use gitsnap::history::WalkOptions;
//! use gitsnap::repo::{Repo, RepoConfig};
//!
//! let repo = Repo::open(RepoConfig::new("./project.git")).unwrap();
//! let recent = repo.log(&WalkOptions::new("master").limit(10)).unwrap();
//! let path = repo.archive("master", ArchiveFormat::TarGz).unwrap();
//! ```

pub mod archive;
pub mod cancel;
pub mod history;
pub mod repo;
pub mod snapshot;
pub mod storage;
