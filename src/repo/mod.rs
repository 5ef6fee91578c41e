//! High-level repository handle and its configuration.
//!
//! `Repo` is what the CLI and library users hold: ref enumeration and
//! mutation, commit queries, history walks, snapshots and archive export,
//! all over one opened repository.

mod api;
mod config;

pub use api::{Repo, RepoError, RepoResult};
pub use config::{RepoConfig, REPO_ENV, STORAGE_ENV};
