//! storage layer for gitsnap
//!
//! this module is the only place that touches git2. Everything above it
//! (snapshots, archives, the history walker) talks to the [`ObjectStore`]
//! trait or to [`GitRepository`] for plain ref/commit delegation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              GitRepository  (impl ObjectStore)              │
//! │     (thread-safe handle, ref cache, delegation helpers)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    tree     │       │    blob     │       │    refs     │
//!  │ (snapshots) │       │ (contents)  │       │ (branches)  │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!         │                     │                     │
//!         └─────────────────────┼─────────────────────┘
//!                               │
//!                               ▼
//!                        ┌─────────────┐
//!                        │   commit    │
//!                        │ (diffs, dag)│
//!                        └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use gitsnap::storage::{GitRepository, ObjectStore};
//!
//! let repo = GitRepository::open("./project.git")?;
//! let head = repo.resolve("HEAD")?;
//! let commit = repo.commit(head)?;
//! for entry in repo.tree_entries(commit.tree_id)? {
//!     println!("{:o} {}", entry.mode.raw(), entry.path);
//! }
//! ```

mod blob;
mod commit;
mod error;
mod refs;
mod repository;
mod store;
mod tree;
mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export public API
pub use commit::CommitInfo;
pub use error::{StorageError, StorageResult};
pub use refs::{BranchInfo, RefCache, TagInfo};
pub use repository::GitRepository;
pub use store::ObjectStore;
pub use types::{
    BlobId, BranchName, Change, ChangeStatus, CommitId, FileMode, GitSignature,
    InvalidNameError, ObjectId, TagName, TreeEntry, TreeId,
};
