//! Commit history walks.
//!
//! `walk` returns the commits reachable from a start ref in topological
//! order, newest first among commits that are ready at the same time,
//! optionally restricted to a path and windowed by offset and limit.
//!
//! ```ignore
//! use gitsnap::history::{walk, WalkOptions};
//!
//! let page = walk(&repo, &WalkOptions::new("master").path("src/").limit(10), &cancel)?;
//! ```

mod error;
mod options;
mod walker;

pub use error::{HistoryError, HistoryResult};
pub use options::WalkOptions;
pub use walker::{HistoryWalker, PathFilter};

use crate::cancel::CancellationToken;
use crate::storage::{CommitInfo, ObjectStore};

/// Walk the history and collect the requested window.
///
/// Any failure along the way fails the whole walk; no partial page is
/// returned.
pub fn walk<S>(store: &S, options: &WalkOptions, cancel: &CancellationToken) -> HistoryResult<Vec<CommitInfo>>
where
    S: ObjectStore + ?Sized,
{
    let walker = HistoryWalker::new(store, options, cancel.clone())?;
    tracing::debug!(
        start = %options.start,
        reachable = walker.reachable(),
        path = ?options.path_filter,
        offset = options.offset,
        limit = options.limit,
        "walking history"
    );
    walker.collect()
}
