//! Topological history traversal with path filtering.

use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use chrono::{DateTime, Utc};

use crate::cancel::CancellationToken;
use crate::history::error::{HistoryError, HistoryResult};
use crate::history::options::WalkOptions;
use crate::storage::{Change, ChangeStatus, CommitId, CommitInfo, ObjectStore};

/// Reachable commits in emission order.
///
/// A commit becomes ready once every child reachable from the start has been
/// emitted. Ready commits come out newest committer time first, ties on the
/// higher id.
pub(crate) struct TopoOrder {
    commits: HashMap<CommitId, CommitInfo>,
    pending_children: HashMap<CommitId, usize>,
    ready: BinaryHeap<(DateTime<Utc>, CommitId)>,
}

impl TopoOrder {
    /// load every commit reachable from `start`
    pub(crate) fn load<S>(store: &S, start: CommitId, cancel: &CancellationToken) -> HistoryResult<Self>
    where
        S: ObjectStore + ?Sized,
    {
        let mut commits = HashMap::new();
        let mut pending_children: HashMap<CommitId, usize> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(id) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(HistoryError::Cancelled);
            }
            let commit = match commits.entry(id) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => slot.insert(store.commit(id)?),
            };
            for parent in &commit.parent_ids {
                *pending_children.entry(*parent).or_default() += 1;
                queue.push_back(*parent);
            }
        }

        let mut ready = BinaryHeap::new();
        if let Some(commit) = commits.get(&start) {
            ready.push((commit.timestamp, start));
        }

        tracing::debug!(%start, commits = commits.len(), "loaded history graph");
        Ok(Self {
            commits,
            pending_children,
            ready,
        })
    }

    pub(crate) fn get(&self, id: &CommitId) -> Option<&CommitInfo> {
        self.commits.get(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.commits.len()
    }

    /// pop the next commit and release parents whose children are all out
    pub(crate) fn pop(&mut self) -> Option<CommitInfo> {
        let (_, id) = self.ready.pop()?;
        let commit = self.commits.get(&id)?.clone();

        for parent in &commit.parent_ids {
            let Some(pending) = self.pending_children.get_mut(parent) else {
                continue;
            };
            *pending -= 1;
            if *pending == 0 {
                if let Some(info) = self.commits.get(parent) {
                    self.ready.push((info.timestamp, *parent));
                }
            }
        }
        Some(commit)
    }
}

/// The path a filtered walk is currently tracking.
///
/// With `follow` set, an exact rename onto the tracked path switches the
/// filter to the old path for everything older in the same walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFilter {
    current: String,
    follow: bool,
}

impl PathFilter {
    pub fn new(path: impl Into<String>, follow: bool) -> Self {
        Self {
            current: path.into(),
            follow,
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// whether any change touches the tracked prefix
    pub fn matches(&mut self, changes: &[Change]) -> bool {
        let mut matched = false;
        let mut renamed_from = None;

        for change in changes {
            if !change.old_path.starts_with(&self.current) && !change.new_path.starts_with(&self.current) {
                continue;
            }
            matched = true;
            if self.follow && change.status == ChangeStatus::Renamed && change.new_path == self.current {
                renamed_from = Some(change.old_path.clone());
            }
        }

        if let Some(old) = renamed_from {
            tracing::debug!(from = %self.current, to = %old, "following rename");
            self.current = old;
        }
        matched
    }
}

/// Lazy, windowed history iterator.
///
/// The graph is loaded up front; diffs for the path filter are computed one
/// commit at a time as the iterator advances. After the first error the
/// iterator is exhausted.
pub struct HistoryWalker<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    order: TopoOrder,
    filter: Option<PathFilter>,
    detect_renames: bool,
    skip: usize,
    remaining: Option<usize>,
    cancel: CancellationToken,
    done: bool,
}

impl<'a, S: ObjectStore + ?Sized> HistoryWalker<'a, S> {
    pub fn new(store: &'a S, options: &WalkOptions, cancel: CancellationToken) -> HistoryResult<Self> {
        let start = store.resolve(&options.start)?;
        let order = TopoOrder::load(store, start, &cancel)?;

        Ok(Self {
            store,
            order,
            filter: options
                .path_filter
                .as_ref()
                .map(|path| PathFilter::new(path.clone(), options.follow_renames)),
            detect_renames: options.needs_rename_detection(),
            skip: options.offset,
            remaining: (options.limit > 0).then_some(options.limit),
            cancel,
            done: false,
        })
    }

    /// number of commits reachable from the start
    pub fn reachable(&self) -> usize {
        self.order.len()
    }

    fn is_candidate(&mut self, commit: &CommitInfo) -> HistoryResult<bool> {
        let Some(filter) = self.filter.as_mut() else {
            return Ok(true);
        };

        let parent_tree = match commit.first_parent() {
            Some(parent) => match self.order.get(&parent) {
                Some(info) => Some(info.tree_id),
                None => Some(self.store.commit(parent)?.tree_id),
            },
            None => None,
        };
        let changes = self.store.diff(parent_tree, commit.tree_id, self.detect_renames)?;
        Ok(filter.matches(&changes))
    }

    fn advance(&mut self) -> HistoryResult<Option<CommitInfo>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }

        while let Some(commit) = self.order.pop() {
            if self.cancel.is_cancelled() {
                return Err(HistoryError::Cancelled);
            }
            if !self.is_candidate(&commit)? {
                continue;
            }
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            return Ok(Some(commit));
        }
        Ok(None)
    }
}

impl<S: ObjectStore + ?Sized> Iterator for HistoryWalker<'_, S> {
    type Item = HistoryResult<CommitInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(commit)) => Some(Ok(commit)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
