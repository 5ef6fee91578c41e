//! Walk options.

/// What to walk and which window of it to return.
///
/// ```ignore
/// let opts = WalkOptions::new("master")
///     .path("src/lib.rs")
///     .follow_renames(true)
///     .offset(20)
///     .limit(20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    /// ref or sha the walk starts from
    pub start: String,
    /// max commits to return, 0 means all of them
    pub limit: usize,
    /// matching commits to skip before the first one returned
    pub offset: usize,
    /// only commits touching paths under this prefix
    pub path_filter: Option<String>,
    /// keep tracking the filtered path across exact renames
    pub follow_renames: bool,
    /// pair deletes with adds when diffing
    pub detect_renames: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self::new("HEAD")
    }
}

impl WalkOptions {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            limit: 0,
            offset: 0,
            path_filter: None,
            follow_renames: false,
            detect_renames: false,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path_filter = Some(path.into());
        self
    }

    pub fn follow_renames(mut self, follow: bool) -> Self {
        self.follow_renames = follow;
        self
    }

    pub fn detect_renames(mut self, detect: bool) -> Self {
        self.detect_renames = detect;
        self
    }

    /// following needs renames detected, whatever `detect_renames` says
    pub(crate) fn needs_rename_detection(&self) -> bool {
        self.detect_renames || (self.follow_renames && self.path_filter.is_some())
    }
}
