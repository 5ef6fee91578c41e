//! core type-safe wrappers around git primitives for the storage layer.

use std::fmt;
use std::fmt::Formatter;

use git2::Oid;
use serde::{Serialize, Serializer};

/// This makes sure we don't accidentally pass a blob ID where a commit ID
/// is expected. The inner Oid is only accessible within the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// raw Oid (for internal use only)
    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// parse CommitId from a hex string
    pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
        Oid::from_str(hex).map(CommitId)
    }

    /// short form of the commit ID
    pub fn short(&self) -> String {
        self.0.to_string()[..7].to_string()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for CommitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// Git blob identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId(pub(crate) Oid);

impl BlobId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Git tree identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(pub(crate) Oid);

impl TreeId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TreeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// The object a tree entry points at, before we know how to interpret it.
///
/// Its meaning depends on the entry's [`FileMode`]: a blob for files and
/// symlinks, a foreign commit for submodules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub(crate) Oid);

impl ObjectId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// File modes git records in tree entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    Regular,
    Executable,
    Symlink,
    /// gitlink: the entry names a commit of another repository
    Submodule,
    Tree,
}

impl FileMode {
    pub const REGULAR: i32 = 0o100644;
    pub const EXECUTABLE: i32 = 0o100755;
    pub const SYMLINK: i32 = 0o120000;
    pub const SUBMODULE: i32 = 0o160000;
    pub const TREE: i32 = 0o040000;

    /// map a raw tree entry mode; `None` for anything git wouldn't write
    pub fn from_raw(mode: i32) -> Option<Self> {
        match mode {
            Self::REGULAR | 0o100664 => Some(FileMode::Regular),
            Self::EXECUTABLE => Some(FileMode::Executable),
            Self::SYMLINK => Some(FileMode::Symlink),
            Self::SUBMODULE => Some(FileMode::Submodule),
            Self::TREE => Some(FileMode::Tree),
            _ => None,
        }
    }

    /// the raw mode as stored in the tree
    pub fn raw(&self) -> i32 {
        match self {
            FileMode::Regular => Self::REGULAR,
            FileMode::Executable => Self::EXECUTABLE,
            FileMode::Symlink => Self::SYMLINK,
            FileMode::Submodule => Self::SUBMODULE,
            FileMode::Tree => Self::TREE,
        }
    }

    /// unix permission bits used when the entry is written to an archive
    pub fn permissions(&self) -> u32 {
        match self {
            FileMode::Regular => 0o644,
            FileMode::Executable | FileMode::Submodule | FileMode::Tree => 0o755,
            FileMode::Symlink => 0o777,
        }
    }
}

/// One non-directory entry of a flattened tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// path relative to the tree root, `/`-separated
    pub path: String,
    pub mode: FileMode,
    pub object_id: ObjectId,
}

impl TreeEntry {
    pub fn new(path: impl Into<String>, mode: FileMode, object_id: ObjectId) -> Self {
        Self {
            path: path.into(),
            mode,
            object_id,
        }
    }

    /// check if this entry is a submodule (gitlink)
    pub fn is_submodule(&self) -> bool {
        self.mode == FileMode::Submodule
    }

    /// the blob holding this entry's content; `None` for submodules
    pub fn blob_id(&self) -> Option<BlobId> {
        match self.mode {
            FileMode::Submodule | FileMode::Tree => None,
            _ => Some(BlobId::new(self.object_id.0)),
        }
    }

    /// the commit a submodule entry is pinned to
    pub fn submodule_commit(&self) -> Option<CommitId> {
        self.is_submodule().then(|| CommitId::new(self.object_id.0))
    }
}

/// a validated branch name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchName(String);

impl BranchName {
    pub const PREFIX: &'static str = "refs/heads/";

    /// create a new BranchName
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        validate_ref_name(Self::PREFIX, &name)?;
        Ok(Self(name))
    }

    /// get the full ref path (e.g., "refs/heads/main")
    pub fn as_ref_path(&self) -> String {
        format!("{}{}", Self::PREFIX, self.0)
    }

    /// get the short name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// a validated tag name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagName(String);

impl TagName {
    pub const PREFIX: &'static str = "refs/tags/";

    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        validate_ref_name(Self::PREFIX, &name)?;
        Ok(Self(name))
    }

    pub fn as_ref_path(&self) -> String {
        format!("{}{}", Self::PREFIX, self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_ref_name(prefix: &str, name: &str) -> Result<(), InvalidNameError> {
    if name.is_empty() {
        return Err(InvalidNameError::Empty);
    }
    if name.len() > 255 {
        return Err(InvalidNameError::TooLong(name.len()));
    }
    if name.starts_with('-') {
        return Err(InvalidNameError::InvalidStart('-'));
    }
    // git is the authority on the remaining rules (`..`, `@{`, control chars, ...)
    if !git2::Reference::is_valid_name(&format!("{}{}", prefix, name)) {
        return Err(InvalidNameError::InvalidPath(name.to_string()));
    }
    Ok(())
}

/// git signature (tagger info for annotated tags)
#[derive(Debug, Clone)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
}

impl GitSignature {
    /// create a new signature
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// default signature for gitsnap operations
    pub fn gitsnap() -> Self {
        Self::new("gitsnap", "gitsnap@localhost")
    }

    /// convert to git2::Signature
    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

impl Default for GitSignature {
    fn default() -> Self {
        Self::gitsnap()
    }
}

/// error type for invalid ref names (branches, tags)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidStart(char),
    InvalidPath(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidStart(c) => write!(f, "name cannot start with '{}'", c),
            Self::InvalidPath(path) => write!(f, "invalid ref name: '{}'", path),
        }
    }
}

impl std::error::Error for InvalidNameError {}

/// represents one file-level change in a diff between two trees
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// path before the change (equals `new_path` unless renamed or copied)
    pub old_path: String,
    /// path after the change
    pub new_path: String,
    pub status: ChangeStatus,
    /// similarity detection paired a delete with an add
    pub renamed: bool,
}

/// the type of change in a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
    TypeChange,
    Other,
}
