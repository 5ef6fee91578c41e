//! Repository handle configuration.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use crate::archive::ArchiveFormat;
use crate::repo::api::{RepoError, RepoResult};

/// Environment variable naming the repository to open.
pub const REPO_ENV: &str = "GITSNAP_REPO";
/// Environment variable naming the archive storage directory.
pub const STORAGE_ENV: &str = "GITSNAP_STORAGE_PATH";

/// Repository configuration options.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Path to the repository (bare or with a work tree).
    pub path: PathBuf,
    /// Directory archives are written under.
    pub storage_path: PathBuf,
    /// Whether walks pair deletes with adds by default.
    pub detect_renames: bool,
    /// Compressor argv per tar format, replacing the built-in table.
    pub compressor_overrides: HashMap<ArchiveFormat, Vec<String>>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            storage_path: default_storage_path(),
            detect_renames: false,
            compressor_overrides: HashMap::new(),
        }
    }
}

impl RepoConfig {
    /// Create a new configuration for the repository at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Configuration from `GITSNAP_REPO` and `GITSNAP_STORAGE_PATH`.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var_os(key).map(PathBuf::from))
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let mut config = Self::default();
        if let Some(path) = lookup(REPO_ENV) {
            config.path = path;
        }
        if let Some(storage) = lookup(STORAGE_ENV) {
            config.storage_path = storage;
        }
        config
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    pub fn detect_renames(mut self, value: bool) -> Self {
        self.detect_renames = value;
        self
    }

    /// Replace the compressor for a tar format.
    pub fn compressor(mut self, format: ArchiveFormat, argv: Vec<String>) -> Self {
        self.compressor_overrides.insert(format, argv);
        self
    }

    /// Check the configuration before anything is opened.
    pub fn validate(&self) -> RepoResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(RepoError::InvalidConfig("repository path is empty".to_string()));
        }
        if self.storage_path.as_os_str().is_empty() {
            return Err(RepoError::InvalidConfig("storage path is empty".to_string()));
        }
        for (format, argv) in &self.compressor_overrides {
            if !format.is_tar() {
                return Err(RepoError::InvalidConfig(format!(
                    "{} archives are not piped through a compressor",
                    format
                )));
            }
            if argv.first().map_or(true, |program| program.is_empty()) {
                return Err(RepoError::InvalidConfig(format!(
                    "empty compressor command for {}",
                    format
                )));
            }
        }
        Ok(())
    }
}

fn default_storage_path() -> PathBuf {
    env::temp_dir().join("gitsnap-archives")
}
