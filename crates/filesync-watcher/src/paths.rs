//! The set of roots watched by one session.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use filesync_core::error::{AppError, ErrorKind};
use filesync_core::result::AppResult;

/// Absolute paths watched by a single session. Owned by that session only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchPaths {
    paths: BTreeSet<PathBuf>,
}

impl WatchPaths {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `path` absolute against the current directory without touching
    /// the filesystem.
    pub fn absolute(path: impl AsRef<Path>) -> AppResult<PathBuf> {
        std::path::absolute(path.as_ref()).map_err(|e| {
            AppError::with_source(
                ErrorKind::Watcher,
                format!("Cannot resolve watch path {}", path.as_ref().display()),
                e,
            )
        })
    }

    /// Add a path. Returns `false` if it was already present.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        self.paths.insert(path)
    }

    /// Remove a path. Returns `false` if it was not present.
    pub fn remove(&mut self, path: &Path) -> bool {
        self.paths.remove(path)
    }

    /// Whether `path` is watched.
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Iterate watched paths in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    /// Number of watched paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether nothing is watched.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
