//! Scoped scrape directories.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A unique directory owned by one iteration.
///
/// Dropping the workspace removes it, so failed and cancelled iterations leave
/// nothing behind. Successful iterations call [`IterationWorkspace::close`].
#[derive(Debug)]
pub struct IterationWorkspace {
    dir: TempDir,
}

impl IterationWorkspace {
    /// Create a fresh directory under `root`, creating `root` if needed.
    ///
    /// # Errors
    /// Fails if `root` cannot be created or is not writable.
    pub fn create(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("iteration-").tempdir_in(root)?;
        tracing::debug!("Created iteration workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory that scrapes for `query` are written to.
    pub fn query_dir(&self, query: &str) -> PathBuf {
        self.path().join(directory_name(query))
    }

    /// Remove the workspace after a successful post.
    pub fn close(self) {
        cleanup(self.dir.path());
    }
}

/// Recursively delete `dir`. Failures are logged and otherwise ignored.
///
/// Returns whether the directory is gone afterwards.
pub fn cleanup(dir: &Path) -> bool {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            tracing::debug!("Removed {}", dir.display());
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!("Failed to remove {}: {}", dir.display(), e);
            false
        }
    }
}

/// Turn a free-text query into a single safe path component.
fn directory_name(query: &str) -> String {
    let name: String = query
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match name.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => name,
    }
}
