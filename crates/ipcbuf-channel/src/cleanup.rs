//! Removal of filesystem entries created for a channel.

use std::io;
use std::path::{Path, PathBuf};

/// Unlinks its path when dropped. Missing paths are fine.
#[derive(Debug)]
pub struct PathGuard {
    path: PathBuf,
}

impl PathGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "cleanup failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_removes_file() {
        let path = std::env::temp_dir().join(format!("ipcbuf-guard-{}", std::process::id()));
        std::fs::write(&path, b"x").unwrap();
        {
            let guard = PathGuard::new(&path);
            assert_eq!(guard.path(), path.as_path());
        }
        assert!(!path.exists());
    }

    #[test]
    fn drop_tolerates_missing_path() {
        let path = std::env::temp_dir().join("ipcbuf-guard-never-created");
        drop(PathGuard::new(path));
    }
}
