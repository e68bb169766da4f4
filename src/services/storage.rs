use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Process-local directory for transient uploaded and generated files.
///
/// Created once at startup and never torn down; concurrent requests share it
/// and rely on the uuid prefix in [`allocate`](Self::allocate) for isolation.
/// Handed to the intake validator and materializer explicitly so tests can
/// substitute an isolated temporary area.
pub struct StorageArea {
    root: PathBuf,
}

impl StorageArea {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create storage area at {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns a path for the given original name that is unique within the
    /// area, across concurrent requests included.
    pub fn allocate(&self, original_name: &str) -> PathBuf {
        self.root
            .join(format!("{}_{}", Uuid::new_v4(), original_name))
    }

    /// Deletes the file if present. Idempotent: an already-removed path is
    /// not an error, and any other failure is logged and swallowed so cleanup
    /// never masks the primary error of a request.
    pub fn release(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

/// Per-request scoped-acquisition list: every stored path a request creates
/// is pushed here and released exactly once when the guard drops, whichever
/// stage terminated the request.
pub struct ReleaseGuard {
    area: Arc<StorageArea>,
    paths: Vec<PathBuf>,
}

impl ReleaseGuard {
    pub fn new(area: Arc<StorageArea>) -> Self {
        Self {
            area,
            paths: Vec::new(),
        }
    }

    pub fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            self.area.release(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_is_unique() {
        let dir = tempfile::tempdir().unwrap();
        let area = StorageArea::new(dir.path()).unwrap();

        let a = area.allocate("report.xlsx");
        let b = area.allocate("report.xlsx");
        assert_ne!(a, b);
        assert!(a.starts_with(dir.path()));
    }

    #[test]
    fn test_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let area = StorageArea::new(dir.path()).unwrap();

        let path = area.allocate("a.xlsx");
        std::fs::write(&path, b"data").unwrap();
        area.release(&path);
        assert!(!path.exists());

        // Second release of the same path must not panic or error
        area.release(&path);
    }

    #[test]
    fn test_release_does_not_affect_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let area = StorageArea::new(dir.path()).unwrap();

        let keep = area.allocate("keep.xlsx");
        let drop_me = area.allocate("drop.xlsx");
        std::fs::write(&keep, b"keep").unwrap();
        std::fs::write(&drop_me, b"drop").unwrap();

        area.release(&drop_me);
        assert!(keep.exists());
        assert!(!drop_me.exists());
    }

    #[test]
    fn test_guard_releases_everything_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let area = Arc::new(StorageArea::new(dir.path()).unwrap());

        let first = area.allocate("one.xlsx");
        let second = area.allocate("two.xlsx");
        std::fs::write(&first, b"1").unwrap();
        std::fs::write(&second, b"2").unwrap();

        {
            let mut guard = ReleaseGuard::new(area.clone());
            guard.push(first.clone());
            guard.push(second.clone());
        }

        assert!(!first.exists());
        assert!(!second.exists());
    }
}
