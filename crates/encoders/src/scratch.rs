//! Request-scoped scratch directories.
//!
//! Each codec run gets its own directory under the configured root, so
//! concurrent runs never share file paths. The directory is removed when the
//! `ScratchSpace` drops, on success, failure, timeout, and cancellation alike.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a fresh, uniquely named directory under `root`.
    pub fn create(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("tf-").tempdir_in(root)?;
        tracing::trace!(path = %dir.path().display(), "Scratch directory created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Check that `root` accepts new scratch directories.
    pub fn probe(root: &Path) -> std::io::Result<PathBuf> {
        let space = Self::create(root)?;
        let marker = space.file("probe");
        std::fs::write(&marker, b"ok")?;
        Ok(root.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_unique_and_removed() {
        let root = tempfile::tempdir().unwrap();
        let a = ScratchSpace::create(root.path()).unwrap();
        let b = ScratchSpace::create(root.path()).unwrap();
        assert_ne!(a.path(), b.path());

        std::fs::write(a.file("input.pdf"), b"%PDF").unwrap();
        let a_path = a.path().to_path_buf();
        drop(a);
        assert!(!a_path.exists());
        assert!(b.path().exists());
    }

    #[test]
    fn creates_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("deep").join("er");
        let space = ScratchSpace::create(&nested).unwrap();
        assert!(space.path().starts_with(&nested));
    }

    #[test]
    fn probe_leaves_nothing_behind() {
        let root = tempfile::tempdir().unwrap();
        ScratchSpace::probe(root.path()).unwrap();
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
