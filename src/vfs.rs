//! Virtual filesystem abstraction for resolution and snapshot loading.
//!
//! The [`Vfs`] trait abstracts filesystem access so the resolver, snapshot
//! cache and config loader can run against the real filesystem ([`OsVfs`])
//! or an in-memory tree ([`MemoryVfs`]) in tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::Error;

/// Metadata returned by [`Vfs::metadata`].
pub struct VfsMetadata {
    pub len: u64,
    pub is_file: bool,
    pub is_dir: bool,
}

/// Filesystem abstraction for resolution and snapshot loading.
///
/// All methods mirror their `std::fs` counterparts. Implementations must be
/// safe to call from multiple threads concurrently.
pub trait Vfs: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    fn metadata(&self, path: &Path) -> io::Result<VfsMetadata>;

    /// Is `path` a regular file? Not-found is `Ok(false)`; only exceptional
    /// failures (permission denied, disk errors) become [`Error::Stat`].
    fn file_exists(&self, path: &Path) -> Result<bool, Error> {
        match self.metadata(path) {
            Ok(meta) => Ok(meta.is_file),
            Err(e) if is_absent(&e) => Ok(false),
            Err(e) => Err(Error::Stat(path.to_path_buf(), e)),
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        self.metadata(path).is_ok_and(|m| m.is_file)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.metadata(path).is_ok_and(|m| m.is_dir)
    }
}

/// Errors that mean "nothing there" rather than "something went wrong".
fn is_absent(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Pass-through to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsVfs;

impl Vfs for OsVfs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<VfsMetadata> {
        std::fs::metadata(path).map(|m| VfsMetadata {
            len: m.len(),
            is_file: m.is_file(),
            is_dir: m.is_dir(),
        })
    }
}

/// In-memory file tree. Directories are implied by the files beneath them.
///
/// Paths are stored as given; callers are expected to use absolute,
/// normalized paths.
#[derive(Debug, Default)]
pub struct MemoryVfs {
    files: Mutex<HashMap<PathBuf, String>>,
    failures: Mutex<HashMap<PathBuf, io::ErrorKind>>,
}

impl MemoryVfs {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.write(path, content);
        self
    }

    /// Make every access to `path` fail with `kind`.
    #[must_use]
    pub fn with_failure(self, path: impl Into<PathBuf>, kind: io::ErrorKind) -> Self {
        self.fail(path, kind);
        self
    }

    /// Make every later access to `path` fail with `kind`.
    pub fn fail(&self, path: impl Into<PathBuf>, kind: io::ErrorKind) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), kind);
    }

    /// Undo an earlier [`MemoryVfs::fail`] for `path`.
    pub fn clear_failure(&self, path: impl AsRef<Path>) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path.as_ref());
    }

    /// Create or overwrite a file.
    pub fn write(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), content.into());
    }

    fn check_failure(&self, path: &Path) -> io::Result<()> {
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        match failures.get(path) {
            Some(&kind) => Err(io::Error::new(kind, format!("{}", path.display()))),
            None => Ok(()),
        }
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not in memory tree", path.display()),
        )
    }
}

impl Vfs for MemoryVfs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.check_failure(path)?;
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        files.get(path).cloned().ok_or_else(|| Self::not_found(path))
    }

    fn metadata(&self, path: &Path) -> io::Result<VfsMetadata> {
        self.check_failure(path)?;
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(content) = files.get(path) {
            return Ok(VfsMetadata {
                len: content.len() as u64,
                is_file: true,
                is_dir: false,
            });
        }
        if files.keys().any(|f| f.starts_with(path)) {
            return Ok(VfsMetadata {
                len: 0,
                is_file: false,
                is_dir: true,
            });
        }
        Err(Self::not_found(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_vfs_reads_file() {
        let vfs = OsVfs;
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        let content = vfs.read_to_string(&path).unwrap();
        assert!(content.contains("typelint"));
        assert!(vfs.file_exists(&path).unwrap());
    }

    #[test]
    fn os_vfs_dir_is_not_a_file() {
        let vfs = OsVfs;
        let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
        assert!(vfs.is_dir(&src));
        assert!(!vfs.is_file(&src));
        assert!(!vfs.file_exists(&src).unwrap());
    }

    #[test]
    fn os_vfs_nonexistent_is_absent_not_error() {
        let vfs = OsVfs;
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("nonexistent.xyz");
        assert!(!vfs.file_exists(&path).unwrap());
        assert!(vfs.read_to_string(&path).is_err());
    }

    #[test]
    fn os_vfs_file_used_as_directory_is_absent() {
        let vfs = OsVfs;
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml/inner.ts");
        assert!(!vfs.file_exists(&path).unwrap());
    }

    #[test]
    fn memory_vfs_implies_directories() {
        let vfs = MemoryVfs::new().with_file("/p/src/a.ts", "x");
        assert!(vfs.is_file(Path::new("/p/src/a.ts")));
        assert!(vfs.is_dir(Path::new("/p/src")));
        assert!(vfs.is_dir(Path::new("/p")));
        assert!(!vfs.is_file(Path::new("/p/src")));
        assert_eq!(vfs.metadata(Path::new("/p/src/a.ts")).unwrap().len, 1);
    }

    #[test]
    fn memory_vfs_failure_propagates_as_stat_error() {
        let vfs = MemoryVfs::new()
            .with_file("/p/a.ts", "")
            .with_failure("/p/a.ts", io::ErrorKind::PermissionDenied);
        let err = vfs.file_exists(Path::new("/p/a.ts")).unwrap_err();
        assert!(matches!(err, Error::Stat(..)));
    }
}
