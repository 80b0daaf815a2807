//! Lazily loaded, memoized file contents for one session.
//!
//! A [`Snapshot`] never reads the file until its text is asked for, then
//! keeps that text until it is disposed. Disposal also removes it from the
//! owning [`SnapshotCache`], so the next lookup builds a fresh one.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::diagnostic::LineIndex;
use crate::error::Error;
use crate::resolver::normalize;
use crate::vfs::Vfs;

/// Every snapshot reports this version; files are not re-versioned
/// within one run.
pub const SCRIPT_VERSION: &str = "1";

struct Loaded {
    text: Arc<str>,
    lines: Option<Arc<LineIndex>>,
}

pub struct Snapshot {
    path: PathBuf,
    vfs: Arc<dyn Vfs>,
    loaded: Mutex<Option<Loaded>>,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("path", &self.path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl Snapshot {
    fn new(path: PathBuf, vfs: Arc<dyn Vfs>) -> Self {
        Self {
            path,
            vfs,
            loaded: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> &'static str {
        SCRIPT_VERSION
    }

    /// Whether the content has been read (and not disposed since).
    pub fn is_loaded(&self) -> bool {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn with_loaded<T>(&self, f: impl FnOnce(&mut Loaded) -> T) -> Result<T, Error> {
        let mut slot = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        let mut loaded = match slot.take() {
            Some(loaded) => loaded,
            None => {
                let text = self
                    .vfs
                    .read_to_string(&self.path)
                    .map_err(|e| Error::FileRead(self.path.clone(), e))?;
                Loaded {
                    text: text.into(),
                    lines: None,
                }
            }
        };
        let out = f(&mut loaded);
        *slot = Some(loaded);
        Ok(out)
    }

    /// Full text of the file.
    pub fn text(&self) -> Result<Arc<str>, Error> {
        self.with_loaded(|l| Arc::clone(&l.text))
    }

    /// Byte length of the file. Before the text is read this comes from
    /// metadata, so asking for the size alone does not load the file.
    pub fn len(&self) -> Result<usize, Error> {
        if let Some(loaded) = &*self.loaded.lock().unwrap_or_else(PoisonError::into_inner) {
            return Ok(loaded.text.len());
        }
        let meta = self
            .vfs
            .metadata(&self.path)
            .map_err(|e| Error::FileRead(self.path.clone(), e))?;
        usize::try_from(meta.len)
            .map_err(|e| Error::FileRead(self.path.clone(), io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        self.len().map(|n| n == 0)
    }

    /// Text between byte offsets `start` and `end`, clamped to the file and
    /// widened outwards to character boundaries.
    pub fn get_text(&self, start: usize, end: usize) -> Result<String, Error> {
        self.with_loaded(|l| {
            let text = &*l.text;
            let mut start = start.min(text.len());
            let mut end = end.clamp(start, text.len());
            while !text.is_char_boundary(start) {
                start -= 1;
            }
            while !text.is_char_boundary(end) {
                end += 1;
            }
            text[start..end].to_string()
        })
    }

    /// Position table for offset to line/column conversion, built on first
    /// use and kept with the text.
    pub fn line_index(&self) -> Result<Arc<LineIndex>, Error> {
        self.with_loaded(|l| {
            let text = Arc::clone(&l.text);
            Arc::clone(
                l.lines
                    .get_or_insert_with(|| Arc::new(LineIndex::new(text))),
            )
        })
    }

    /// Drop the cached text; the next access re-reads the file.
    fn dispose(&self) {
        *self.loaded.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// A session's snapshot table, keyed by normalized absolute path.
pub struct SnapshotCache {
    vfs: Arc<dyn Vfs>,
    table: Mutex<HashMap<PathBuf, Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        Self {
            vfs,
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot for `path`, creating it on first request. `Ok(None)` when no
    /// such file exists. Never reads the content.
    pub fn get(&self, path: &Path) -> Result<Option<Arc<Snapshot>>, Error> {
        let key = normalize(path);
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = table.get(&key) {
            return Ok(Some(Arc::clone(existing)));
        }
        if !self.vfs.file_exists(&key)? {
            return Ok(None);
        }
        let snapshot = Arc::new(Snapshot::new(key.clone(), Arc::clone(&self.vfs)));
        table.insert(key, Arc::clone(&snapshot));
        Ok(Some(snapshot))
    }

    /// Forget `path`: clear its text and remove it from the table. Returns
    /// whether a snapshot existed.
    pub fn dispose(&self, path: &Path) -> bool {
        let key = normalize(path);
        let removed = self
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        match removed {
            Some(snapshot) => {
                snapshot.dispose();
                debug!(path = %key.display(), "disposed snapshot");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
