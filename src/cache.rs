//! Per-session memo of resolver results.
//!
//! Path specifiers are keyed by their normalized absolute target, so `./b`
//! from `/p` and `../b` from `/p/src` share one entry and one
//! [`ResolvedModule`] allocation. Bare specifiers depend on the search path
//! of the requesting directory and are keyed by (directory, specifier).
//! Misses are cached too; errors are not.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::error::Error;
use crate::resolver::{self, ResolvedModule};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Target(PathBuf),
    Bare(PathBuf, String),
}

impl CacheKey {
    pub fn new(directory: &Path, specifier: &str) -> Self {
        if resolver::is_path_specifier(specifier) {
            Self::Target(resolver::normalize(&directory.join(specifier)))
        } else {
            Self::Bare(directory.to_path_buf(), specifier.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: Mutex<HashMap<CacheKey, Option<Arc<ResolvedModule>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result for `key`, or run `resolve` and remember what it returns.
    ///
    /// The lock is not held while `resolve` runs. If two threads race on the
    /// same key, the first insert wins and both get the same `Arc`.
    pub fn get_or_resolve(
        &self,
        key: CacheKey,
        resolve: impl FnOnce() -> Result<Option<ResolvedModule>, Error>,
    ) -> Result<Option<Arc<ResolvedModule>>, Error> {
        if let Some(cached) = self.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let fresh = resolve()?.map(Arc::new);
        trace!(?key, found = fresh.is_some(), "resolution cache miss");
        Ok(self.lock().entry(key).or_insert(fresh).clone())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Option<Arc<ResolvedModule>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
