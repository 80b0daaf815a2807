//! Type-checking engine adapters.
//!
//! An engine is a black box: it is built around a [`LanguageServiceHost`],
//! calls back into it for settings, file text and module resolution, and
//! hands back [`Diagnostic`]s for one file at a time.

pub mod imports;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::diagnostic::Diagnostic;
use crate::error::Error;
use crate::host::LanguageServiceHost;

pub use imports::{ImportCheckEngine, ImportCheckFactory};

/// One live engine session bound to a single host.
pub trait Engine: Send + Sync {
    /// Syntactic and semantic diagnostics for `file`.
    fn diagnostics(&self, file: &Path) -> Result<Vec<Diagnostic>, Error>;

    /// The host has dropped `file`'s snapshot; forget anything derived from it.
    fn release(&self, _file: &Path) {}
}

/// Builds engines. One factory serves every session in a run.
pub trait EngineFactory: Send + Sync {
    fn create(&self, host: Arc<dyn LanguageServiceHost>) -> Result<Box<dyn Engine>, Error>;

    /// Directory of the standard library declarations shipped with the
    /// engine, if it ships any.
    fn bundled_lib_dir(&self) -> Option<PathBuf> {
        None
    }
}
