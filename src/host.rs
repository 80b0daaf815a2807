//! The callback surface a type-checking engine drives, and the per-project
//! host that answers it.
//!
//! An engine never touches the filesystem directly. It asks the host for
//! compiler settings, the root file list, file snapshots and module
//! resolutions; the host answers from its caches.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::cache::{CacheKey, CacheStats, ResolutionCache};
use crate::config::{CompilerOptions, ProjectConfig};
use crate::error::Error;
use crate::resolver::{self, AmbientTypes, ModuleResolver, ResolvedModule};
use crate::search_paths::SearchPaths;
use crate::snapshot::{SCRIPT_VERSION, Snapshot, SnapshotCache};
use crate::vfs::Vfs;

/// What a type-checking engine may ask of its host.
pub trait LanguageServiceHost: Send + Sync {
    fn compilation_settings(&self) -> &CompilerOptions;

    /// The project's root files, fixed for the session.
    fn script_file_names(&self) -> &[PathBuf];

    /// Constant: files are not re-versioned within one run.
    fn script_version(&self, path: &Path) -> &str;

    /// `Ok(None)` when the file does not exist.
    fn script_snapshot(&self, path: &Path) -> Result<Option<Arc<Snapshot>>, Error>;

    /// The bundled standard library declaration for `settings.target`, or
    /// `None` when no library directory is known.
    fn default_library_file_name(&self, settings: &CompilerOptions) -> Option<PathBuf>;

    /// Resolve each of `specifiers` as written in `containing_file`. The
    /// result has one entry per specifier, `None` where nothing matched.
    fn resolve_module_names(
        &self,
        specifiers: &[String],
        containing_file: &Path,
        settings: &CompilerOptions,
    ) -> Result<Vec<Option<Arc<ResolvedModule>>>, Error>;

    fn current_directory(&self) -> &Path;

    /// Whether `path` exists as a regular file.
    fn file_exists(&self, path: &Path) -> Result<bool, Error>;

    /// Drop the snapshot of `path` so the next request re-reads it.
    fn release_snapshot(&self, path: &Path) -> bool;
}

/// Host for one discovered project. Owns the project's config and every
/// per-session cache.
pub struct SessionHost {
    config: ProjectConfig,
    vfs: Arc<dyn Vfs>,
    snapshots: SnapshotCache,
    resolutions: ResolutionCache,
    resolver: ModuleResolver,
    search_paths: SearchPaths,
    ambient: AmbientTypes,
    lib_dir: Option<PathBuf>,
    file_names: OnceLock<Vec<PathBuf>>,
}

impl std::fmt::Debug for SessionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHost")
            .field("config_path", &self.config.config_path)
            .field("snapshots", &self.snapshots.len())
            .field("resolutions", &self.resolutions.len())
            .finish_non_exhaustive()
    }
}

impl SessionHost {
    /// `global_paths` must already exclude the caller's own dependency
    /// chain. The search-path chain above `project_root` is computed here,
    /// once.
    pub fn new(
        config: ProjectConfig,
        project_root: &Path,
        vfs: Arc<dyn Vfs>,
        global_paths: Vec<PathBuf>,
        lib_dir: Option<PathBuf>,
    ) -> Self {
        let ambient = config.ambient_types(vfs.as_ref());
        debug!(
            config = %config.config_path.display(),
            type_roots = ambient.roots.len(),
            global_paths = global_paths.len(),
            "creating session host"
        );
        Self {
            snapshots: SnapshotCache::new(Arc::clone(&vfs)),
            resolutions: ResolutionCache::new(),
            resolver: ModuleResolver::new(Arc::clone(&vfs)),
            search_paths: SearchPaths::new(project_root, global_paths),
            ambient,
            lib_dir,
            file_names: OnceLock::new(),
            config,
            vfs,
        }
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn search_paths(&self) -> &SearchPaths {
        &self.search_paths
    }

    pub fn resolution_stats(&self) -> CacheStats {
        self.resolutions.stats()
    }

    /// Resolve one specifier written in `containing_file`, through the
    /// session's resolution cache.
    pub fn resolve_module_name(
        &self,
        specifier: &str,
        containing_file: &Path,
    ) -> Result<Option<Arc<ResolvedModule>>, Error> {
        let directory = resolver::normalize(containing_file.parent().unwrap_or(Path::new("/")));
        let key = CacheKey::new(&directory, specifier);
        self.resolutions.get_or_resolve(key, || {
            if resolver::is_path_specifier(specifier) {
                return self.resolver.resolve(&directory, specifier, &[], None);
            }
            let roots = self.search_paths.for_directory(&directory);
            self.resolver
                .resolve(&directory, specifier, &roots, Some(&self.ambient))
        })
    }
}

impl LanguageServiceHost for SessionHost {
    fn compilation_settings(&self) -> &CompilerOptions {
        &self.config.compiler_options
    }

    fn script_file_names(&self) -> &[PathBuf] {
        self.file_names.get_or_init(|| {
            let names = self.config.script_file_names(self.vfs.as_ref());
            debug!(config = %self.config.config_path.display(), files = names.len(), "enumerated project files");
            names
        })
    }

    fn script_version(&self, _path: &Path) -> &str {
        SCRIPT_VERSION
    }

    fn script_snapshot(&self, path: &Path) -> Result<Option<Arc<Snapshot>>, Error> {
        self.snapshots.get(path)
    }

    fn default_library_file_name(&self, settings: &CompilerOptions) -> Option<PathBuf> {
        self.lib_dir
            .as_ref()
            .map(|dir| dir.join(settings.target.default_lib_file_name()))
    }

    fn resolve_module_names(
        &self,
        specifiers: &[String],
        containing_file: &Path,
        _settings: &CompilerOptions,
    ) -> Result<Vec<Option<Arc<ResolvedModule>>>, Error> {
        specifiers
            .iter()
            .map(|spec| self.resolve_module_name(spec, containing_file))
            .collect()
    }

    fn current_directory(&self) -> &Path {
        &self.config.root_dir
    }

    fn file_exists(&self, path: &Path) -> Result<bool, Error> {
        self.vfs.file_exists(path)
    }

    fn release_snapshot(&self, path: &Path) -> bool {
        self.snapshots.dispose(path)
    }
}
