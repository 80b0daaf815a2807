//! Module specifier resolution.
//!
//! Resolution runs in two phases. The typed phase looks for `.ts`, `.tsx`
//! and `.d.ts` files (including manifest type entries and `index` files);
//! only when every typed candidate misses does the script phase look for
//! `.js`, `.jsx` and `.json`. For bare specifiers the typed phase covers all
//! search roots and ambient type roots before any script is considered, so
//! a declaration anywhere on the search path shadows a compiled script.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::trace;

use crate::error::Error;
use crate::package::{self, PackageDescriptor};
use crate::vfs::Vfs;

/// Extensions tried in the typed phase, in order.
pub const TYPED_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".d.ts"];
/// Extensions tried in the script phase, in order.
pub const SCRIPT_EXTENSIONS: &[&str] = &[".js", ".jsx", ".json"];

/// What kind of file a resolution landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    TypeScript,
    Tsx,
    Declaration,
    JavaScript,
    Jsx,
    Json,
}

impl ModuleKind {
    /// Classify a path by its extension. `None` for files resolution never
    /// hands to the engine.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts") {
            return Some(Self::Declaration);
        }
        match path.extension()?.to_str()? {
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "js" | "mjs" | "cjs" => Some(Self::JavaScript),
            "jsx" => Some(Self::Jsx),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Carries type information (typed source or declaration).
    pub fn is_typed(self) -> bool {
        matches!(self, Self::TypeScript | Self::Tsx | Self::Declaration)
    }
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedModule {
    pub resolved_path: PathBuf,
    pub kind: ModuleKind,
    pub is_external: bool,
    /// Package that owns the file, for files inside a `node_modules` tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
}

impl ResolvedModule {
    fn new(resolved_path: PathBuf, kind: ModuleKind, is_external: bool) -> Self {
        let package_name = if is_external {
            package::package_name_from_path(&resolved_path)
        } else {
            None
        };
        Self {
            resolved_path,
            kind,
            is_external,
            package_name,
        }
    }
}

/// Global type-declaration roots (e.g. `node_modules/@types`) and the
/// optional allow-list of package names that may be looked up in them.
#[derive(Debug, Clone, Default)]
pub struct AmbientTypes {
    pub roots: Vec<PathBuf>,
    pub allow: Option<Vec<String>>,
}

impl AmbientTypes {
    /// Whether `specifier` may be looked up in the ambient roots.
    pub fn allows(&self, specifier: &str) -> bool {
        let Some(allow) = &self.allow else {
            return true;
        };
        let (name, _) = package::split_package_specifier(specifier);
        allow.iter().any(|a| a == name)
    }
}

/// `./x`, `../x`, `.`, `..`, and absolute paths resolve against the
/// filesystem; everything else is a bare package specifier.
pub fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with('.') || specifier.starts_with('/') || Path::new(specifier).is_absolute()
}

/// Lexically normalize a path: drop `.` segments and fold `..` into the
/// preceding segment. Does not touch the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` above the root stays at the root.
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

/// Append `ext` to the final path segment (`a/b` + `.ts` -> `a/b.ts`).
fn with_suffix(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(ext);
    PathBuf::from(s)
}

/// `a/b.js` -> `a/b`, so `./b.js` can land on `b.ts`.
fn strip_script_extension(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name
        .strip_suffix(".js")
        .or_else(|| name.strip_suffix(".jsx"))?;
    Some(path.with_file_name(stem))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Typed,
    Script,
}

impl Phase {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Typed => TYPED_EXTENSIONS,
            Self::Script => SCRIPT_EXTENSIONS,
        }
    }

    fn accepts(self, kind: ModuleKind) -> bool {
        match self {
            Self::Typed => kind.is_typed(),
            Self::Script => !kind.is_typed(),
        }
    }
}

/// Resolves specifiers against a [`Vfs`]. Package manifests are read once
/// per directory and kept for the resolver's lifetime.
pub struct ModuleResolver {
    vfs: Arc<dyn Vfs>,
    manifests: Mutex<HashMap<PathBuf, Option<Arc<PackageDescriptor>>>>,
}

impl std::fmt::Debug for ModuleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleResolver").finish_non_exhaustive()
    }
}

impl ModuleResolver {
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        Self {
            vfs,
            manifests: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `specifier` as written in a file inside `directory`.
    ///
    /// Bare specifiers are looked up under each of `search_roots` in order
    /// (see [`crate::search_paths`]) and then in the ambient type roots.
    /// `Ok(None)` means nothing matched, which is a normal outcome.
    pub fn resolve(
        &self,
        directory: &Path,
        specifier: &str,
        search_roots: &[PathBuf],
        ambient: Option<&AmbientTypes>,
    ) -> Result<Option<ResolvedModule>, Error> {
        if specifier.is_empty() {
            return Ok(None);
        }
        if is_path_specifier(specifier) {
            let target = normalize(&directory.join(specifier));
            return self.resolve_target(&target, false);
        }
        // `node:` names the runtime's own modules; nothing on disk matches.
        if specifier.starts_with(package::NODE_SCHEME) {
            return Ok(None);
        }
        self.resolve_bare(specifier, search_roots, ambient)
    }

    /// Resolve an absolute, normalized target path through both phases.
    /// `is_external` marks global or ambient lookups.
    pub fn resolve_target(
        &self,
        target: &Path,
        is_external: bool,
    ) -> Result<Option<ResolvedModule>, Error> {
        for phase in [Phase::Typed, Phase::Script] {
            if let Some((path, kind)) = self.lookup(target, phase)? {
                trace!(target = %target.display(), resolved = %path.display(), "resolved path");
                return Ok(Some(ResolvedModule::new(path, kind, is_external)));
            }
        }
        Ok(None)
    }

    fn resolve_bare(
        &self,
        specifier: &str,
        search_roots: &[PathBuf],
        ambient: Option<&AmbientTypes>,
    ) -> Result<Option<ResolvedModule>, Error> {
        for root in search_roots {
            if let Some(hit) = self.lookup(&root.join(specifier), Phase::Typed)? {
                return Ok(Some(self.external(specifier, hit)));
            }
        }
        if let Some(ambient) = ambient.filter(|a| a.allows(specifier)) {
            let types_path = package::types_package_path(specifier);
            for root in &ambient.roots {
                if let Some(hit) = self.lookup(&root.join(&types_path), Phase::Typed)? {
                    return Ok(Some(self.external(specifier, hit)));
                }
            }
        }
        for root in search_roots {
            if let Some(hit) = self.lookup(&root.join(specifier), Phase::Script)? {
                return Ok(Some(self.external(specifier, hit)));
            }
        }
        Ok(None)
    }

    fn external(&self, specifier: &str, (path, kind): (PathBuf, ModuleKind)) -> ResolvedModule {
        trace!(specifier, resolved = %path.display(), "resolved package");
        ResolvedModule::new(path, kind, true)
    }

    /// One phase against one target: the file itself (plus extensions),
    /// then the manifest entry, then the `index` convention file.
    fn lookup(&self, target: &Path, phase: Phase) -> Result<Option<(PathBuf, ModuleKind)>, Error> {
        if let Some(hit) = self.with_extensions(target, phase)? {
            return Ok(Some(hit));
        }
        if phase == Phase::Typed
            && let Some(stem) = strip_script_extension(target)
            && let Some(hit) = self.with_extensions(&stem, phase)?
        {
            return Ok(Some(hit));
        }
        if let Some(manifest) = self.manifest(target) {
            let entry = match phase {
                Phase::Typed => manifest.types.as_deref(),
                Phase::Script => manifest.main.as_deref(),
            };
            if let Some(entry) = entry {
                let entry = normalize(&target.join(entry));
                if let Some(hit) = self.with_extensions(&entry, phase)? {
                    return Ok(Some(hit));
                }
                if let Some(hit) = self.with_extensions(&entry.join("index"), phase)? {
                    return Ok(Some(hit));
                }
            }
        }
        self.with_extensions(&target.join("index"), phase)
    }

    /// `path` itself when it already has an extension of this phase, then
    /// `path` + each extension of this phase.
    fn with_extensions(&self, path: &Path, phase: Phase) -> Result<Option<(PathBuf, ModuleKind)>, Error> {
        if let Some(kind) = ModuleKind::from_path(path)
            && phase.accepts(kind)
            && self.vfs.file_exists(path)?
        {
            return Ok(Some((path.to_path_buf(), kind)));
        }
        for ext in phase.extensions() {
            let candidate = with_suffix(path, ext);
            if self.vfs.file_exists(&candidate)? {
                let kind = ModuleKind::from_path(&candidate).unwrap_or(ModuleKind::JavaScript);
                return Ok(Some((candidate, kind)));
            }
        }
        Ok(None)
    }

    fn manifest(&self, dir: &Path) -> Option<Arc<PackageDescriptor>> {
        let mut manifests = self.manifests.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = manifests.get(dir) {
            return cached.clone();
        }
        let loaded = PackageDescriptor::load(self.vfs.as_ref(), dir).map(Arc::new);
        manifests.insert(dir.to_path_buf(), loaded.clone());
        loaded
    }
}
