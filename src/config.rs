//! Project configuration (`tsconfig.json`) and run options.
//!
//! A project is found by walking up from the linted file's directory to the
//! nearest `tsconfig.json`. The file is decoded into a raw serde form and
//! then validated into a [`ProjectConfig`], which owns the resolved compiler
//! options and knows how to enumerate the project's source files.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ancestors::{ancestors, find_up};
use crate::error::Error;
use crate::resolver::{AmbientTypes, ModuleKind, normalize};
use crate::search_paths::{DEPENDENCY_DIR, subtract_caller_chain};
use crate::vfs::Vfs;

pub const CONFIG_FILE: &str = "tsconfig.json";

const DEFAULT_INCLUDE: &str = "**/*";
const DEFAULT_EXCLUDE: &[&str] = &["node_modules", "bower_components", "jspm_packages"];
const TYPES_DIR: &str = "@types";

/// Nearest `tsconfig.json` at or above `start_dir`.
pub fn find_project_config(vfs: &dyn Vfs, start_dir: &Path) -> Option<PathBuf> {
    find_up(vfs, start_dir, CONFIG_FILE)
}

/// Language level the project compiles to. Selects the default library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ScriptTarget {
    Es3,
    #[default]
    Es5,
    Es2015,
    Es2016,
    Es2017,
    Es2018,
    Es2019,
    Es2020,
    Es2021,
    Es2022,
    EsNext,
}

impl ScriptTarget {
    /// Case-insensitive; `ES6` is accepted for `ES2015`.
    pub fn parse(raw: &str) -> Option<Self> {
        let target = match raw.trim().to_ascii_lowercase().as_str() {
            "es3" => Self::Es3,
            "es5" => Self::Es5,
            "es6" | "es2015" => Self::Es2015,
            "es2016" => Self::Es2016,
            "es2017" => Self::Es2017,
            "es2018" => Self::Es2018,
            "es2019" => Self::Es2019,
            "es2020" => Self::Es2020,
            "es2021" => Self::Es2021,
            "es2022" => Self::Es2022,
            "esnext" => Self::EsNext,
            _ => return None,
        };
        Some(target)
    }

    /// File name of the bundled standard library declaration for this target.
    pub fn default_lib_file_name(self) -> &'static str {
        match self {
            Self::Es3 | Self::Es5 => "lib.d.ts",
            Self::Es2015 => "lib.es6.d.ts",
            Self::Es2016 => "lib.es2016.full.d.ts",
            Self::Es2017 => "lib.es2017.full.d.ts",
            Self::Es2018 => "lib.es2018.full.d.ts",
            Self::Es2019 => "lib.es2019.full.d.ts",
            Self::Es2020 => "lib.es2020.full.d.ts",
            Self::Es2021 => "lib.es2021.full.d.ts",
            Self::Es2022 => "lib.es2022.full.d.ts",
            Self::EsNext => "lib.esnext.full.d.ts",
        }
    }
}

/// Validated compiler options. Only the options that drive resolution and
/// session setup are modelled; everything else in `compilerOptions` is
/// accepted and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerOptions {
    pub target: ScriptTarget,
    /// Allow-list of ambient type packages. `None` allows every package.
    pub types: Option<Vec<String>>,
    /// Absolute type roots. `None` means the default
    /// `node_modules/@types` chain.
    pub type_roots: Option<Vec<PathBuf>>,
    pub allow_js: bool,
    pub no_lib: bool,
    pub strict: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTsConfig {
    #[serde(default)]
    compiler_options: RawCompilerOptions,
    #[serde(default)]
    files: Option<Vec<String>>,
    #[serde(default)]
    include: Option<Vec<String>>,
    #[serde(default)]
    exclude: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompilerOptions {
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    types: Option<Vec<String>>,
    #[serde(default)]
    type_roots: Option<Vec<String>>,
    #[serde(default)]
    allow_js: Option<bool>,
    #[serde(default)]
    no_lib: Option<bool>,
    #[serde(default)]
    strict: Option<bool>,
}

/// A decoded, validated project configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config_path: PathBuf,
    pub root_dir: PathBuf,
    pub compiler_options: CompilerOptions,
    /// Explicit worklist from `files`, resolved against `root_dir`.
    pub files: Option<Vec<PathBuf>>,
    /// `include` patterns; `None` when only `files` was given.
    pub include: Option<Vec<String>>,
    pub exclude: Vec<String>,
}

impl ProjectConfig {
    /// Read and decode the config at `config_path`.
    pub fn load(vfs: &dyn Vfs, config_path: &Path) -> Result<Self, Error> {
        let text = vfs
            .read_to_string(config_path)
            .map_err(|e| Error::ConfigRead(config_path.to_path_buf(), e))?;
        Self::parse(config_path, &text)
    }

    /// Decode config text as if it were read from `config_path`.
    pub fn parse(config_path: &Path, text: &str) -> Result<Self, Error> {
        let raw: RawTsConfig = json5::from_str(text)
            .map_err(|e| Error::ConfigParse(config_path.to_path_buf(), e))?;
        let root_dir = config_path
            .parent()
            .map_or_else(|| PathBuf::from("/"), Path::to_path_buf);
        let invalid = |msg: String| Error::ConfigInvalid(config_path.to_path_buf(), msg);

        let opts = raw.compiler_options;
        let target = match opts.target.as_deref() {
            Some(raw) => ScriptTarget::parse(raw)
                .ok_or_else(|| invalid(format!("unknown compilerOptions.target '{raw}'")))?,
            None => ScriptTarget::default(),
        };
        let compiler_options = CompilerOptions {
            target,
            types: opts.types,
            type_roots: opts.type_roots.map(|roots| {
                roots
                    .iter()
                    .map(|r| resolve_relative_to(&root_dir, r))
                    .collect()
            }),
            allow_js: opts.allow_js.unwrap_or(false),
            no_lib: opts.no_lib.unwrap_or(false),
            strict: opts.strict.unwrap_or(false),
        };

        let files = raw.files.map(|files| {
            files
                .iter()
                .map(|f| resolve_relative_to(&root_dir, f))
                .collect::<Vec<_>>()
        });
        // `files` alone means no wildcard walk; neither means walk everything.
        let include = match (&files, raw.include) {
            (_, Some(include)) => Some(include),
            (Some(_), None) => None,
            (None, None) => Some(vec![DEFAULT_INCLUDE.to_string()]),
        };
        let exclude = raw
            .exclude
            .unwrap_or_else(|| DEFAULT_EXCLUDE.iter().map(|s| (*s).to_string()).collect());
        // Reject bad globs now; the real matcher is built per enumeration.
        if let Some(include) = &include {
            build_matcher(&root_dir, include, &exclude, &|_| false).map_err(invalid)?;
        }

        debug!(config = %config_path.display(), ?target, "loaded project config");
        Ok(Self {
            config_path: config_path.to_path_buf(),
            root_dir,
            compiler_options,
            files,
            include,
            exclude,
        })
    }

    /// Whether the project would compile `path` judging by extension alone.
    pub fn accepts_extension(&self, path: &Path) -> bool {
        match ModuleKind::from_path(path) {
            Some(kind) if kind.is_typed() => true,
            Some(ModuleKind::JavaScript | ModuleKind::Jsx) => self.compiler_options.allow_js,
            _ => false,
        }
    }

    /// The project's root file list: `files` first, then every file under
    /// the root matched by `include` and not by `exclude`. Sorted, deduped.
    ///
    /// `files` entries are kept as listed, present or not. The wildcard walk
    /// lists directories on the real filesystem, but pattern expansion and
    /// the kept entries are checked against `vfs`, so an entry the session
    /// cannot see is dropped.
    pub fn script_file_names(&self, vfs: &dyn Vfs) -> Vec<PathBuf> {
        let mut names: Vec<PathBuf> = self.files.clone().unwrap_or_default();
        if let Some(include) = &self.include {
            match build_matcher(&self.root_dir, include, &self.exclude, &|dir| vfs.is_dir(dir)) {
                Ok(matcher) => names.extend(self.walk(matcher, vfs)),
                Err(e) => warn!(config = %self.config_path.display(), error = %e, "skipping wildcard walk"),
            }
        }
        names.sort();
        names.dedup();
        names
    }

    fn walk(&self, matcher: Override, vfs: &dyn Vfs) -> Vec<PathBuf> {
        let walker = WalkBuilder::new(&self.root_dir)
            .standard_filters(false)
            .hidden(true)
            .overrides(matcher)
            .build();
        let mut found = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.into_path();
                    if self.accepts_extension(&path) && vfs.is_file(&path) {
                        found.push(path);
                    }
                }
                Err(e) => warn!(root = %self.root_dir.display(), error = %e, "skipping unreadable entry"),
            }
        }
        found
    }

    /// Type roots to search for ambient declaration packages, with the
    /// `types` allow-list. Default roots that do not exist are dropped.
    pub fn ambient_types(&self, vfs: &dyn Vfs) -> AmbientTypes {
        let roots = match &self.compiler_options.type_roots {
            Some(roots) => roots.clone(),
            None => ancestors(&self.root_dir)
                .map(|dir| dir.join(DEPENDENCY_DIR).join(TYPES_DIR))
                .filter(|dir| vfs.is_dir(dir))
                .collect(),
        };
        AmbientTypes {
            roots,
            allow: self.compiler_options.types.clone(),
        }
    }
}

fn resolve_relative_to(root: &Path, raw: &str) -> PathBuf {
    normalize(&root.join(raw))
}

fn has_glob_magic(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', ']'])
}

/// Turn one tsconfig pattern into a root-anchored gitignore-style glob.
/// A pattern naming a directory (as `is_dir` sees it) expands to everything
/// inside it.
fn anchor_pattern(root: &Path, pattern: &str, is_dir: &dyn Fn(&Path) -> bool) -> Option<String> {
    let trimmed = pattern.trim();
    let relative = match Path::new(trimmed).strip_prefix(root) {
        Ok(rel) => rel.to_str()?.to_string(),
        Err(_) if Path::new(trimmed).is_absolute() => return None,
        Err(_) => trimmed.trim_start_matches("./").to_string(),
    };
    let relative = relative.trim_end_matches('/');
    if relative.is_empty() {
        return Some(format!("/{DEFAULT_INCLUDE}"));
    }
    if !has_glob_magic(relative) && is_dir(&root.join(relative)) {
        return Some(format!("/{relative}/{DEFAULT_INCLUDE}"));
    }
    Some(if relative.starts_with("**") {
        relative.to_string()
    } else {
        format!("/{relative}")
    })
}

/// Whitelist `include`, then ignore `exclude`; later globs win, so an
/// excluded path stays excluded even when an include matches it.
fn build_matcher(
    root: &Path,
    include: &[String],
    exclude: &[String],
    is_dir: &dyn Fn(&Path) -> bool,
) -> Result<Override, String> {
    let mut builder = OverrideBuilder::new(root);
    for pattern in include {
        if let Some(glob) = anchor_pattern(root, pattern, is_dir) {
            builder
                .add(&glob)
                .map_err(|e| format!("invalid include pattern '{pattern}': {e}"))?;
        }
    }
    for pattern in exclude {
        let glob = if DEFAULT_EXCLUDE.contains(&pattern.as_str()) {
            // Dependency folders are skipped at any depth.
            Some(pattern.clone())
        } else {
            anchor_pattern(root, pattern, is_dir)
        };
        if let Some(glob) = glob {
            builder
                .add(&format!("!{glob}"))
                .map_err(|e| format!("invalid exclude pattern '{pattern}': {e}"))?;
        }
    }
    builder
        .build()
        .map_err(|e| format!("invalid file patterns: {e}"))
}

/// Options for one lint run, shared by every session.
#[derive(Debug, Clone, Default)]
pub struct LintOptions {
    /// Global library directories (`--global-path`, `NODE_PATH`).
    pub global_paths: Vec<PathBuf>,
    /// Directory of the running tool. Its own `node_modules` chain is not
    /// treated as global.
    pub tool_dir: Option<PathBuf>,
    /// Directory holding the bundled default library declarations.
    pub lib_dir: Option<PathBuf>,
    /// Diagnostic codes dropped after translation.
    pub ignore_codes: Vec<u32>,
}

impl LintOptions {
    /// Append the entries of a `NODE_PATH`-style variable.
    #[must_use]
    pub fn with_node_path(mut self, node_path: Option<&OsStr>) -> Self {
        if let Some(value) = node_path {
            self.global_paths
                .extend(std::env::split_paths(value).filter(|p| !p.as_os_str().is_empty()));
        }
        self
    }

    /// Global directories with the tool's own ancestor chain removed.
    pub fn global_search_paths(&self) -> Vec<PathBuf> {
        subtract_caller_chain(&self.global_paths, self.tool_dir.as_deref())
    }

    pub fn is_ignored(&self, code: u32) -> bool {
        self.ignore_codes.contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{MemoryVfs, OsVfs};
    use std::fs;

    fn parse(text: &str) -> Result<ProjectConfig, Error> {
        ProjectConfig::parse(Path::new("/proj/tsconfig.json"), text)
    }

    #[test]
    fn empty_compiler_options_use_defaults() {
        let cfg = parse(r#"{ "compilerOptions": {} }"#).unwrap();
        assert_eq!(cfg.root_dir, PathBuf::from("/proj"));
        assert_eq!(cfg.compiler_options, CompilerOptions::default());
        assert_eq!(cfg.compiler_options.target, ScriptTarget::Es5);
        assert_eq!(cfg.include.as_deref(), Some(&["**/*".to_string()][..]));
        assert_eq!(cfg.exclude.len(), 3);
    }

    #[test]
    fn comments_and_trailing_commas_are_accepted() {
        let cfg = parse(
            r#"{
                // build settings
                "compilerOptions": { "target": "es2017", "strict": true, },
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.compiler_options.target, ScriptTarget::Es2017);
        assert!(cfg.compiler_options.strict);
    }

    #[test]
    fn target_parsing() {
        assert_eq!(ScriptTarget::parse("ES6"), Some(ScriptTarget::Es2015));
        assert_eq!(ScriptTarget::parse("ESNext"), Some(ScriptTarget::EsNext));
        assert_eq!(ScriptTarget::parse("es1999"), None);
        assert_eq!(ScriptTarget::Es5.default_lib_file_name(), "lib.d.ts");
        assert_eq!(ScriptTarget::Es2015.default_lib_file_name(), "lib.es6.d.ts");
        assert_eq!(
            ScriptTarget::Es2020.default_lib_file_name(),
            "lib.es2020.full.d.ts"
        );
    }

    #[test]
    fn unknown_target_is_invalid() {
        let err = parse(r#"{ "compilerOptions": { "target": "es1999" } }"#).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(..)));
        assert!(err.to_string().contains("es1999"));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = parse(r#"{ "compilerOptions": "#).unwrap_err();
        assert!(matches!(err, Error::ConfigParse(..)));
        let err = parse(r#"{ "compilerOptions": { "types": "node" } }"#).unwrap_err();
        assert!(matches!(err, Error::ConfigParse(..)));
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let cfg = parse(
            r#"{ "compilerOptions": { "typeRoots": ["./typings", "../shared/types"] },
                 "files": ["src/main.ts"] }"#,
        )
        .unwrap();
        assert_eq!(
            cfg.compiler_options.type_roots,
            Some(vec![PathBuf::from("/proj/typings"), PathBuf::from("/shared/types")])
        );
        assert_eq!(cfg.files, Some(vec![PathBuf::from("/proj/src/main.ts")]));
        assert!(cfg.include.is_none());
    }

    #[test]
    fn default_type_roots_walk_ancestors() {
        let vfs = MemoryVfs::new()
            .with_file("/proj/node_modules/@types/node/index.d.ts", "")
            .with_file("/node_modules/@types/jest/index.d.ts", "");
        let cfg = ProjectConfig::parse(
            Path::new("/proj/tsconfig.json"),
            r#"{ "compilerOptions": { "types": ["node"] } }"#,
        )
        .unwrap();
        let ambient = cfg.ambient_types(&vfs);
        assert_eq!(
            ambient.roots,
            vec![
                PathBuf::from("/proj/node_modules/@types"),
                PathBuf::from("/node_modules/@types"),
            ]
        );
        assert!(ambient.allows("node"));
        assert!(!ambient.allows("jest"));
    }

    #[test]
    fn find_config_walks_up() {
        let vfs = MemoryVfs::new().with_file("/proj/tsconfig.json", "{}");
        assert_eq!(
            find_project_config(&vfs, Path::new("/proj/src/deep")),
            Some(PathBuf::from("/proj/tsconfig.json"))
        );
        assert_eq!(find_project_config(&vfs, Path::new("/other")), None);
    }

    #[test]
    fn script_files_honor_include_exclude_and_extensions() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        for file in [
            "src/a.ts",
            "src/b.tsx",
            "src/c.d.ts",
            "src/d.js",
            "src/gen/skip.ts",
            "node_modules/lib/index.d.ts",
            "scripts/tool.ts",
        ] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "").unwrap();
        }
        let config_path = root.join(CONFIG_FILE);
        fs::write(&config_path, r#"{ "include": ["src"], "exclude": ["src/gen"] }"#).unwrap();

        let cfg = ProjectConfig::load(&OsVfs, &config_path).unwrap();
        let names: Vec<String> = cfg
            .script_file_names(&OsVfs)
            .iter()
            .map(|p| p.strip_prefix(&root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["src/a.ts", "src/b.tsx", "src/c.d.ts"]);
    }

    #[test]
    fn default_walk_skips_dependency_folders_and_allows_js() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        for file in ["a.ts", "b.js", "node_modules/x/index.d.ts", "sub/node_modules/y.ts"] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "").unwrap();
        }
        let config_path = root.join(CONFIG_FILE);
        fs::write(&config_path, r#"{ "compilerOptions": { "allowJs": true } }"#).unwrap();

        let cfg = ProjectConfig::load(&OsVfs, &config_path).unwrap();
        assert_eq!(cfg.script_file_names(&OsVfs), vec![root.join("a.ts"), root.join("b.js")]);
    }

    #[test]
    fn walked_entries_must_be_visible_to_the_vfs() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        for file in ["src/a.ts", "src/b.ts"] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "").unwrap();
        }
        let config_path = root.join(CONFIG_FILE);
        let text = r#"{ "files": ["listed.ts"], "include": ["src"] }"#;
        let vfs = MemoryVfs::new()
            .with_file(config_path.clone(), text)
            .with_file(root.join("src/a.ts"), "");

        let cfg = ProjectConfig::load(&vfs, &config_path).unwrap();
        assert_eq!(
            cfg.script_file_names(&vfs),
            vec![root.join("listed.ts"), root.join("src/a.ts")]
        );
        assert_eq!(cfg.script_file_names(&MemoryVfs::new()), vec![root.join("listed.ts")]);
    }

    #[test]
    fn bad_glob_is_invalid_config() {
        let err = parse(r#"{ "include": ["src/[a"] }"#).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(..)));
    }

    #[test]
    fn lint_options_global_paths() {
        let joined = std::env::join_paths(["/usr/lib/node_modules", "/opt/tool/node_modules"]).unwrap();
        let opts = LintOptions {
            tool_dir: Some(PathBuf::from("/opt/tool")),
            ignore_codes: vec![7016],
            ..LintOptions::default()
        }
        .with_node_path(Some(&joined));
        assert_eq!(opts.global_search_paths(), vec![PathBuf::from("/usr/lib/node_modules")]);
        assert!(opts.is_ignored(7016));
        assert!(!opts.is_ignored(2307));
    }
}
