//! Package manifests and bare-specifier naming helpers.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::trace;

use crate::vfs::Vfs;

pub const MANIFEST_FILE: &str = "package.json";

/// Prefix that pins a specifier to the runtime's own modules.
pub const NODE_SCHEME: &str = "node:";

/// The fields of a `package.json` that resolution cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub main: Option<PathBuf>,
    pub types: Option<PathBuf>,
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    main: Option<serde_json::Value>,
    #[serde(default)]
    types: Option<serde_json::Value>,
    #[serde(default)]
    typings: Option<serde_json::Value>,
}

fn string_field(value: Option<serde_json::Value>) -> Option<PathBuf> {
    match value? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(PathBuf::from(s)),
        _ => None,
    }
}

impl PackageDescriptor {
    /// Read `dir/package.json`. Any read or parse failure is "no manifest".
    pub fn load(vfs: &dyn Vfs, dir: &Path) -> Option<Self> {
        let path = dir.join(MANIFEST_FILE);
        let content = vfs.read_to_string(&path).ok()?;
        let raw: RawManifest = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                trace!(path = %path.display(), error = %e, "ignoring malformed manifest");
                return None;
            }
        };
        Some(Self {
            main: string_field(raw.main),
            types: string_field(raw.types).or_else(|| string_field(raw.typings)),
        })
    }
}

const NODE_BUILTINS: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// Node built-in modules are declared ambiently and never live on disk.
pub fn is_node_builtin(specifier: &str) -> bool {
    if let Some(stripped) = specifier.strip_prefix(NODE_SCHEME) {
        let (name, _) = split_package_specifier(stripped);
        // `node:test` has no unprefixed form.
        return NODE_BUILTINS.contains(&name) || name == "test";
    }
    let (name, _) = split_package_specifier(specifier);
    NODE_BUILTINS.contains(&name)
}

/// `(package name, subpath)`: `@babel/core/lib` is `("@babel/core", Some("lib"))`,
/// `react` is `("react", None)`.
pub fn split_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    if let Some(scoped) = specifier.strip_prefix('@') {
        if let Some(first_slash) = scoped.find('/') {
            let after_name = &scoped[first_slash + 1..];
            if let Some(second_slash) = after_name.find('/') {
                let pkg_end = 1 + first_slash + 1 + second_slash;
                return (&specifier[..pkg_end], Some(&specifier[pkg_end + 1..]));
            }
        }
        (specifier, None)
    } else if let Some(slash) = specifier.find('/') {
        (&specifier[..slash], Some(&specifier[slash + 1..]))
    } else {
        (specifier, None)
    }
}

/// Name of the ambient type package for a specifier, relative to a type
/// root. Scoped packages are mangled: "@scope/name/sub" -> "scope__name/sub".
pub fn types_package_path(specifier: &str) -> String {
    let (name, subpath) = split_package_specifier(specifier);
    let mangled = match name.strip_prefix('@') {
        Some(scoped) => scoped.replacen('/', "__", 1),
        None => name.to_string(),
    };
    match subpath {
        Some(sub) => format!("{mangled}/{sub}"),
        None => mangled,
    }
}

/// Package owning a file under the innermost `node_modules` of `path`.
pub fn package_name_from_path(path: &Path) -> Option<String> {
    let components: Vec<&str> = path
        .components()
        .map(|c| c.as_os_str().to_str().unwrap_or(""))
        .collect();

    let nm_idx = components.iter().rposition(|c| *c == "node_modules")?;

    if nm_idx + 1 >= components.len() {
        return None;
    }

    let first = components[nm_idx + 1];
    if first.starts_with('.') {
        return None;
    }

    if first.starts_with('@') {
        if nm_idx + 2 < components.len() {
            Some(format!("{}/{}", first, components[nm_idx + 2]))
        } else {
            None
        }
    } else {
        Some(first.to_string())
    }
}
