//! Expand command-line paths into the files to lint.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::warn;

use crate::error::Error;
use crate::resolver::ModuleKind;

const SKIP_DIRS: &[&str] = &["node_modules", ".git"];

fn is_lintable(path: &Path) -> bool {
    ModuleKind::from_path(path).is_some_and(|kind| kind != ModuleKind::Json)
}

/// Walk `root` for lintable files (respects .gitignore, skips dependency
/// and VCS directories).
fn discover_source_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| SKIP_DIRS.contains(&n)))
        })
        .build();

    for entry in walker {
        match entry {
            Ok(entry) => {
                let path = entry.into_path();
                if path.is_file() && is_lintable(&path) {
                    files.push(path);
                }
            }
            Err(e) => warn!(root = %root.display(), error = %e, "skipping unreadable entry"),
        }
    }
    files
}

/// Files named directly are kept when lintable; directories are walked.
/// Paths are made absolute against the current directory. Sorted, deduped.
pub fn discover_lint_targets(paths: &[PathBuf]) -> Result<Vec<PathBuf>, Error> {
    let cwd = std::env::current_dir().map_err(|e| Error::Stat(PathBuf::from("."), e))?;
    let mut targets = Vec::new();
    for path in paths {
        let path = crate::resolver::normalize(&cwd.join(path));
        if path.is_dir() {
            targets.extend(discover_source_files(&path));
        } else if path.is_file() && is_lintable(&path) {
            targets.push(path);
        } else {
            warn!(path = %path.display(), "not a lintable file, skipping");
        }
    }
    targets.sort();
    targets.dedup();
    if targets.is_empty() {
        return Err(Error::NoInputs);
    }
    Ok(targets)
}
