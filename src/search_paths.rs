//! Ordered directory lists for bare-specifier lookup.
//!
//! Nearer dependency directories shadow farther ones, and every
//! project-local directory shadows the global library directories.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::ancestors::ancestors;

/// Name of the per-directory dependency folder.
pub const DEPENDENCY_DIR: &str = "node_modules";

/// Search paths for one project. The chain above the project root is
/// computed once; per-directory lists are memoized.
#[derive(Debug)]
pub struct SearchPaths {
    project_root: PathBuf,
    above_root: Vec<PathBuf>,
    global: Vec<PathBuf>,
    memo: Mutex<HashMap<PathBuf, Arc<[PathBuf]>>>,
}

impl SearchPaths {
    /// `global` should already have the caller's own chain removed
    /// (see [`subtract_caller_chain`]).
    pub fn new(project_root: &Path, global: Vec<PathBuf>) -> Self {
        let above_root = project_root
            .parent()
            .map(|parent| ancestors(parent).map(|d| d.join(DEPENDENCY_DIR)).collect())
            .unwrap_or_default();
        Self {
            project_root: project_root.to_path_buf(),
            above_root,
            global,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Directories to search for a bare specifier written in a file in
    /// `containing_dir`: its own chain up to the project root, then the
    /// chain above the project root, then the global directories.
    pub fn for_directory(&self, containing_dir: &Path) -> Arc<[PathBuf]> {
        let mut memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = memo.get(containing_dir) {
            return Arc::clone(cached);
        }
        let built: Arc<[PathBuf]> = self.build(containing_dir).into();
        memo.insert(containing_dir.to_path_buf(), Arc::clone(&built));
        built
    }

    fn build(&self, containing_dir: &Path) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for dir in ancestors(containing_dir) {
            push_unique(&mut paths, &mut seen, dir.join(DEPENDENCY_DIR));
            if dir == self.project_root {
                break;
            }
        }
        for dir in &self.above_root {
            push_unique(&mut paths, &mut seen, dir.clone());
        }
        for dir in &self.global {
            push_unique(&mut paths, &mut seen, dir.clone());
        }
        paths
    }
}

fn push_unique(paths: &mut Vec<PathBuf>, seen: &mut HashSet<PathBuf>, path: PathBuf) {
    if seen.insert(path.clone()) {
        paths.push(path);
    }
}

/// Drop the dependency directories that belong to the caller's own location,
/// leaving only genuinely global library directories.
pub fn subtract_caller_chain(library_paths: &[PathBuf], caller_dir: Option<&Path>) -> Vec<PathBuf> {
    let own: HashSet<PathBuf> = caller_dir
        .map(|dir| ancestors(dir).map(|d| d.join(DEPENDENCY_DIR)).collect())
        .unwrap_or_default();
    library_paths
        .iter()
        .filter(|p| !own.contains(*p))
        .cloned()
        .collect()
}
