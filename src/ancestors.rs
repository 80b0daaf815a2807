//! Walks a directory and its ancestors up to the filesystem root.

use std::path::{Path, PathBuf};

use crate::vfs::Vfs;

/// A directory followed by each of its ancestors, nearest first.
///
/// Holds nothing but the starting directory, so cloning it restarts the
/// walk. Always terminates at the filesystem root.
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    next: Option<&'a Path>,
}

impl<'a> Ancestors<'a> {
    pub fn new(dir: &'a Path) -> Self {
        Self { next: Some(dir) }
    }
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Path;

    fn next(&mut self) -> Option<&'a Path> {
        let current = self.next?;
        self.next = match current.parent() {
            // "" is the parent of a bare relative name; stop there.
            Some(parent) if !parent.as_os_str().is_empty() && parent != current => Some(parent),
            _ => None,
        };
        Some(current)
    }
}

impl std::iter::FusedIterator for Ancestors<'_> {}

/// Start an ancestor walk at `dir`.
pub fn ancestors(dir: &Path) -> Ancestors<'_> {
    Ancestors::new(dir)
}

/// Find the nearest `file_name` in `dir` or one of its ancestors.
pub fn find_up(vfs: &dyn Vfs, dir: &Path, file_name: &str) -> Option<PathBuf> {
    ancestors(dir)
        .map(|d| d.join(file_name))
        .find(|candidate| vfs.is_file(candidate))
}
