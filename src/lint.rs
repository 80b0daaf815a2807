//! One file visit: find the project, get its session, translate what the
//! engine says about the file.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{LintOptions, find_project_config};
use crate::diagnostic::{Category, NodeRef, Report, translate};
use crate::engine::EngineFactory;
use crate::error::Error;
use crate::host::LanguageServiceHost;
use crate::registry::SessionRegistry;
use crate::resolver::normalize;
use crate::vfs::Vfs;

/// Code used for reports that do not come from the engine.
pub const INTERNAL_CODE: u32 = 0;

pub struct Linter {
    vfs: Arc<dyn Vfs>,
    registry: SessionRegistry,
}

impl Linter {
    pub fn new(vfs: Arc<dyn Vfs>, factory: Box<dyn EngineFactory>, options: LintOptions) -> Self {
        Self {
            registry: SessionRegistry::new(Arc::clone(&vfs), factory, options),
            vfs,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Reports for one file. A file outside any project yields nothing.
    /// Failures become a single report on the file; nothing here aborts
    /// the run.
    pub fn lint_file(&self, file: &Path) -> Vec<Report> {
        let file = normalize(file);
        let node = NodeRef { file: file.clone() };
        let Some(dir) = file.parent() else {
            return Vec::new();
        };
        let Some(config_path) = find_project_config(self.vfs.as_ref(), dir) else {
            debug!(file = %file.display(), "no enclosing project, skipping");
            return Vec::new();
        };
        let project_root = config_path.parent().unwrap_or(dir);

        match self.check(&file, &config_path, project_root, &node) {
            Ok(reports) => reports,
            Err(e) => {
                if !e.is_config_error() {
                    warn!(file = %file.display(), error = %e, "type information unavailable");
                }
                vec![Report::on_node(
                    &node,
                    Category::Error,
                    INTERNAL_CODE,
                    e.to_string(),
                )]
            }
        }
    }

    fn check(
        &self,
        file: &Path,
        config_path: &Path,
        project_root: &Path,
        node: &NodeRef,
    ) -> Result<Vec<Report>, Error> {
        let session = self.registry.get_or_create(config_path, project_root)?;
        let diagnostics = session.diagnostics(file)?;
        let host = session.host();
        let options = self.registry.options();
        Ok(diagnostics
            .iter()
            .filter(|d| !options.is_ignored(d.code))
            .map(|d| {
                translate(d, node, |path| {
                    let snapshot = host.script_snapshot(path).ok().flatten()?;
                    snapshot.line_index().ok()
                })
            })
            .collect())
    }
}
