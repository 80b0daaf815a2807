//! Process-wide table of live sessions, one per discovered project config.
//!
//! A session is created on first request and kept for the rest of the run.
//! A config that fails to decode is reported to the caller and not stored,
//! so the next visit retries it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::config::{LintOptions, ProjectConfig};
use crate::diagnostic::Diagnostic;
use crate::engine::{Engine, EngineFactory};
use crate::error::Error;
use crate::host::{LanguageServiceHost, SessionHost};
use crate::resolver::normalize;
use crate::vfs::Vfs;

/// A project's host plus the engine built around it.
pub struct Session {
    config_path: PathBuf,
    host: Arc<SessionHost>,
    engine: Box<dyn Engine>,
    diagnostics: Mutex<HashMap<PathBuf, Arc<[Diagnostic]>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config_path", &self.config_path)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn host(&self) -> &Arc<SessionHost> {
        &self.host
    }

    /// Engine diagnostics for `file`, computed once per session.
    pub fn diagnostics(&self, file: &Path) -> Result<Arc<[Diagnostic]>, Error> {
        let key = normalize(file);
        if let Some(cached) = self.lock().get(&key) {
            return Ok(Arc::clone(cached));
        }
        let fresh: Arc<[Diagnostic]> = self.engine.diagnostics(&key)?.into();
        self.lock().insert(key, Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Forget `file`'s snapshot and cached diagnostics.
    pub fn release(&self, file: &Path) -> bool {
        let key = normalize(file);
        self.lock().remove(&key);
        self.engine.release(&key);
        self.host.release_snapshot(&key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<[Diagnostic]>>> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sessions keyed by config path.
pub struct SessionRegistry {
    vfs: Arc<dyn Vfs>,
    factory: Box<dyn EngineFactory>,
    options: LintOptions,
    global_paths: Vec<PathBuf>,
    sessions: Mutex<HashMap<PathBuf, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(vfs: Arc<dyn Vfs>, factory: Box<dyn EngineFactory>, options: LintOptions) -> Self {
        let global_paths = options.global_search_paths();
        Self {
            vfs,
            factory,
            options,
            global_paths,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &LintOptions {
        &self.options
    }

    /// The session for `config_path`, building it on first request.
    ///
    /// A cached session is returned as-is even if the config has changed on
    /// disk since it was built.
    pub fn get_or_create(
        &self,
        config_path: &Path,
        project_root: &Path,
    ) -> Result<Arc<Session>, Error> {
        let key = normalize(config_path);
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = sessions.get(&key) {
            return Ok(Arc::clone(session));
        }

        let config = ProjectConfig::load(self.vfs.as_ref(), &key).inspect_err(|e| {
            warn!(config = %key.display(), error = %e, "cannot load project config");
        })?;
        let lib_dir = self
            .options
            .lib_dir
            .clone()
            .or_else(|| self.factory.bundled_lib_dir());
        let host = Arc::new(SessionHost::new(
            config,
            &normalize(project_root),
            Arc::clone(&self.vfs),
            self.global_paths.clone(),
            lib_dir,
        ));
        let engine = self
            .factory
            .create(Arc::clone(&host) as Arc<dyn LanguageServiceHost>)?;
        let session = Arc::new(Session {
            config_path: key.clone(),
            host,
            engine,
            diagnostics: Mutex::new(HashMap::new()),
        });
        debug!(config = %key.display(), "created session");
        sessions.insert(key, Arc::clone(&session));
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
