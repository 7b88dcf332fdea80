//! Wiring of configuration, session storage and the authenticator

use crate::error::{CliError, CliResult};
use directories::ProjectDirs;
use fleetdesk_core::{Config, SessionConfig, SystemClock};
use fleetdesk_session::{Authenticator, FileStore, HttpAuthBackend, SessionManager};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

const SESSION_FILE: &str = "session.json";

/// Everything a command needs
#[derive(Debug)]
pub(crate) struct App {
    pub(crate) config: Config,
    pub(crate) sessions: SessionManager,
    pub(crate) auth: Arc<Authenticator>,
}

impl App {
    pub(crate) fn build(config: Config) -> CliResult<Self> {
        let path = session_path(&config.session)?;
        debug!(path = %path.display(), "session file");

        let sessions = SessionManager::new(Arc::new(FileStore::open(path)?))?;
        let backend = Arc::new(HttpAuthBackend::new(&config.api)?);
        let auth = Arc::new(Authenticator::new(
            backend,
            sessions.clone(),
            Arc::new(SystemClock),
            config.auth.clone(),
        ));

        Ok(Self {
            config,
            sessions,
            auth,
        })
    }
}

/// Configured session file, or `session.json` in the platform data directory
pub(crate) fn session_path(config: &SessionConfig) -> CliResult<PathBuf> {
    if let Some(path) = &config.path {
        return Ok(path.clone());
    }
    ProjectDirs::from("com", "fleetdesk", "fleetdesk")
        .map(|dirs| dirs.data_dir().join(SESSION_FILE))
        .ok_or(CliError::NoDataDir)
}
