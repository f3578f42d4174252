//! On-disk persistence of the auth session, so separate CLI invocations share
//! one sign-in.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::clients::backend::BackendError;
use crate::models::Session;

/// The file holds bearer tokens: owner read/write only.
#[cfg(unix)]
const SESSION_FILE_MODE: u32 = 0o600;

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/ndt-hours/session.json`, falling back to the working directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::data_dir().map_or_else(
            || PathBuf::from(".ndt-hours-session.json"),
            |dir| dir.join("ndt-hours").join("session.json"),
        )
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored session. A missing or unreadable file means signed out.
    pub fn load(&self) -> Result<Option<Session>, BackendError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), BackendError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(session)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(SESSION_FILE_MODE);
        }

        let mut file = options.open(&self.path)?;
        // `mode` only applies on creation; tighten a file left by an older run too.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(SESSION_FILE_MODE))?;
        }
        file.write_all(content.as_bytes())?;

        debug!("Session saved to: {}", self.path.display());
        Ok(())
    }

    pub fn clear(&self) -> Result<(), BackendError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
