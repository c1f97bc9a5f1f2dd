//! On-disk session store
//!
//! One browser profile directory per (root, session id). The store only knows
//! whether the directory exists; its contents belong to the browser.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::Result;

/// Location of one persisted session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStore {
    dir: String,
    session_id: String,
}

impl SessionStore {
    /// Create a store for `session_id` under `dir`
    ///
    /// Trailing separators of `dir` are normalized and path separators are
    /// stripped from `session_id`.
    pub fn new(dir: &str, session_id: &str) -> Self {
        Self {
            dir: format!("{}/", dir.trim_end_matches(['/', '\\'])),
            session_id: session_id.replace(['/', '\\'], ""),
        }
    }

    /// Normalized root directory, with one trailing separator
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Sanitized session identifier
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Profile directory: `<dir>/<session_id>-session/`
    pub fn filepath(&self) -> String {
        format!("{}{}-session/", self.dir, self.session_id)
    }

    /// Profile directory as a path
    pub fn path(&self) -> PathBuf {
        PathBuf::from(self.filepath())
    }

    /// Whether a persisted profile exists
    pub fn exists(&self) -> bool {
        Path::new(&self.filepath()).exists()
    }

    /// Delete the persisted profile; a missing directory is not an error
    pub async fn delete(&self) -> Result<()> {
        let path = self.filepath();
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!("Removed session directory {}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Session directory {} already absent", path);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
