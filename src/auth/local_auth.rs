//! Persistent-session strategy
//!
//! Runs the browser on a profile directory kept by a [`SessionStore`]. A fresh
//! directory is paired by QR; an existing one is validated and, when the app
//! asks to pair again, deleted.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::polling::{login_with_qr, release};
use super::store::SessionStore;
use super::traits::{AuthStrategy, AuthenticatedSession};
use super::validation::{check_session, SessionCheck};
use crate::browser::{BrowserLauncher, BrowserSession};
use crate::config::ClientOptions;
use crate::events::Notifier;
use crate::{Error, Result};
use std::sync::Arc;

/// QR login persisted in a local browser profile
#[derive(Debug, Clone)]
pub struct LocalAuth {
    store: SessionStore,
}

impl LocalAuth {
    /// Persist session `session_id` under `dir`
    pub fn new(dir: &str, session_id: &str) -> Self {
        Self {
            store: SessionStore::new(dir, session_id),
        }
    }

    /// Use `auth_dir` and `session_id` from the options
    pub fn from_options(options: &ClientOptions) -> Self {
        Self::new(&options.auth_dir, &options.session_id)
    }

    /// Where the profile lives
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Validate an existing profile
    async fn restore(
        &self,
        browser: Arc<dyn BrowserSession>,
        options: &ClientOptions,
        cancel: &CancellationToken,
    ) -> Result<AuthenticatedSession> {
        let path = self.store.filepath();

        let checked = async {
            let page = browser.new_page().await?;
            let check = check_session(page.as_ref(), options, cancel).await?;
            Ok::<_, Error>((page, check))
        };

        match checked.await {
            Ok((page, SessionCheck::Valid { attempt })) => {
                debug!("Session at {} valid after {} attempt(s)", path, attempt);
                Ok(AuthenticatedSession { page, browser })
            }
            Ok((_, SessionCheck::Expired)) => {
                // The browser holds the profile open until it exits
                release(browser.as_ref()).await;
                if let Err(e) = self.store.delete().await {
                    warn!("Failed to remove expired session {}: {}", path, e);
                }
                Err(Error::SessionExpired { path })
            }
            Ok((_, SessionCheck::Unresolved { attempts })) => {
                release(browser.as_ref()).await;
                Err(Error::SessionLoadFailed { attempts, path })
            }
            Err(e) => {
                release(browser.as_ref()).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl AuthStrategy for LocalAuth {
    fn name(&self) -> &'static str {
        "LocalAuth"
    }

    async fn authenticate(
        &self,
        options: &ClientOptions,
        launcher: &dyn BrowserLauncher,
        notifier: &Notifier,
        cancel: &CancellationToken,
    ) -> Result<AuthenticatedSession> {
        info!("Starting LocalAuth authentication");

        let session_exists = self.store.exists();
        debug!("Session directory exists: {} at {}", session_exists, self.store.filepath());

        let browser = launcher
            .launch_persistent(&self.store.path(), options.headless)
            .await?;

        let result = if session_exists {
            info!("Loading existing session");
            self.restore(browser, options, cancel).await
        } else {
            info!("No existing session found; pairing by QR");
            login_with_qr(browser, options, notifier, cancel).await
        };

        if let Err(e) = &result {
            error!("LocalAuth authentication failed: {}", e);
        }
        result
    }

    async fn logout(&self) -> Result<()> {
        info!("Removing local session {}", self.store.filepath());
        self.store.delete().await
    }
}
