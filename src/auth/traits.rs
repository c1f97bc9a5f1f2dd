//! Authentication strategy trait

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::browser::{BrowserLauncher, BrowserSession, Page};
use crate::config::ClientOptions;
use crate::events::Notifier;
use crate::Result;

/// A logged-in page and the browser that owns it
///
/// Ownership passes to the caller, which closes both when done.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    /// Page showing the app's main UI
    pub page: Arc<dyn Page>,
    /// Browser the page lives in
    pub browser: Arc<dyn BrowserSession>,
}

/// Authentication strategy
///
/// On failure a strategy has already closed every browser it launched.
#[async_trait]
pub trait AuthStrategy: Send + Sync + std::fmt::Debug {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Launch a browser and bring a page to the logged-in state
    async fn authenticate(
        &self,
        options: &ClientOptions,
        launcher: &dyn BrowserLauncher,
        notifier: &Notifier,
        cancel: &CancellationToken,
    ) -> Result<AuthenticatedSession>;

    /// Forget persisted credentials; the client is already stopped
    async fn logout(&self) -> Result<()> {
        Ok(())
    }
}
