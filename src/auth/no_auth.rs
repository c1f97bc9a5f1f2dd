//! Fresh-login strategy: a throwaway browser paired by QR on every start

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::polling::login_with_qr;
use super::traits::{AuthStrategy, AuthenticatedSession};
use crate::browser::BrowserLauncher;
use crate::config::ClientOptions;
use crate::events::Notifier;
use crate::Result;

/// QR login without persisted state
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl NoAuth {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuthStrategy for NoAuth {
    fn name(&self) -> &'static str {
        "NoAuth"
    }

    async fn authenticate(
        &self,
        options: &ClientOptions,
        launcher: &dyn BrowserLauncher,
        notifier: &Notifier,
        cancel: &CancellationToken,
    ) -> Result<AuthenticatedSession> {
        info!("Starting NoAuth authentication (QR required)");

        let browser = launcher.launch(options.headless).await?;

        match login_with_qr(browser, options, notifier, cancel).await {
            Ok(session) => {
                info!("NoAuth authentication successful");
                Ok(session)
            }
            Err(e) => {
                error!("NoAuth authentication failed: {}", e);
                Err(e)
            }
        }
    }
}
