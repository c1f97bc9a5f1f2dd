//! Session validation protocol (persisted profile)
//!
//! Only a QR prompt proves that a persisted session expired. A probe timeout
//! never does; running out of attempts leaves the outcome unresolved.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::polling::cancellable;
use crate::browser::Page;
use crate::config::ClientOptions;
use crate::Result;

/// Outcome of a session check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    /// The main UI rendered on attempt `attempt`
    Valid { attempt: u32 },
    /// The app asked to pair again
    Expired,
    /// Neither a QR prompt nor the main UI appeared
    Unresolved { attempts: u32 },
}

/// Decide whether the profile behind `page` is still logged in
///
/// Makes up to `session_max_retries + 1` attempts and reloads between them.
#[instrument(skip_all, fields(url = %options.web_url))]
pub async fn check_session(page: &dyn Page, options: &ClientOptions, cancel: &CancellationToken) -> Result<SessionCheck> {
    cancellable(cancel, page.navigate(&options.web_url)).await?;

    let attempts = options.session_max_retries.saturating_add(1);
    let timeout = options.session_probe_timeout();

    for attempt in 1..=attempts {
        let qr = page.wait_for_selector(&options.qr_selector, timeout);
        if cancellable(cancel, qr).await?.is_some() {
            warn!("Local session expired: QR prompt on attempt {}", attempt);
            return Ok(SessionCheck::Expired);
        }
        debug!("No QR prompt on attempt {}/{}", attempt, attempts);

        let loaded = page.wait_for_selector(&options.loaded_selector, timeout);
        if cancellable(cancel, loaded).await?.is_some() {
            info!("Local session loaded on attempt {}", attempt);
            return Ok(SessionCheck::Valid { attempt });
        }

        if attempt < attempts {
            debug!("Page not loaded yet on attempt {}; reloading", attempt);
            cancellable(cancel, page.reload()).await?;
        }
    }

    warn!("Local session unresolved after {} attempts", attempts);
    Ok(SessionCheck::Unresolved { attempts })
}
