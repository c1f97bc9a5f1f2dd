//! QR polling protocol (fresh login)
//!
//! Samples the login page for a QR code, emits every new code, and finishes
//! once the app's main UI shows up. Consecutive misses are bounded by
//! `max_retries`; every `reload_every`-th consecutive miss reloads the page.

use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::qr::{read_qr, QrSnapshot};
use super::traits::AuthenticatedSession;
use crate::browser::{BrowserSession, Page};
use crate::config::ClientOptions;
use crate::events::{Notifier, Payload, QR};
use crate::{Error, Result};

/// Run `fut` unless `cancel` fires first
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// Close a browser a strategy is giving up on
pub(crate) async fn release(browser: &dyn BrowserSession) {
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser {}: {}", browser.id(), e);
    }
}

/// Open a page in `browser` and pair it through the QR flow
///
/// The browser is closed when pairing fails.
pub(crate) async fn login_with_qr(
    browser: Arc<dyn BrowserSession>,
    options: &ClientOptions,
    notifier: &Notifier,
    cancel: &CancellationToken,
) -> Result<AuthenticatedSession> {
    let paired = async {
        let page = browser.new_page().await?;
        pair_with_qr(page.as_ref(), options, notifier, cancel).await?;
        Ok::<_, Error>(page)
    };

    match paired.await {
        Ok(page) => Ok(AuthenticatedSession { page, browser }),
        Err(e) => {
            release(browser.as_ref()).await;
            Err(e)
        }
    }
}

/// Pair `page` through the QR flow
///
/// Returns once the loaded-UI selector matches. Fails with
/// [`Error::QrExhausted`] after `max_retries` consecutive QR misses.
#[instrument(skip_all, fields(url = %options.web_url))]
pub async fn pair_with_qr(
    page: &dyn Page,
    options: &ClientOptions,
    notifier: &Notifier,
    cancel: &CancellationToken,
) -> Result<()> {
    info!("Opening {}", options.web_url);
    cancellable(cancel, page.navigate(&options.web_url)).await?;

    let mut last_qr: Option<QrSnapshot> = None;
    let mut retry: u32 = 0;

    loop {
        let probe = read_qr(
            page,
            &options.qr_selector,
            &options.qr_attribute,
            options.qr_probe_timeout(),
        );

        match cancellable(cancel, probe).await? {
            Some(qr) => {
                retry = 0;

                if last_qr.as_ref() == Some(&qr) {
                    debug!("QR code unchanged");
                } else {
                    info!("Emitting new QR code");
                    if let Err(e) = notifier.emit(QR, &Payload::Qr(qr.clone())) {
                        warn!("QR delivery incomplete: {}", e);
                    }
                    last_qr = Some(qr);
                }

                // A present QR answers the probe at once
                let pause = async {
                    tokio::time::sleep(options.qr_poll_interval()).await;
                    Ok::<_, Error>(())
                };
                cancellable(cancel, pause).await?;
            }
            None => {
                retry += 1;
                warn!("QR code not found (attempt {}/{})", retry, options.max_retries);

                if retry.checked_rem(options.reload_every) == Some(0) {
                    info!("Reloading page to try QR fetch again");
                    cancellable(cancel, page.reload()).await?;
                }

                // No QR on screen may mean the pairing already went through
                let loaded = page.wait_for_selector(&options.loaded_selector, options.loaded_probe_timeout());
                if cancellable(cancel, loaded).await?.is_some() {
                    info!("Main interface loaded");
                    return Ok(());
                }

                if retry >= options.max_retries {
                    let url = page.url().await.unwrap_or_else(|_| options.web_url.clone());
                    error!("Failed to find QR code after {} retries on {}", retry, url);
                    return Err(Error::QrExhausted { retries: retry, url });
                }

                debug!("Main interface not loaded yet");
            }
        }
    }
}
