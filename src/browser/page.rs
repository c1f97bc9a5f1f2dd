//! Page implementation over a CDP client

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::scripts;
use super::traits::{ElementHandle, Page};
use crate::cdp::{CdpClient, EvaluationResult};
use crate::Error;

/// Interval between selector probes
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the resource count must stay unchanged to call the network idle
const NETWORK_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Protocol errors Chrome returns while a navigation replaces the document
const CONTEXT_LOSS_MESSAGES: [&str; 2] = ["Execution context was destroyed", "Cannot find context"];

fn is_context_loss(error: &Error) -> bool {
    match error {
        Error::Cdp(msg) => CONTEXT_LOSS_MESSAGES.iter().any(|m| msg.contains(m)),
        _ => false,
    }
}

/// Page backed by a CDP client attached to one target
#[derive(Debug)]
pub struct CdpPage {
    id: String,
    cdp_client: Arc<dyn CdpClient>,
    is_active: AtomicBool,
}

impl CdpPage {
    /// Wrap an attached CDP client
    pub fn new(cdp_client: Arc<dyn CdpClient>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            cdp_client,
            is_active: AtomicBool::new(true),
        }
    }

    fn ensure_active(&self) -> Result<(), Error> {
        if self.is_active.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::page_not_found(&self.id))
        }
    }

    /// Evaluate a probe script; a script error or a lost execution context
    /// while the document is being replaced counts as "not there yet"
    async fn probe(&self, script: &str) -> Result<EvaluationResult, Error> {
        match self.cdp_client.evaluate(script, false).await {
            Err(Error::ScriptExecutionFailed(msg)) => {
                debug!("Probe script failed on page {}: {}", self.id, msg);
                Ok(EvaluationResult::Null)
            }
            Err(e) if is_context_loss(&e) => {
                debug!("Execution context lost on page {}: {}", self.id, e);
                Ok(EvaluationResult::Null)
            }
            other => other,
        }
    }
}

#[async_trait]
impl Page for CdpPage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn url(&self) -> Result<String, Error> {
        self.ensure_active()?;

        match self.cdp_client.evaluate(scripts::LOCATION_HREF, false).await? {
            EvaluationResult::String(url) => Ok(url),
            other => Err(Error::cdp(format!("Unexpected location value: {:?}", other))),
        }
    }

    async fn navigate(&self, url: &str) -> Result<(), Error> {
        self.ensure_active()?;
        self.cdp_client.navigate(url).await?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<Option<ElementHandle>, Error> {
        self.ensure_active()?;

        let script = scripts::selector_exists(selector);
        let deadline = Instant::now() + timeout;

        loop {
            if self.probe(&script).await?.is_true() {
                return Ok(Some(ElementHandle::new(selector)));
            }

            let now = Instant::now();
            if now >= deadline {
                debug!("Selector {} not found within {:?}", selector, timeout);
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn get_attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>, Error> {
        self.ensure_active()?;

        let script = scripts::attribute(element.selector(), name);
        Ok(match self.probe(&script).await? {
            EvaluationResult::String(value) => Some(value),
            _ => None,
        })
    }

    async fn evaluate(&self, script: &str) -> Result<EvaluationResult, Error> {
        self.ensure_active()?;
        self.cdp_client.evaluate(script, true).await
    }

    async fn reload(&self) -> Result<(), Error> {
        self.ensure_active()?;
        self.cdp_client.reload(false).await
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), Error> {
        self.ensure_active()?;

        let deadline = Instant::now() + timeout;
        let mut last_count: Option<u64> = None;
        let mut quiet_since = Instant::now();

        loop {
            let ready = matches!(self.probe(scripts::READY_STATE).await?, EvaluationResult::String(s) if s == "complete");

            if ready {
                let count = match self.probe(scripts::RESOURCE_COUNT).await? {
                    EvaluationResult::Number(n) => n as u64,
                    _ => 0,
                };

                if last_count != Some(count) {
                    last_count = Some(count);
                    quiet_since = Instant::now();
                } else if quiet_since.elapsed() >= NETWORK_QUIET_PERIOD {
                    debug!("Network idle on page {} after {} resources", self.id, count);
                    return Ok(());
                }
            } else {
                last_count = None;
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::timeout(format!(
                    "Page {} did not reach network idle within {:?}",
                    self.id, timeout
                )));
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn close(&self) -> Result<(), Error> {
        if !self.is_active.swap(false, Ordering::SeqCst) {
            debug!("Page {} is already closed", self.id);
            return Ok(());
        }

        info!("Closing page {}", self.id);

        let close_result = self
            .cdp_client
            .call_method("Page.close", serde_json::json!({}))
            .await;

        if let Err(e) = self.cdp_client.connection().close().await {
            warn!("Failed to close CDP connection of page {}: {}", self.id, e);
        }

        close_result.map(|_| ())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}
