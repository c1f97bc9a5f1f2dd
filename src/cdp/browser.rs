//! CDP browser control implementation
//!
//! Browser-level operations over the DevTools HTTP endpoints (`/json/*`).

use super::client::CdpClientImpl;
use super::connection::CdpWebSocketConnection;
use super::traits::*;
use super::types::{TargetDescriptor, VersionInfo};
use crate::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// CDP browser implementation
#[derive(Debug)]
pub struct CdpBrowserImpl {
    /// DevTools HTTP endpoint (e.g., "http://127.0.0.1:9222")
    endpoint: String,
    /// HTTP client for the `/json` endpoints
    http: reqwest::Client,
    /// Active connections (target URL -> connection)
    connections: Arc<tokio::sync::Mutex<HashMap<String, Arc<dyn CdpConnection>>>>,
}

impl CdpBrowserImpl {
    /// Create a new CDP browser controller
    ///
    /// # Arguments
    /// * `endpoint` - DevTools endpoint; `ws://` and `wss://` schemes are mapped to HTTP
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        let endpoint = Self::http_endpoint(&endpoint.into());
        debug!("Creating CDP browser controller for endpoint: {}", endpoint);
        Self {
            endpoint,
            http: reqwest::Client::new(),
            connections: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Normalize an endpoint to its HTTP form without a trailing slash
    fn http_endpoint(endpoint: &str) -> String {
        endpoint
            .replacen("ws://", "http://", 1)
            .replacen("wss://", "https://", 1)
            .trim_end_matches('/')
            .to_string()
    }

    /// The HTTP endpoint this controller talks to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CdpBrowser for CdpBrowserImpl {
    async fn create_client(&self, target_url: &str) -> Result<Arc<dyn CdpClient>, Error> {
        debug!("Creating CDP client for target: {}", target_url);

        let connection = CdpWebSocketConnection::new(target_url).await?;

        self.connections
            .lock()
            .await
            .insert(target_url.to_string(), Arc::clone(&connection) as Arc<dyn CdpConnection>);

        let client = Arc::new(CdpClientImpl::new(connection));

        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;

        Ok(client)
    }

    async fn close(&self) -> Result<(), Error> {
        let connections: Vec<(String, Arc<dyn CdpConnection>)> =
            self.connections.lock().await.drain().collect();

        if connections.is_empty() {
            return Ok(());
        }

        info!("Closing {} CDP connection(s) at {}", connections.len(), self.endpoint);

        let mut failed = 0;
        for (target, connection) in connections {
            if let Err(e) = connection.close().await {
                warn!("Failed to close connection to {}: {}", target, e);
                failed += 1;
            }
        }

        if failed > 0 {
            warn!("{} CDP connection(s) failed to close cleanly", failed);
        }

        Ok(())
    }

    async fn get_version(&self) -> Result<BrowserVersion, Error> {
        let url = format!("{}/json/version", self.endpoint);

        let info: VersionInfo = self
            .http
            .get(&url)
            .timeout(Duration::from_millis(500))
            .send()
            .await
            .map_err(|e| Error::cdp(format!("Failed to reach {}: {}", url, e)))?
            .json()
            .await
            .map_err(|e| Error::cdp(format!("Failed to parse version: {}", e)))?;

        Ok(BrowserVersion {
            protocol_version: info.protocol_version,
            product: info.browser,
            user_agent: info.user_agent,
            web_socket_debugger_url: info.web_socket_debugger_url,
        })
    }

    async fn create_target(&self, url: &str) -> Result<String, Error> {
        let new_url = format!("{}/json/new?{}", self.endpoint, url);

        debug!("Creating new page via HTTP API: {}", new_url);

        let response_text = self
            .http
            .put(&new_url)
            .send()
            .await
            .map_err(|e| Error::cdp(format!("Failed to create target at {}: {}", self.endpoint, e)))?
            .text()
            .await
            .map_err(|e| Error::cdp(format!("Failed to read response: {}", e)))?;

        let target: TargetDescriptor = serde_json::from_str(&response_text).map_err(|e| {
            Error::cdp(format!(
                "Failed to parse new target response: {} (response was: {})",
                e, response_text
            ))
        })?;

        debug!("Created target {} at {}", target.id, target.web_socket_debugger_url);

        Ok(target.web_socket_debugger_url)
    }
}
