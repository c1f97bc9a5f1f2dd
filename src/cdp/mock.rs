//! Mock CDP implementation for testing
//!
//! This module provides mock implementations of CDP traits for development and testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cdp::traits::*;
use crate::Error;

/// Mock CDP connection
#[derive(Debug)]
pub struct MockCdpConnection {
    is_active: Arc<AtomicBool>,
    next_id: AtomicU64,
    methods: std::sync::Mutex<Vec<String>>,
}

impl MockCdpConnection {
    /// Create a new mock CDP connection
    pub fn new() -> Self {
        Self {
            is_active: Arc::new(AtomicBool::new(true)),
            next_id: AtomicU64::new(1),
            methods: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Methods sent so far, in order
    pub fn sent_methods(&self) -> Vec<String> {
        self.methods.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Default for MockCdpConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpConnection for MockCdpConnection {
    async fn send_command(&self, method: &str, _params: serde_json::Value) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Connection is closed"));
        }

        if let Ok(mut methods) = self.methods.lock() {
            methods.push(method.to_string());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let result = match method {
            "Page.navigate" => serde_json::json!({
                "frameId": uuid::Uuid::new_v4().to_string(),
                "loaderId": uuid::Uuid::new_v4().to_string(),
            }),
            "Runtime.evaluate" => serde_json::json!({
                "result": { "type": "string", "value": "mock result" }
            }),
            _ => serde_json::json!({}),
        };

        Ok(CdpResponse {
            id,
            result: Some(result),
            error: None,
        })
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Relaxed)
    }
}

/// Mock CDP client
///
/// Scripts evaluate to whatever was registered with [`MockCdpClient::respond`],
/// and to `Null` otherwise.
#[derive(Debug)]
pub struct MockCdpClient {
    connection: Arc<MockCdpConnection>,
    url: Mutex<Option<String>>,
    responses: Mutex<HashMap<String, EvaluationResult>>,
    evaluated: Mutex<Vec<String>>,
    evaluate_failures: Mutex<VecDeque<String>>,
    reloads: AtomicUsize,
}

impl MockCdpClient {
    /// Create a new mock CDP client
    pub fn new() -> Self {
        Self {
            connection: Arc::new(MockCdpConnection::new()),
            url: Mutex::new(None),
            responses: Mutex::new(HashMap::new()),
            evaluated: Mutex::new(Vec::new()),
            evaluate_failures: Mutex::new(VecDeque::new()),
            reloads: AtomicUsize::new(0),
        }
    }

    /// Register the result of an exact script
    pub async fn respond(&self, script: impl Into<String>, result: EvaluationResult) {
        self.responses.lock().await.insert(script.into(), result);
    }

    /// Fail the next evaluate with a protocol error carrying `message`
    pub async fn fail_next_evaluate(&self, message: impl Into<String>) {
        self.evaluate_failures.lock().await.push_back(message.into());
    }

    /// Forget a registered script result
    pub async fn forget(&self, script: &str) {
        self.responses.lock().await.remove(script);
    }

    /// Last URL navigated to
    pub async fn current_url(&self) -> Option<String> {
        self.url.lock().await.clone()
    }

    /// Scripts evaluated so far, in order
    pub async fn evaluated(&self) -> Vec<String> {
        self.evaluated.lock().await.clone()
    }

    /// Number of reloads issued
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    /// The mock connection behind this client
    pub fn mock_connection(&self) -> Arc<MockCdpConnection> {
        Arc::clone(&self.connection)
    }
}

impl Default for MockCdpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpClient for MockCdpClient {
    fn connection(&self) -> Arc<dyn CdpConnection> {
        self.connection.clone()
    }

    async fn navigate(&self, url: &str) -> Result<NavigationResult, Error> {
        *self.url.lock().await = Some(url.to_string());
        Ok(NavigationResult {
            loader_id: Some(uuid::Uuid::new_v4().to_string()),
            url: url.to_string(),
        })
    }

    async fn evaluate(&self, script: &str, _await_promise: bool) -> Result<EvaluationResult, Error> {
        self.evaluated.lock().await.push(script.to_string());
        if let Some(message) = self.evaluate_failures.lock().await.pop_front() {
            return Err(Error::cdp(message));
        }
        Ok(self
            .responses
            .lock()
            .await
            .get(script)
            .cloned()
            .unwrap_or(EvaluationResult::Null))
    }

    async fn reload(&self, _ignore_cache: bool) -> Result<(), Error> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn enable_domain(&self, _domain: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn call_method(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, Error> {
        let response = self.connection.send_command(method, params).await?;

        if let Some(error) = response.error {
            return Err(Error::cdp(format!("{:?}", error)));
        }

        response.result.ok_or_else(|| Error::cdp("No result in response"))
    }
}

/// Mock CDP browser
#[derive(Debug)]
pub struct MockCdpBrowser {
    is_active: AtomicBool,
    clients: std::sync::Mutex<Vec<Arc<MockCdpClient>>>,
}

impl MockCdpBrowser {
    /// Create a new mock CDP browser
    pub fn new() -> Self {
        Self {
            is_active: AtomicBool::new(true),
            clients: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Clients handed out so far
    pub fn clients(&self) -> Vec<Arc<MockCdpClient>> {
        self.clients.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        !self.is_active.load(Ordering::Relaxed)
    }
}

impl Default for MockCdpBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpBrowser for MockCdpBrowser {
    async fn create_client(&self, _target_url: &str) -> Result<Arc<dyn CdpClient>, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Browser is closed"));
        }

        let client = Arc::new(MockCdpClient::new());
        if let Ok(mut clients) = self.clients.lock() {
            clients.push(Arc::clone(&client));
        }
        Ok(client)
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn get_version(&self) -> Result<BrowserVersion, Error> {
        Ok(BrowserVersion {
            protocol_version: "1.3".to_string(),
            product: "Chrome/120.0.0.0".to_string(),
            user_agent: "Mock Chrome/120.0.0.0".to_string(),
            web_socket_debugger_url: "ws://127.0.0.1:9222/devtools/browser/mock".to_string(),
        })
    }

    async fn create_target(&self, url: &str) -> Result<String, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Browser is closed"));
        }

        let target_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("Mock: created target {} for {}", target_id, url);
        Ok(format!("ws://127.0.0.1:9222/devtools/page/{}", target_id))
    }
}
