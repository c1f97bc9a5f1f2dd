//! CDP client implementation
//!
//! This module provides a high-level CDP client with typed methods for common operations.

use super::traits::*;
use super::types::*;
use crate::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Attempts of the `document.readyState` poll after navigation (100 ms apart)
const READY_STATE_ATTEMPTS: u32 = 50;

/// CDP client implementation
#[derive(Debug, Clone)]
pub struct CdpClientImpl {
    /// Underlying CDP connection
    connection: Arc<dyn CdpConnection>,
}

impl CdpClientImpl {
    /// Create a new CDP client
    ///
    /// # Arguments
    /// * `connection` - CDP connection instance
    pub fn new(connection: Arc<dyn CdpConnection>) -> Self {
        Self { connection }
    }

    /// Parse remote object value to evaluation result
    fn parse_remote_object(obj: &RemoteObject) -> EvaluationResult {
        match obj.r#type.as_str() {
            "string" => EvaluationResult::String(
                obj.value
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            ),
            "number" => EvaluationResult::Number(obj.value.as_ref().and_then(|v| v.as_f64()).unwrap_or(0.0)),
            "boolean" => EvaluationResult::Bool(obj.value.as_ref().and_then(|v| v.as_bool()).unwrap_or(false)),
            "object" if obj.subtype.as_deref() == Some("null") => EvaluationResult::Null,
            "object" | "function" | "bigint" | "symbol" => {
                EvaluationResult::Object(obj.value.clone().unwrap_or(serde_json::Value::Null))
            }
            _ => EvaluationResult::Null,
        }
    }

    /// Poll `document.readyState` until the page reports `complete`
    async fn wait_for_ready_state(&self) {
        for attempt in 0..READY_STATE_ATTEMPTS {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

            match self.evaluate("document.readyState", false).await {
                Ok(EvaluationResult::String(state)) if state == "complete" => {
                    debug!("Page loaded on attempt {}", attempt + 1);
                    return;
                }
                Ok(state) => debug!("Document ready state on attempt {}: {:?}", attempt + 1, state),
                // The execution context is torn down while the new document commits
                Err(e) => debug!("Ready state check failed on attempt {}: {}", attempt + 1, e),
            }
        }

        info!("Page load polling timeout - continuing anyway");
    }
}

#[async_trait]
impl CdpClient for CdpClientImpl {
    fn connection(&self) -> Arc<dyn CdpConnection> {
        Arc::clone(&self.connection)
    }

    async fn navigate(&self, url: &str) -> Result<NavigationResult, Error> {
        info!("Navigating to {}", url);

        let params = serde_json::to_value(NavigateParams { url: url.to_string() })?;
        let result = self.call_method("Page.navigate", params).await?;

        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(Error::navigation_failed(format!("{}: {}", url, error_text)));
        }

        self.wait_for_ready_state().await;

        Ok(NavigationResult {
            loader_id: result
                .get("loaderId")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            url: url.to_string(),
        })
    }

    async fn evaluate(&self, script: &str, await_promise: bool) -> Result<EvaluationResult, Error> {
        let params = serde_json::to_value(EvaluateParams {
            expression: script.to_string(),
            await_promise: Some(await_promise),
            return_by_value: Some(true),
        })?;

        let result = self.call_method("Runtime.evaluate", params).await?;

        let eval_response: EvaluateResponse = serde_json::from_value(result)
            .map_err(|e| Error::cdp(format!("Failed to parse EvaluateResponse: {}", e)))?;

        if let Some(exception) = eval_response.exception_details {
            return Err(Error::script_execution_failed(
                exception
                    .exception
                    .and_then(|e| e.description)
                    .or(exception.text)
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        Ok(Self::parse_remote_object(&eval_response.result))
    }

    async fn reload(&self, ignore_cache: bool) -> Result<(), Error> {
        info!("Reloading page (ignore_cache: {})", ignore_cache);

        self.call_method("Page.reload", serde_json::json!({ "ignoreCache": ignore_cache }))
            .await?;
        self.wait_for_ready_state().await;

        Ok(())
    }

    async fn enable_domain(&self, domain: &str) -> Result<(), Error> {
        debug!("Enabling domain: {}", domain);

        self.call_method(&format!("{}.enable", domain), serde_json::json!({}))
            .await?;

        Ok(())
    }

    async fn call_method(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, Error> {
        let response = self.connection.send_command(method, params).await?;

        response.result.ok_or_else(|| Error::cdp("No result in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(kind: &str, subtype: Option<&str>, value: Option<serde_json::Value>) -> RemoteObject {
        RemoteObject {
            r#type: kind.to_string(),
            subtype: subtype.map(str::to_string),
            value,
            description: None,
        }
    }

    #[test]
    fn test_parse_remote_object_string() {
        let result = CdpClientImpl::parse_remote_object(&remote("string", None, Some(serde_json::json!("ref-1"))));
        assert_eq!(result, EvaluationResult::String("ref-1".to_string()));
    }

    #[test]
    fn test_parse_remote_object_bool() {
        let result = CdpClientImpl::parse_remote_object(&remote("boolean", None, Some(serde_json::json!(true))));
        assert!(result.is_true());
    }

    #[test]
    fn test_parse_remote_object_null_subtype() {
        let result = CdpClientImpl::parse_remote_object(&remote("object", Some("null"), None));
        assert_eq!(result, EvaluationResult::Null);
    }

    #[test]
    fn test_parse_remote_object_undefined() {
        let result = CdpClientImpl::parse_remote_object(&remote("undefined", None, None));
        assert_eq!(result, EvaluationResult::Null);
    }

    #[tokio::test]
    async fn test_call_method_over_mock_connection() {
        let client = CdpClientImpl::new(Arc::new(crate::cdp::mock::MockCdpConnection::new()));
        let result = client.call_method("Page.enable", serde_json::json!({})).await.unwrap();
        assert!(result.is_object());
    }
}
