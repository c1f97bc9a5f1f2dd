//! Mock Chrome DevTools page target
//!
//! A WebSocket server answering the CDP commands a `CdpPage` sends, backed by a
//! fake document whose elements tests can show and hide while a protocol runs.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use webpair_oxide::browser::scripts;

/// Elements currently on the fake page (selector -> attributes)
#[derive(Debug, Default)]
pub struct FakeDocument {
    elements: HashMap<String, HashMap<String, String>>,
}

impl FakeDocument {
    /// Put an element matching `selector` on the page
    pub fn show(&mut self, selector: &str, attributes: &[(&str, &str)]) {
        self.elements.insert(
            selector.to_string(),
            attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    /// Remove the element matching `selector`
    pub fn hide(&mut self, selector: &str) {
        self.elements.remove(selector);
    }

    /// Answer a `Runtime.evaluate` expression
    fn evaluate(&self, expression: &str) -> Value {
        if expression == scripts::READY_STATE {
            return json!({ "type": "string", "value": "complete" });
        }
        if expression == scripts::RESOURCE_COUNT {
            return json!({ "type": "number", "value": 3 });
        }
        if expression == scripts::LOCATION_HREF {
            return json!({ "type": "string", "value": "https://web.example.test/" });
        }

        for (selector, attributes) in &self.elements {
            if expression == scripts::selector_exists(selector) {
                return json!({ "type": "boolean", "value": true });
            }
            for (name, value) in attributes {
                if expression == scripts::attribute(selector, name) {
                    return json!({ "type": "string", "value": value });
                }
            }
        }

        if expression.ends_with("!== null") {
            return json!({ "type": "boolean", "value": false });
        }
        json!({ "type": "object", "subtype": "null", "value": null })
    }
}

/// Command counters
#[derive(Debug, Default)]
pub struct Counters {
    pub navigations: AtomicUsize,
    pub reloads: AtomicUsize,
    pub evaluations: AtomicUsize,
}

/// Mock Chrome server
pub struct MockChromeServer {
    addr: String,
    document: Arc<Mutex<FakeDocument>>,
    counters: Arc<Counters>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockChromeServer {
    /// Start a new mock Chrome server
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let document = Arc::new(Mutex::new(FakeDocument::default()));
        let counters = Arc::new(Counters::default());

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        {
            let document = document.clone();
            let counters = counters.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        result = listener.accept() => {
                            match result {
                                Ok((stream, _)) => {
                                    tokio::spawn(Self::handle_connection(stream, document.clone(), counters.clone()));
                                }
                                Err(e) => {
                                    tracing::error!("Mock Chrome: Accept error: {}", e);
                                    break;
                                }
                            }
                        }
                        _ = &mut shutdown_rx => break,
                    }
                }
            });
        }

        Ok(Self {
            addr: format!("ws://{}/devtools/page/mock", addr),
            document,
            counters,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Handle a WebSocket connection
    async fn handle_connection(stream: TcpStream, document: Arc<Mutex<FakeDocument>>, counters: Arc<Counters>) {
        let Ok(ws_stream) = accept_async(stream).await else {
            return;
        };
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    let Ok(req) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    let response = Self::create_cdp_response(&req, &document, &counters);
                    if ws_sender.send(Message::Text(response.to_string())).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    }

    /// Create a CDP response for a request
    fn create_cdp_response(req: &Value, document: &Mutex<FakeDocument>, counters: &Counters) -> Value {
        let method = req.get("method").and_then(|m| m.as_str()).unwrap_or("unknown");
        let id = req.get("id").and_then(|i| i.as_u64()).unwrap_or(0);

        match method {
            "Page.enable" | "Runtime.enable" | "Page.close" => json!({ "id": id, "result": {} }),
            "Page.navigate" => {
                counters.navigations.fetch_add(1, Ordering::SeqCst);
                json!({ "id": id, "result": { "frameId": "frame-1", "loaderId": "loader-1" } })
            }
            "Page.reload" => {
                counters.reloads.fetch_add(1, Ordering::SeqCst);
                json!({ "id": id, "result": {} })
            }
            "Runtime.evaluate" => {
                counters.evaluations.fetch_add(1, Ordering::SeqCst);
                let expression = req
                    .get("params")
                    .and_then(|p| p.get("expression"))
                    .and_then(|e| e.as_str())
                    .unwrap_or("");
                let result = document.lock().unwrap().evaluate(expression);
                json!({ "id": id, "result": { "result": result } })
            }
            _ => json!({
                "id": id,
                "error": { "code": -32601, "message": format!("Method not implemented: {}", method) }
            }),
        }
    }

    /// WebSocket URL of the page target
    pub fn ws_endpoint(&self) -> &str {
        &self.addr
    }

    /// The fake document
    pub fn document(&self) -> Arc<Mutex<FakeDocument>> {
        self.document.clone()
    }

    pub fn reloads(&self) -> usize {
        self.counters.reloads.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.counters.navigations.load(Ordering::SeqCst)
    }
}

impl Drop for MockChromeServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
