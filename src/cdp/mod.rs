//! # Chrome DevTools Protocol (CDP) layer
//!
//! WebSocket and HTTP plumbing used by the browser capabilities.
//!
//! ## Module structure
//! - `traits`: connection, client and browser interfaces
//! - `types`: wire types
//! - `connection`: WebSocket connection with a background reader task
//! - `client`: typed client (navigate, evaluate, reload)
//! - `browser`: `/json/*` endpoint controller
//! - `mock`: mocks for tests
//!
//! ## Example
//! ```rust,no_run
//! use webpair_oxide::cdp::{CdpBrowser, CdpBrowserImpl, CdpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let browser = CdpBrowserImpl::new("http://127.0.0.1:9222");
//! let target = browser.create_target("about:blank").await?;
//! let client = browser.create_client(&target).await?;
//! client.navigate("https://example.com").await?;
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod types;
pub mod connection;
pub mod client;
pub mod browser;
pub mod mock;

pub use traits::{
    CdpConnection, CdpClient, CdpBrowser, CdpResponse, CdpError,
    NavigationResult, EvaluationResult, BrowserVersion,
};

pub use connection::CdpWebSocketConnection;
pub use client::CdpClientImpl;
pub use browser::CdpBrowserImpl;

pub use mock::{MockCdpClient, MockCdpBrowser, MockCdpConnection};
