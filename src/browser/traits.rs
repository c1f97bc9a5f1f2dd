//! Browser capability traits
//!
//! The authentication protocols only ever see these interfaces; the CDP-backed
//! implementations and the scripted mocks both sit behind them.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::cdp::EvaluationResult;
use crate::Error;

/// A located element
///
/// Elements are addressed by the selector that found them and are re-resolved
/// on every use, so a handle never dangles across a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    selector: String,
}

impl ElementHandle {
    /// Create a handle for an element matched by `selector`
    pub fn new<S: Into<String>>(selector: S) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    /// The selector that matched this element
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

/// Page trait
///
/// Represents one tab of a running browser.
#[async_trait]
pub trait Page: Send + Sync + std::fmt::Debug {
    /// Get page ID
    fn id(&self) -> &str;

    /// Current document URL
    async fn url(&self) -> Result<String, Error>;

    /// Navigate to URL
    async fn navigate(&self, url: &str) -> Result<(), Error>;

    /// Wait up to `timeout` for `selector` to match
    ///
    /// A timeout is an expected outcome and is reported as `Ok(None)`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<Option<ElementHandle>, Error>;

    /// Read an attribute of a located element
    async fn get_attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>, Error>;

    /// Evaluate JavaScript
    async fn evaluate(&self, script: &str) -> Result<EvaluationResult, Error>;

    /// Reload page
    async fn reload(&self) -> Result<(), Error>;

    /// Wait until the page stops loading resources
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), Error>;

    /// Close the page
    async fn close(&self) -> Result<(), Error>;

    /// Check if page is active
    fn is_active(&self) -> bool;
}

/// Browser session trait
///
/// A running browser process, either with a throwaway profile or a persisted one.
#[async_trait]
pub trait BrowserSession: Send + Sync + std::fmt::Debug {
    /// Get browser ID
    fn id(&self) -> &str;

    /// Open a new page
    async fn new_page(&self) -> Result<Arc<dyn Page>, Error>;

    /// Close every page and shut the browser down
    async fn close(&self) -> Result<(), Error>;

    /// Check if browser is active
    fn is_active(&self) -> bool;
}

/// Browser launcher trait
#[async_trait]
pub trait BrowserLauncher: Send + Sync + std::fmt::Debug {
    /// Launch a browser with a throwaway profile
    async fn launch(&self, headless: bool) -> Result<Arc<dyn BrowserSession>, Error>;

    /// Launch a browser on a profile directory that outlives the process
    async fn launch_persistent(&self, profile_dir: &Path, headless: bool) -> Result<Arc<dyn BrowserSession>, Error>;
}
