//! Browser session implementation
//!
//! Owns the Chrome child process, the DevTools controller and the pages
//! opened through it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::page::CdpPage;
use super::traits::{BrowserSession, Page};
use crate::cdp::CdpBrowser;
use crate::Error;

/// Profile directory of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Profile {
    /// Created for this session and removed when it closes
    Ephemeral(PathBuf),
    /// Owned by the session store; never removed here
    Persistent(PathBuf),
}

impl Profile {
    /// Directory passed as `--user-data-dir`
    pub fn path(&self) -> &Path {
        match self {
            Profile::Ephemeral(path) | Profile::Persistent(path) => path,
        }
    }
}

/// Chrome browser session
#[derive(Debug)]
pub struct ChromeSession {
    id: String,
    cdp_browser: Arc<dyn CdpBrowser>,
    child: Mutex<Option<Child>>,
    profile: Profile,
    pages: Mutex<Vec<Arc<CdpPage>>>,
    is_active: AtomicBool,
}

impl ChromeSession {
    /// Create a session over a DevTools controller
    ///
    /// # Arguments
    /// * `cdp_browser` - controller for the browser's DevTools endpoint
    /// * `child` - the browser process, if this session spawned it
    /// * `profile` - profile directory the browser runs on
    pub fn new(cdp_browser: Arc<dyn CdpBrowser>, child: Option<Child>, profile: Profile) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            cdp_browser,
            child: Mutex::new(child),
            profile,
            pages: Mutex::new(Vec::new()),
            is_active: AtomicBool::new(true),
        }
    }

    /// Profile directory of this session
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Number of pages opened and not yet closed by the session
    pub async fn page_count(&self) -> usize {
        self.pages.lock().await.len()
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn new_page(&self) -> Result<Arc<dyn Page>, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::browser_not_found(&self.id));
        }

        let target_url = self.cdp_browser.create_target("about:blank").await?;
        let cdp_client = self.cdp_browser.create_client(&target_url).await?;
        let page = Arc::new(CdpPage::new(cdp_client));

        debug!("Browser {} opened page {}", self.id, page.id());
        self.pages.lock().await.push(Arc::clone(&page));

        Ok(page)
    }

    async fn close(&self) -> Result<(), Error> {
        if !self.is_active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Closing browser {}", self.id);

        // Collect pages first to avoid holding the lock across await
        let pages: Vec<Arc<CdpPage>> = self.pages.lock().await.drain(..).collect();
        for page in pages {
            if let Err(e) = page.close().await {
                debug!("Page {} did not close cleanly: {}", page.id(), e);
            }
        }

        let mut failures = Vec::new();

        if let Err(e) = self.cdp_browser.close().await {
            failures.push(format!("devtools: {}", e));
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match child.kill().await {
                Ok(()) => debug!("Browser process of {} terminated", self.id),
                Err(e) => failures.push(format!("process: {}", e)),
            }
        }

        if let Profile::Ephemeral(dir) = &self.profile {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => debug!("Removed ephemeral profile {}", dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => failures.push(format!("profile {}: {}", dir.display(), e)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            warn!("Browser {} teardown incomplete: {}", self.id, failures.join("; "));
            Err(Error::internal(format!(
                "Browser {} teardown incomplete: {}",
                self.id,
                failures.join("; ")
            )))
        }
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}
