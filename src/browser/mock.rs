//! Mock browser implementation for testing
//!
//! Pages answer selector probes from per-selector scripts, so protocol runs are
//! deterministic and never wait on a real timeout.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::traits::{BrowserLauncher, BrowserSession, ElementHandle, Page};
use crate::cdp::EvaluationResult;
use crate::Error;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct SelectorScript {
    /// Outcomes consumed one per probe; `Some(value)` is a hit carrying the
    /// element's attribute value
    outcomes: VecDeque<Option<String>>,
    /// Outcome once the queue is drained
    fallback: Option<String>,
    /// Attribute value of the last hit
    current: Option<String>,
    probes: usize,
}

/// Scripted page
#[derive(Debug)]
pub struct MockPage {
    id: String,
    scripts: Mutex<HashMap<String, SelectorScript>>,
    navigations: Mutex<Vec<String>>,
    navigate_error: Mutex<Option<String>>,
    reloads: AtomicUsize,
    network_idle_waits: AtomicUsize,
    close_error: Mutex<Option<String>>,
    is_active: AtomicBool,
}

impl MockPage {
    /// Create a page on which every selector misses
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            scripts: Mutex::new(HashMap::new()),
            navigations: Mutex::new(Vec::new()),
            navigate_error: Mutex::new(None),
            reloads: AtomicUsize::new(0),
            network_idle_waits: AtomicUsize::new(0),
            close_error: Mutex::new(None),
            is_active: AtomicBool::new(true),
        }
    }

    /// Queue probe outcomes for `selector`
    ///
    /// `Some(value)` makes the probe hit with `value` as the element's
    /// attribute; `None` makes it miss.
    pub fn script<I>(&self, selector: &str, outcomes: I)
    where
        I: IntoIterator<Item = Option<String>>,
    {
        lock(&self.scripts)
            .entry(selector.to_string())
            .or_default()
            .outcomes
            .extend(outcomes);
    }

    /// Outcome of every probe of `selector` after its queue is drained
    pub fn always(&self, selector: &str, outcome: Option<String>) {
        lock(&self.scripts).entry(selector.to_string()).or_default().fallback = outcome;
    }

    /// Make every `navigate` fail
    pub fn fail_navigation(&self, message: &str) {
        *lock(&self.navigate_error) = Some(message.to_string());
    }

    /// Make `close` fail
    pub fn fail_close(&self, message: &str) {
        *lock(&self.close_error) = Some(message.to_string());
    }

    /// Number of probes of `selector` so far
    pub fn probes(&self, selector: &str) -> usize {
        lock(&self.scripts).get(selector).map(|s| s.probes).unwrap_or(0)
    }

    /// URLs navigated to, in order
    pub fn navigations(&self) -> Vec<String> {
        lock(&self.navigations).clone()
    }

    /// Number of reloads issued
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Number of network idle waits
    pub fn network_idle_waits(&self) -> usize {
        self.network_idle_waits.load(Ordering::SeqCst)
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        !self.is_active.load(Ordering::SeqCst)
    }

    fn reopen(&self) {
        self.is_active.store(true, Ordering::SeqCst);
    }
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Page for MockPage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn url(&self) -> Result<String, Error> {
        Ok(lock(&self.navigations)
            .last()
            .cloned()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn navigate(&self, url: &str) -> Result<(), Error> {
        if let Some(message) = lock(&self.navigate_error).clone() {
            return Err(Error::navigation_failed(format!("{}: {}", url, message)));
        }
        lock(&self.navigations).push(url.to_string());
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<Option<ElementHandle>, Error> {
        if self.is_closed() {
            return Err(Error::page_not_found(&self.id));
        }

        let mut scripts = lock(&self.scripts);
        let script = scripts.entry(selector.to_string()).or_default();
        script.probes += 1;

        let outcome = match script.outcomes.pop_front() {
            Some(outcome) => outcome,
            None => script.fallback.clone(),
        };

        Ok(outcome.map(|value| {
            script.current = Some(value);
            ElementHandle::new(selector)
        }))
    }

    async fn get_attribute(&self, element: &ElementHandle, _name: &str) -> Result<Option<String>, Error> {
        Ok(lock(&self.scripts)
            .get(element.selector())
            .and_then(|s| s.current.clone())
            .filter(|value| !value.is_empty()))
    }

    async fn evaluate(&self, _script: &str) -> Result<EvaluationResult, Error> {
        Ok(EvaluationResult::Null)
    }

    async fn reload(&self) -> Result<(), Error> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> Result<(), Error> {
        self.network_idle_waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::SeqCst);
        match lock(&self.close_error).clone() {
            Some(message) => Err(Error::cdp(message)),
            None => Ok(()),
        }
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}

/// Mock browser handing out one shared [`MockPage`]
#[derive(Debug)]
pub struct MockBrowser {
    id: String,
    page: Arc<MockPage>,
    pages_opened: AtomicUsize,
    close_calls: AtomicUsize,
    close_error: Mutex<Option<String>>,
    is_active: AtomicBool,
}

impl MockBrowser {
    /// Create a browser whose pages are all `page`
    pub fn new(page: Arc<MockPage>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            page,
            pages_opened: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            close_error: Mutex::new(None),
            is_active: AtomicBool::new(true),
        }
    }

    /// The scripted page
    pub fn page(&self) -> Arc<MockPage> {
        Arc::clone(&self.page)
    }

    /// Make `close` fail
    pub fn fail_close(&self, message: &str) {
        *lock(&self.close_error) = Some(message.to_string());
    }

    /// Number of `new_page` calls
    pub fn pages_opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    /// Number of `close` calls
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        !self.is_active.load(Ordering::SeqCst)
    }

    /// A relaunch hands out the same browser and page, open again
    fn reopen(&self) {
        self.is_active.store(true, Ordering::SeqCst);
        self.page.reopen();
    }
}

#[async_trait]
impl BrowserSession for MockBrowser {
    fn id(&self) -> &str {
        &self.id
    }

    async fn new_page(&self) -> Result<Arc<dyn Page>, Error> {
        if self.is_closed() {
            return Err(Error::browser_not_found(&self.id));
        }
        self.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.page.clone())
    }

    async fn close(&self) -> Result<(), Error> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.is_active.store(false, Ordering::SeqCst);
        match lock(&self.close_error).clone() {
            Some(message) => Err(Error::internal(message)),
            None => Ok(()),
        }
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}

/// A recorded launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRecord {
    /// Profile directory for persistent launches
    pub profile_dir: Option<PathBuf>,
    /// Requested headless mode
    pub headless: bool,
}

/// Mock launcher returning one shared [`MockBrowser`]
#[derive(Debug)]
pub struct MockLauncher {
    browser: Arc<MockBrowser>,
    launches: Mutex<Vec<LaunchRecord>>,
    launch_error: Mutex<Option<String>>,
}

impl MockLauncher {
    /// Create a launcher around a fresh page
    pub fn new() -> Self {
        Self::with_page(Arc::new(MockPage::new()))
    }

    /// Create a launcher whose browser serves `page`
    pub fn with_page(page: Arc<MockPage>) -> Self {
        Self {
            browser: Arc::new(MockBrowser::new(page)),
            launches: Mutex::new(Vec::new()),
            launch_error: Mutex::new(None),
        }
    }

    /// The browser every launch returns
    pub fn browser(&self) -> Arc<MockBrowser> {
        Arc::clone(&self.browser)
    }

    /// The scripted page
    pub fn page(&self) -> Arc<MockPage> {
        self.browser.page()
    }

    /// Make every launch fail with a startup error
    pub fn fail_launch(&self, message: &str) {
        *lock(&self.launch_error) = Some(message.to_string());
    }

    /// Launches so far
    pub fn launches(&self) -> Vec<LaunchRecord> {
        lock(&self.launches).clone()
    }

    fn record(&self, profile_dir: Option<&Path>, headless: bool) -> Result<Arc<dyn BrowserSession>, Error> {
        if let Some(message) = lock(&self.launch_error).clone() {
            return Err(Error::runtime_startup(message));
        }
        lock(&self.launches).push(LaunchRecord {
            profile_dir: profile_dir.map(Path::to_path_buf),
            headless,
        });
        self.browser.reopen();
        Ok(self.browser.clone())
    }
}

impl Default for MockLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self, headless: bool) -> Result<Arc<dyn BrowserSession>, Error> {
        self.record(None, headless)
    }

    async fn launch_persistent(&self, profile_dir: &Path, headless: bool) -> Result<Arc<dyn BrowserSession>, Error> {
        self.record(Some(profile_dir), headless)
    }
}
