//! Client façade
//!
//! Owns the lifecycle (uninitialized → initialized → stopped), runs the
//! selected authentication strategy and forwards its events.

use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, instrument, warn, Instrument, Span};

use crate::auth::{strategy_for, AuthStrategy, AuthenticatedSession};
use crate::browser::{BrowserLauncher, ChromeLauncher, Page};
use crate::config::ClientOptions;
use crate::events::{Listener, Notifier, Payload, READY};
use crate::{Error, Result};

/// Client lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Never initialized, or the last initialization failed
    Uninitialized,
    /// Authenticated; a page is open
    Initialized,
    /// Stopped after use; may be initialized again
    Stopped,
}

#[derive(Debug)]
struct Inner {
    state: ClientState,
    session: Option<AuthenticatedSession>,
    strategy: Option<Arc<dyn AuthStrategy>>,
}

/// Builder for [`Client`]
#[derive(Debug, Default)]
pub struct ClientBuilder {
    launcher: Option<Arc<dyn BrowserLauncher>>,
    auth: Option<Arc<dyn AuthStrategy>>,
    notifier: Option<Notifier>,
    span: Option<Span>,
}

impl ClientBuilder {
    /// Launch browsers with `launcher` instead of a [`ChromeLauncher`]
    pub fn launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Authenticate with `auth` instead of the strategy named in the options
    pub fn auth(mut self, auth: Arc<dyn AuthStrategy>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Share an existing notifier
    pub fn notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Parent span for everything the client logs
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> Client {
        Client {
            launcher: self.launcher,
            auth: self.auth,
            notifier: self.notifier.unwrap_or_default(),
            span: self.span.unwrap_or_else(|| info_span!("client")),
            cancel: StdMutex::new(CancellationToken::new()),
            inner: Mutex::new(Inner {
                state: ClientState::Uninitialized,
                session: None,
                strategy: None,
            }),
        }
    }
}

/// Authenticated browser client
#[derive(Debug)]
pub struct Client {
    launcher: Option<Arc<dyn BrowserLauncher>>,
    auth: Option<Arc<dyn AuthStrategy>>,
    notifier: Notifier,
    span: Span,
    cancel: StdMutex<CancellationToken>,
    inner: Mutex<Inner>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Client with a Chrome launcher and the strategy named in the options
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Token that aborts a running [`Client::initialize`]
    ///
    /// This is the only way to abort a pending initialization: `stop`,
    /// `state` and `page` wait for it to finish. A cancelled token is
    /// replaced once the aborted initialization returns, and on `stop`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn rearm_cancellation(&self) {
        let mut cancel = self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if cancel.is_cancelled() {
            *cancel = CancellationToken::new();
        }
    }

    /// Launch a browser and authenticate
    ///
    /// Emits `ready` on success. On failure the client is back to
    /// [`ClientState::Uninitialized`] and the cause is wrapped in
    /// [`Error::Initialization`].
    ///
    /// Holds the client's state lock until authentication ends, which can
    /// take as long as the QR keeps rotating; cancel it through
    /// [`Client::cancellation_token`].
    pub async fn initialize(&self, options: ClientOptions) -> Result<()> {
        options.validate()?;

        let mut inner = self.inner.lock().await;
        if inner.state == ClientState::Initialized {
            return Err(Error::AlreadyInitialized);
        }

        let strategy = self.auth.clone().unwrap_or_else(|| strategy_for(&options));
        let launcher: Arc<dyn BrowserLauncher> = match &self.launcher {
            Some(launcher) => Arc::clone(launcher),
            None => Arc::new(ChromeLauncher::from_options(&options)),
        };
        let cancel = self.cancellation_token();

        let span = self.span.clone();
        let authenticated = async {
            info!("Initializing client with {}", strategy.name());
            strategy
                .authenticate(&options, launcher.as_ref(), &self.notifier, &cancel)
                .await
        }
        .instrument(span)
        .await;

        let session = match authenticated {
            Ok(session) => session,
            Err(e) => {
                self.span.in_scope(|| error!("Client initialization failed: {}", e));
                if matches!(e, Error::Cancelled) {
                    self.rearm_cancellation();
                }
                inner.state = ClientState::Uninitialized;
                return Err(Error::Initialization { source: Box::new(e) });
            }
        };

        if let Err(e) = session
            .page
            .wait_for_network_idle(options.network_idle_timeout())
            .instrument(self.span.clone())
            .await
        {
            self.span.in_scope(|| warn!("Page not idle after login: {}", e));
        }

        inner.session = Some(session);
        inner.strategy = Some(strategy);
        inner.state = ClientState::Initialized;
        drop(inner);

        self.span.in_scope(|| info!("Client ready"));
        if let Err(e) = self.notifier.emit(READY, &Payload::None) {
            self.span.in_scope(|| warn!("Ready delivery incomplete: {}", e));
        }

        Ok(())
    }

    /// Close the page and the browser
    ///
    /// Both are closed even if one fails; the client ends up
    /// [`ClientState::Stopped`] either way.
    #[instrument(parent = &self.span, skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let session = inner.session.take();
        inner.state = ClientState::Stopped;
        drop(inner);
        self.rearm_cancellation();

        let Some(session) = session else {
            return Ok(());
        };

        info!("Stopping client");

        let mut failures = Vec::new();
        if let Err(e) = session.page.close().await {
            failures.push(format!("page: {}", e));
        }
        if let Err(e) = session.browser.close().await {
            failures.push(format!("browser: {}", e));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            error!("Client teardown failed: {}", failures.join("; "));
            Err(Error::Teardown { failures })
        }
    }

    /// Stop the client and forget persisted credentials
    #[instrument(parent = &self.span, skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let strategy = {
            let inner = self.inner.lock().await;
            inner.strategy.clone().or_else(|| self.auth.clone())
        };
        let strategy = strategy.ok_or(Error::NotInitialized)?;

        let stopped = self.stop().await;
        strategy.logout().await?;
        stopped
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ClientState {
        self.inner.lock().await.state
    }

    pub async fn is_initialized(&self) -> bool {
        self.state().await == ClientState::Initialized
    }

    /// The logged-in page, while initialized
    pub async fn page(&self) -> Option<Arc<dyn Page>> {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .map(|session| Arc::clone(&session.page))
    }

    /// Event notifier shared with the strategies
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// See [`Notifier::on`]
    pub fn on(&self, event: &str, callback: Listener) {
        self.notifier.on(event, callback);
    }

    /// See [`Notifier::once`]
    pub fn once(&self, event: &str, callback: Listener) {
        self.notifier.once(event, callback);
    }

    /// See [`Notifier::off`]
    pub fn off(&self, event: &str, callback: &Listener) {
        self.notifier.off(event, callback);
    }

    /// See [`Notifier::emit`]
    pub fn emit(&self, event: &str, payload: &Payload) -> Result<usize> {
        self.notifier.emit(event, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalAuth;
    use crate::browser::{MockLauncher, MockPage};
    use crate::config::AuthKind;
    use crate::events::listener;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn options() -> ClientOptions {
        ClientOptions {
            qr_poll_interval_ms: 0,
            max_retries: 2,
            ..Default::default()
        }
    }

    /// Launcher whose page shows one QR code, then the main UI
    fn pairing_launcher() -> Arc<MockLauncher> {
        let opts = options();
        let page = Arc::new(MockPage::new());
        page.script(&opts.qr_selector, [Some("ref-a".to_string()), None]);
        page.script(&opts.loaded_selector, [Some(String::new())]);
        Arc::new(MockLauncher::with_page(page))
    }

    fn client_with(launcher: &Arc<MockLauncher>) -> Client {
        Client::builder().launcher(launcher.clone()).build()
    }

    fn ready_counter(client: &Client) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        client.on(
            READY,
            listener(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        count
    }

    #[tokio::test]
    async fn test_initialize_emits_ready() {
        let launcher = pairing_launcher();
        let client = client_with(&launcher);
        let ready = ready_counter(&client);

        client.initialize(options()).await.unwrap();

        assert_eq!(client.state().await, ClientState::Initialized);
        assert!(client.is_initialized().await);
        assert!(client.page().await.is_some());
        assert_eq!(ready.load(Ordering::SeqCst), 1);
        assert_eq!(launcher.page().network_idle_waits(), 1);
    }

    #[tokio::test]
    async fn test_initialize_twice_is_rejected_without_side_effects() {
        let launcher = pairing_launcher();
        let client = client_with(&launcher);
        let ready = ready_counter(&client);

        client.initialize(options()).await.unwrap();
        let second = client.initialize(options()).await;

        assert!(matches!(second, Err(Error::AlreadyInitialized)));
        assert_eq!(launcher.launches().len(), 1);
        assert_eq!(ready.load(Ordering::SeqCst), 1);
        assert_eq!(client.state().await, ClientState::Initialized);
    }

    #[tokio::test]
    async fn test_failed_authentication_reverts_state() {
        let launcher = Arc::new(MockLauncher::new());
        let client = client_with(&launcher);
        let ready = ready_counter(&client);

        let err = client.initialize(options()).await.unwrap_err();

        assert!(matches!(err, Error::Initialization { .. }));
        assert!(err.is_qr_exhausted());
        assert_eq!(client.state().await, ClientState::Uninitialized);
        assert!(client.page().await.is_none());
        assert_eq!(ready.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_runtime_startup_failure_is_wrapped() {
        let launcher = Arc::new(MockLauncher::new());
        launcher.fail_launch("no chrome");
        let client = client_with(&launcher);

        let err = client.initialize(options()).await.unwrap_err();

        assert!(matches!(err.root(), Error::RuntimeStartup(_)));
        assert_eq!(client.state().await, ClientState::Uninitialized);
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_launch() {
        let launcher = pairing_launcher();
        let client = client_with(&launcher);
        let opts = ClientOptions {
            web_url: String::new(),
            ..options()
        };

        let err = client.initialize(opts).await.unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert!(launcher.launches().is_empty());
    }

    #[tokio::test]
    async fn test_failing_ready_listener_does_not_fail_initialize() {
        let launcher = pairing_launcher();
        let client = client_with(&launcher);
        client.on(READY, listener(|_| Err(anyhow::anyhow!("listener broke"))));
        let ready = ready_counter(&client);

        client.initialize(options()).await.unwrap();

        assert_eq!(ready.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_attempts_every_teardown_step() {
        let launcher = pairing_launcher();
        let client = client_with(&launcher);
        client.initialize(options()).await.unwrap();

        launcher.page().fail_close("target crashed");
        launcher.browser().fail_close("process gone");

        let err = client.stop().await.unwrap_err();

        match err {
            Error::Teardown { failures } => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("page:"));
                assert!(failures[1].starts_with("browser:"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(launcher.browser().close_calls(), 1);
        assert_eq!(client.state().await, ClientState::Stopped);
        assert!(client.page().await.is_none());
    }

    #[tokio::test]
    async fn test_initialize_from_stopped() {
        let launcher = pairing_launcher();
        let client = client_with(&launcher);

        client.stop().await.unwrap();
        assert_eq!(client.state().await, ClientState::Stopped);

        client.initialize(options()).await.unwrap();
        assert_eq!(client.state().await, ClientState::Initialized);
    }

    #[tokio::test]
    async fn test_auth_kind_selects_local_strategy() {
        let root = tempfile::tempdir().unwrap();
        let launcher = pairing_launcher();
        let client = client_with(&launcher);
        let opts = ClientOptions {
            auth: AuthKind::Local,
            auth_dir: root.path().to_str().unwrap().to_string(),
            ..options()
        };

        client.initialize(opts).await.unwrap();

        let expected = LocalAuth::new(root.path().to_str().unwrap(), "default");
        assert_eq!(launcher.launches()[0].profile_dir, Some(expected.store().path()));
    }

    #[tokio::test]
    async fn test_logout_stops_and_removes_profile() {
        let root = tempfile::tempdir().unwrap();
        let auth = Arc::new(LocalAuth::new(root.path().to_str().unwrap(), "default"));
        let launcher = pairing_launcher();
        let client = Client::builder()
            .launcher(launcher.clone())
            .auth(auth.clone())
            .build();

        client.initialize(options()).await.unwrap();
        std::fs::create_dir_all(auth.store().path()).unwrap();

        client.logout().await.unwrap();

        assert!(!auth.store().exists());
        assert!(launcher.browser().is_closed());
        assert_eq!(client.state().await, ClientState::Stopped);
    }

    #[tokio::test]
    async fn test_logout_requires_a_strategy() {
        let client = Client::builder()
            .launcher(Arc::new(MockLauncher::new()))
            .build();
        assert!(matches!(client.logout().await, Err(Error::NotInitialized)));
    }

    #[tokio::test]
    async fn test_cancel_after_login_is_cleared_by_stop() {
        let opts = options();
        let launcher = Arc::new(MockLauncher::new());
        launcher.page().always(&opts.loaded_selector, Some(String::new()));
        let client = client_with(&launcher);

        client.initialize(options()).await.unwrap();
        client.cancellation_token().cancel();
        client.stop().await.unwrap();
        assert!(!client.cancellation_token().is_cancelled());

        client.initialize(options()).await.unwrap();
        assert_eq!(client.state().await, ClientState::Initialized);
        assert_eq!(launcher.launches().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_initialize_rearms_token() {
        let launcher = pairing_launcher();
        let client = client_with(&launcher);

        let token = client.cancellation_token();
        token.cancel();

        let err = client.initialize(options()).await.unwrap_err();
        assert!(matches!(err.root(), Error::Cancelled));
        assert!(!client.cancellation_token().is_cancelled());
    }
}
