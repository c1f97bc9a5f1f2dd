//! Chrome launcher
//!
//! Spawns a local Chrome/Chromium with remote debugging enabled and waits for
//! its DevTools endpoint to answer.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, instrument};

use super::session::{ChromeSession, Profile};
use super::traits::{BrowserLauncher, BrowserSession};
use crate::cdp::{CdpBrowser, CdpBrowserImpl};
use crate::config::ClientOptions;
use crate::Error;

/// Attempts of the DevTools endpoint poll after spawning
const STARTUP_ATTEMPTS: u32 = 25;

/// Interval between DevTools endpoint polls
const STARTUP_INTERVAL: Duration = Duration::from_millis(200);

/// Locate a Chrome/Chromium executable on this machine
pub fn find_chrome_executable() -> Option<PathBuf> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            "chrome.exe",
            "msedge.exe",
        ]
    } else {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium-browser",
            "chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium-browser",
            "/usr/bin/chromium",
            "/snap/bin/chromium",
        ]
    };

    candidates.iter().find_map(|candidate| {
        let path = Path::new(candidate);
        if path.is_absolute() {
            path.exists().then(|| path.to_path_buf())
        } else {
            which::which(candidate).ok()
        }
    })
}

/// Reserve a free local port for the DevTools endpoint
fn free_port() -> Result<u16, Error> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))
        .map_err(|e| Error::runtime_startup(format!("No free port for remote debugging: {}", e)))?;
    Ok(listener.local_addr()?.port())
}

/// Launches Chrome processes
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher {
    /// Explicit executable; discovered when unset
    executable: Option<PathBuf>,
    /// Extra command-line switches
    args: Vec<String>,
}

impl ChromeLauncher {
    /// Create a launcher that discovers the executable
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a launcher for the configured executable, if any
    pub fn from_options(options: &ClientOptions) -> Self {
        Self {
            executable: options.chrome_path.as_ref().map(PathBuf::from),
            args: Vec::new(),
        }
    }

    /// Use a specific executable
    pub fn with_executable<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Append a command-line switch
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    fn executable(&self) -> Result<PathBuf, Error> {
        match &self.executable {
            Some(path) => Ok(path.clone()),
            None => find_chrome_executable().ok_or_else(|| {
                Error::runtime_startup(
                    "Could not find a Chrome/Chromium executable; set chrome_path or WEBPAIR_CHROME_PATH",
                )
            }),
        }
    }

    fn command_args(&self, port: u16, profile_dir: &Path, headless: bool) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", port),
            format!("--user-data-dir={}", profile_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
        ];
        if headless {
            args.push("--headless=new".to_string());
        }
        args.extend(self.args.iter().cloned());
        args.push("about:blank".to_string());
        args
    }

    /// Spawn Chrome on `profile` and wrap it in a session
    async fn start(&self, profile: Profile, headless: bool) -> Result<Arc<dyn BrowserSession>, Error> {
        let executable = self.executable()?;
        let port = free_port()?;

        tokio::fs::create_dir_all(profile.path()).await.map_err(|e| {
            Error::runtime_startup(format!(
                "Failed to create profile directory {}: {}",
                profile.path().display(),
                e
            ))
        })?;

        let args = self.command_args(port, profile.path(), headless);
        debug!("Launching {} {:?}", executable.display(), args);

        let mut child = Command::new(&executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::runtime_startup(format!("Failed to launch {}: {}", executable.display(), e))
            })?;

        let cdp_browser = CdpBrowserImpl::new(format!("http://127.0.0.1:{}", port));
        wait_for_devtools(&cdp_browser, &mut child, port).await?;

        info!(
            "Browser started on port {} with profile {}",
            port,
            profile.path().display()
        );

        Ok(Arc::new(ChromeSession::new(Arc::new(cdp_browser), Some(child), profile)))
    }
}

/// Poll `/json/version` until the endpoint answers or the process exits
async fn wait_for_devtools(cdp_browser: &CdpBrowserImpl, child: &mut Child, port: u16) -> Result<(), Error> {
    let mut last_error = "endpoint not reachable".to_string();

    for _ in 0..STARTUP_ATTEMPTS {
        tokio::time::sleep(STARTUP_INTERVAL).await;

        if let Ok(Some(status)) = child.try_wait() {
            return Err(Error::runtime_startup(format!(
                "Browser exited before the debugging endpoint became available (status: {})",
                status
            )));
        }

        match cdp_browser.get_version().await {
            Ok(version) => {
                debug!("DevTools endpoint up: {} ({})", version.product, version.protocol_version);
                return Ok(());
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    // kill_on_drop reaps the process once the child goes out of scope
    Err(Error::runtime_startup(format!(
        "Debugging endpoint not available on port {}: {}",
        port, last_error
    )))
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    #[instrument(skip(self))]
    async fn launch(&self, headless: bool) -> Result<Arc<dyn BrowserSession>, Error> {
        let dir = std::env::temp_dir().join(format!("webpair-{}", uuid::Uuid::new_v4()));
        let result = self.start(Profile::Ephemeral(dir.clone()), headless).await;
        if result.is_err() {
            let _ = tokio::fs::remove_dir_all(&dir).await;
        }
        result
    }

    #[instrument(skip(self))]
    async fn launch_persistent(&self, profile_dir: &Path, headless: bool) -> Result<Arc<dyn BrowserSession>, Error> {
        self.start(Profile::Persistent(profile_dir.to_path_buf()), headless).await
    }
}
