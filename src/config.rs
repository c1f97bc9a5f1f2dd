//! Configuration management for webpair-oxide

use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// Which authentication strategy the client should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    /// Fresh QR pairing on every start, nothing persisted
    #[default]
    None,
    /// Persisted browser profile under `auth_dir`/`session_id`
    Local,
}

impl std::str::FromStr for AuthKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "noauth" => Ok(AuthKind::None),
            "local" | "localauth" => Ok(AuthKind::Local),
            other => Err(Error::InvalidAuth(format!("unknown auth strategy '{}'", other))),
        }
    }
}

/// Client configuration
///
/// All fields have defaults; a value of this type is complete once constructed
/// and is only ever read by the authentication protocols.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Login page of the target web app
    pub web_url: String,

    /// Run the browser without a window
    pub headless: bool,

    /// Selector of the element carrying the QR payload
    pub qr_selector: String,

    /// Attribute on `qr_selector` holding the raw QR data
    pub qr_attribute: String,

    /// Selector that only exists once the app's main UI has rendered
    pub loaded_selector: String,

    /// Consecutive QR misses tolerated by the fresh-login protocol
    pub max_retries: u32,

    /// Reload budget of the session validation protocol (attempts = n + 1)
    pub session_max_retries: u32,

    /// Per-attempt QR probe timeout during pairing, in milliseconds
    pub qr_probe_timeout_ms: u64,

    /// Loaded-UI probe timeout during pairing, in milliseconds
    pub loaded_probe_timeout_ms: u64,

    /// QR and loaded-UI probe timeout during session validation, in milliseconds
    pub session_probe_timeout_ms: u64,

    /// Reload the page every N consecutive QR misses
    pub reload_every: u32,

    /// Pause between QR reads while a code is on screen, in milliseconds
    pub qr_poll_interval_ms: u64,

    /// Upper bound for the post-login network idle wait, in milliseconds
    pub network_idle_timeout_ms: u64,

    /// Authentication strategy
    pub auth: AuthKind,

    /// Root directory of persisted sessions
    pub auth_dir: String,

    /// Session identifier under `auth_dir`
    pub session_id: String,

    /// Chrome executable path
    pub chrome_path: Option<String>,

    /// Log level
    pub log_level: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            web_url: "https://web.whatsapp.com/".to_string(),
            headless: true,
            qr_selector: "div[data-ref]".to_string(),
            qr_attribute: "data-ref".to_string(),
            loaded_selector: "#pane-side".to_string(),
            max_retries: 5,
            session_max_retries: 3,
            qr_probe_timeout_ms: 5000,
            loaded_probe_timeout_ms: 1000,
            session_probe_timeout_ms: 5000,
            reload_every: 3,
            qr_poll_interval_ms: 500,
            network_idle_timeout_ms: 30000,
            auth: AuthKind::None,
            auth_dir: ".webpair_auth".to_string(),
            session_id: "default".to_string(),
            chrome_path: None,
            log_level: "info".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: String) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::configuration(format!("Invalid {}", name)))
}

impl ClientOptions {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = ClientOptions::default();

        if let Ok(url) = env::var("WEBPAIR_WEB_URL") {
            config.web_url = url;
        }

        if let Ok(headless) = env::var("WEBPAIR_HEADLESS") {
            config.headless = parse_var("WEBPAIR_HEADLESS", headless)?;
        }

        if let Ok(selector) = env::var("WEBPAIR_QR_SELECTOR") {
            config.qr_selector = selector;
        }

        if let Ok(attribute) = env::var("WEBPAIR_QR_ATTRIBUTE") {
            config.qr_attribute = attribute;
        }

        if let Ok(selector) = env::var("WEBPAIR_LOADED_SELECTOR") {
            config.loaded_selector = selector;
        }

        if let Ok(retries) = env::var("WEBPAIR_MAX_RETRIES") {
            config.max_retries = parse_var("WEBPAIR_MAX_RETRIES", retries)?;
        }

        if let Ok(retries) = env::var("WEBPAIR_SESSION_MAX_RETRIES") {
            config.session_max_retries = parse_var("WEBPAIR_SESSION_MAX_RETRIES", retries)?;
        }

        if let Ok(timeout) = env::var("WEBPAIR_QR_TIMEOUT_MS") {
            config.qr_probe_timeout_ms = parse_var("WEBPAIR_QR_TIMEOUT_MS", timeout)?;
        }

        if let Ok(timeout) = env::var("WEBPAIR_LOADED_TIMEOUT_MS") {
            config.loaded_probe_timeout_ms = parse_var("WEBPAIR_LOADED_TIMEOUT_MS", timeout)?;
        }

        if let Ok(timeout) = env::var("WEBPAIR_SESSION_TIMEOUT_MS") {
            config.session_probe_timeout_ms = parse_var("WEBPAIR_SESSION_TIMEOUT_MS", timeout)?;
        }

        if let Ok(period) = env::var("WEBPAIR_RELOAD_EVERY") {
            config.reload_every = parse_var("WEBPAIR_RELOAD_EVERY", period)?;
        }

        if let Ok(interval) = env::var("WEBPAIR_QR_POLL_INTERVAL_MS") {
            config.qr_poll_interval_ms = parse_var("WEBPAIR_QR_POLL_INTERVAL_MS", interval)?;
        }

        if let Ok(timeout) = env::var("WEBPAIR_NETWORK_IDLE_TIMEOUT_MS") {
            config.network_idle_timeout_ms = parse_var("WEBPAIR_NETWORK_IDLE_TIMEOUT_MS", timeout)?;
        }

        if let Ok(auth) = env::var("WEBPAIR_AUTH") {
            config.auth = auth.parse()?;
        }

        if let Ok(dir) = env::var("WEBPAIR_AUTH_DIR") {
            config.auth_dir = dir;
        }

        if let Ok(session_id) = env::var("WEBPAIR_SESSION_ID") {
            config.session_id = session_id;
        }

        if let Ok(chrome_path) = env::var("WEBPAIR_CHROME_PATH") {
            config.chrome_path = Some(chrome_path);
        }

        if let Ok(log_level) = env::var("WEBPAIR_LOG_LEVEL") {
            config.log_level = log_level;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))
    }

    /// Reject options no protocol can run with
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("web_url", &self.web_url),
            ("qr_selector", &self.qr_selector),
            ("qr_attribute", &self.qr_attribute),
            ("loaded_selector", &self.loaded_selector),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::configuration(format!("{} must not be empty", name)));
            }
        }

        if self.reload_every == 0 {
            return Err(Error::configuration("reload_every must be at least 1"));
        }

        if self.auth == AuthKind::Local {
            const SEPARATORS: [char; 2] = ['/', '\\'];
            if self.auth_dir.trim().trim_end_matches(SEPARATORS).is_empty() {
                return Err(Error::configuration("auth_dir must name a directory for local auth"));
            }
            if self.session_id.replace(SEPARATORS, "").trim().is_empty() {
                return Err(Error::configuration("session_id must not be empty for local auth"));
            }
        }

        let timeouts = [
            ("qr_probe_timeout_ms", self.qr_probe_timeout_ms),
            ("loaded_probe_timeout_ms", self.loaded_probe_timeout_ms),
            ("session_probe_timeout_ms", self.session_probe_timeout_ms),
            ("network_idle_timeout_ms", self.network_idle_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(Error::configuration(format!("{} must be positive", name)));
            }
        }

        Ok(())
    }

    pub(crate) fn qr_probe_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.qr_probe_timeout_ms)
    }

    pub(crate) fn loaded_probe_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.loaded_probe_timeout_ms)
    }

    pub(crate) fn session_probe_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.session_probe_timeout_ms)
    }

    pub(crate) fn qr_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.qr_poll_interval_ms)
    }

    pub(crate) fn network_idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.network_idle_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = ClientOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.auth, AuthKind::None);
        assert_eq!(options.reload_every, 3);
    }

    #[test]
    fn test_from_toml_overrides_and_keeps_defaults() {
        let options = ClientOptions::from_toml(
            r#"
            headless = false
            auth = "local"
            session_id = "work"
            max_retries = 8
            "#,
        )
        .unwrap();

        assert!(!options.headless);
        assert_eq!(options.auth, AuthKind::Local);
        assert_eq!(options.session_id, "work");
        assert_eq!(options.max_retries, 8);
        assert_eq!(options.qr_selector, "div[data-ref]");
    }

    #[test]
    fn test_validate_rejects_zero_reload_period() {
        let options = ClientOptions {
            reload_every: 0,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_empty_selector() {
        let options = ClientOptions {
            loaded_selector: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_unusable_local_store() {
        let local = ClientOptions {
            auth: AuthKind::Local,
            ..Default::default()
        };
        assert!(local.validate().is_ok());

        for auth_dir in ["", "/", "  "] {
            let options = ClientOptions {
                auth_dir: auth_dir.to_string(),
                ..local.clone()
            };
            assert!(matches!(options.validate(), Err(Error::Configuration(_))), "{:?}", auth_dir);
        }

        let options = ClientOptions {
            session_id: "//".to_string(),
            ..local.clone()
        };
        assert!(matches!(options.validate(), Err(Error::Configuration(_))));

        // Only a persisted session needs a store
        let ephemeral = ClientOptions {
            auth_dir: String::new(),
            ..Default::default()
        };
        assert!(ephemeral.validate().is_ok());
    }

    #[test]
    fn test_auth_kind_parse() {
        assert_eq!("Local".parse::<AuthKind>().unwrap(), AuthKind::Local);
        assert!(matches!("legacy".parse::<AuthKind>(), Err(Error::InvalidAuth(_))));
    }
}
