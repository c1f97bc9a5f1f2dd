//! Unified error types for webpair-oxide

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for webpair-oxide
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Browser not found or already closed
    #[error("Browser not found: {0}")]
    BrowserNotFound(String),

    /// Page not found or already closed
    #[error("Page not found: {0}")]
    PageNotFound(String),

    /// Timeout of a single protocol command
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Navigation failed
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Script execution failed
    #[error("Script execution failed: {0}")]
    ScriptExecutionFailed(String),

    /// Bad or missing option
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The selected authentication strategy cannot be used
    #[error("Invalid auth strategy: {0}")]
    InvalidAuth(String),

    /// The QR element never appeared (or stopped appearing) within the retry budget
    #[error("QR code not found after {retries} retries on {url}")]
    QrExhausted { retries: u32, url: String },

    /// The persisted profile was asked to re-pair and has been removed
    #[error("Local session expired at {path}")]
    SessionExpired { path: String },

    /// Neither a QR prompt nor the loaded UI appeared; the profile is left intact
    #[error("Failed to load local session at {path} after {attempts} attempts")]
    SessionLoadFailed { attempts: u32, path: String },

    /// The browser runtime could not be started
    #[error("Browser runtime failed to start: {0}")]
    RuntimeStartup(String),

    /// `initialize` called on an initialized client
    #[error("Client is already initialized")]
    AlreadyInitialized,

    /// Operation requires an initialized client
    #[error("Client is not initialized")]
    NotInitialized,

    /// Initialization failed; the client was reverted to uninitialized
    #[error("Client initialization failed: {source}")]
    Initialization {
        #[source]
        source: Box<Error>,
    },

    /// One or more teardown steps failed during `stop`
    #[error("Client teardown failed: {}", failures.join("; "))]
    Teardown { failures: Vec<String> },

    /// One or more listeners failed during an emission
    #[error("{failures} listener(s) failed on '{event}'")]
    Listener { event: String, failures: usize },

    /// The authentication attempt was cancelled
    #[error("Authentication cancelled")]
    Cancelled,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new CDP error
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a new browser not found error
    pub fn browser_not_found<S: Into<String>>(id: S) -> Self {
        Error::BrowserNotFound(id.into())
    }

    /// Create a new page not found error
    pub fn page_not_found<S: Into<String>>(id: S) -> Self {
        Error::PageNotFound(id.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a new navigation failed error
    pub fn navigation_failed<S: Into<String>>(msg: S) -> Self {
        Error::NavigationFailed(msg.into())
    }

    /// Create a new script execution failed error
    pub fn script_execution_failed<S: Into<String>>(msg: S) -> Self {
        Error::ScriptExecutionFailed(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new runtime startup error
    pub fn runtime_startup<S: Into<String>>(msg: S) -> Self {
        Error::RuntimeStartup(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Unwrap an `Initialization` wrapper down to the error that caused it
    pub fn root(&self) -> &Error {
        match self {
            Error::Initialization { source } => source.root(),
            other => other,
        }
    }

    /// True when the root cause is an expired persisted session
    pub fn is_session_expired(&self) -> bool {
        matches!(self.root(), Error::SessionExpired { .. })
    }

    /// True when the root cause is an exhausted QR retry budget
    pub fn is_qr_exhausted(&self) -> bool {
        matches!(self.root(), Error::QrExhausted { .. })
    }

    /// True when the root cause is an indeterminate session restore
    pub fn is_session_load_failed(&self) -> bool {
        matches!(self.root(), Error::SessionLoadFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_looks_through_initialization() {
        let err = Error::Initialization {
            source: Box::new(Error::SessionExpired {
                path: ".webpair_auth/default-session/".to_string(),
            }),
        };

        assert!(err.is_session_expired());
        assert!(!err.is_qr_exhausted());
        assert!(matches!(err.root(), Error::SessionExpired { .. }));
    }

    #[test]
    fn test_teardown_message_lists_failures() {
        let err = Error::Teardown {
            failures: vec!["page: closed".to_string(), "browser: gone".to_string()],
        };
        assert_eq!(err.to_string(), "Client teardown failed: page: closed; browser: gone");
    }
}
