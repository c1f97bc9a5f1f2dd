//! Webpair-Oxide: QR-pairing login for browser-driven web apps
//!
//! This library drives a Chrome browser over the DevTools Protocol, pairs a
//! fresh session by QR code, and restores persisted sessions on later runs.

pub mod error;
pub mod config;

pub mod cdp;
pub mod browser;
pub mod events;
pub mod auth;
pub mod client;

// Re-exports
pub use error::{Error, Result};
pub use config::{AuthKind, ClientOptions};
pub use auth::{AuthStrategy, LocalAuth, NoAuth, QrSnapshot, SessionStore};
pub use browser::{BrowserLauncher, ChromeLauncher, Page};
pub use client::{Client, ClientBuilder, ClientState};
pub use events::{listener, Listener, Notifier, Payload};

/// Webpair-Oxide library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
