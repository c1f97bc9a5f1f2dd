//! Common test utilities
//!
//! This module provides shared test helpers and fixtures for all integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use webpair_oxide::browser::{MockLauncher, MockPage};
use webpair_oxide::events::QR;
use webpair_oxide::{listener, AuthKind, Client, ClientOptions};

/// Options that never sleep between QR probes
pub fn fast_options() -> ClientOptions {
    ClientOptions {
        qr_poll_interval_ms: 0,
        ..Default::default()
    }
}

/// Options for a persisted session rooted in `dir`
pub fn local_options(dir: &tempfile::TempDir, session_id: &str) -> ClientOptions {
    ClientOptions {
        auth: AuthKind::Local,
        auth_dir: dir.path().to_string_lossy().into_owned(),
        session_id: session_id.to_string(),
        ..fast_options()
    }
}

/// Probe outcome carrying `value` as the element's attribute
pub fn hit(value: &str) -> Option<String> {
    Some(value.to_string())
}

/// Launcher whose page shows `codes` in turn, then the main UI
pub fn pairing_launcher(options: &ClientOptions, codes: &[&str]) -> Arc<MockLauncher> {
    let page = Arc::new(MockPage::new());
    page.script(
        &options.qr_selector,
        codes.iter().map(|code| hit(code)).chain([None]),
    );
    page.always(&options.loaded_selector, hit(""));
    Arc::new(MockLauncher::with_page(page))
}

/// Launcher whose page renders the main UI straight away
pub fn logged_in_launcher(options: &ClientOptions) -> Arc<MockLauncher> {
    let launcher = Arc::new(MockLauncher::new());
    launcher.page().always(&options.loaded_selector, hit(""));
    launcher
}

/// Record the raw data of every `qr` event the client emits
pub fn record_qr_codes(client: &Client) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    client.on(
        QR,
        listener(move |payload| {
            if let Some(qr) = payload.as_qr() {
                sink.lock().unwrap().push(qr.raw_data().to_string());
            }
            Ok(())
        }),
    );
    seen
}
