//! Client lifecycle tests
//!
//! Drive the public `Client` through fresh logins, persisted sessions, logout
//! and cancellation, with scripted browsers standing in for Chrome.

mod common;

use common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use webpair_oxide::browser::MockLauncher;
use webpair_oxide::events::READY;
use webpair_oxide::{listener, Client, ClientOptions, ClientState, Error, SessionStore};

fn store_for(options: &ClientOptions) -> SessionStore {
    SessionStore::new(&options.auth_dir, &options.session_id)
}

#[tokio::test]
async fn test_fresh_login_emits_qr_then_ready() {
    let opts = fast_options();
    let launcher = pairing_launcher(&opts, &["ref-a", "ref-a", "ref-b"]);
    let client = Client::builder().launcher(launcher.clone()).build();
    let codes = record_qr_codes(&client);

    let ready = Arc::new(AtomicUsize::new(0));
    {
        let ready = ready.clone();
        client.once(
            READY,
            listener(move |_| {
                ready.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
    }

    client.initialize(opts.clone()).await.unwrap();

    assert_eq!(*codes.lock().unwrap(), vec!["ref-a", "ref-b"]);
    assert_eq!(ready.load(Ordering::SeqCst), 1);
    assert_eq!(client.state().await, ClientState::Initialized);
    assert_eq!(launcher.page().network_idle_waits(), 1);
    assert_eq!(launcher.launches()[0].profile_dir, None);
    assert!(launcher.launches()[0].headless);

    client.stop().await.unwrap();
    assert_eq!(client.state().await, ClientState::Stopped);
    assert!(client.page().await.is_none());
    assert!(launcher.browser().is_closed());
}

#[tokio::test]
async fn test_local_session_survives_restart() {
    let root = tempfile::tempdir().unwrap();
    let opts = local_options(&root, "work");
    let store = store_for(&opts);

    // First run pairs by QR inside the persistent profile
    let first = pairing_launcher(&opts, &["ref-a"]);
    let client = Client::builder().launcher(first.clone()).build();
    let codes = record_qr_codes(&client);
    client.initialize(opts.clone()).await.unwrap();
    assert_eq!(*codes.lock().unwrap(), vec!["ref-a"]);
    assert_eq!(first.launches()[0].profile_dir, Some(store.path()));

    // Chrome writes the profile while the session is open
    std::fs::create_dir_all(store.path()).unwrap();
    client.stop().await.unwrap();

    // Second run restores it without a QR
    let second = logged_in_launcher(&opts);
    let client = Client::builder().launcher(second.clone()).build();
    let codes = record_qr_codes(&client);
    client.initialize(opts.clone()).await.unwrap();

    assert!(codes.lock().unwrap().is_empty());
    assert!(client.is_initialized().await);
    assert_eq!(second.page().probes(&opts.qr_selector), 1);
    assert_eq!(second.page().reload_count(), 0);
    assert!(store.exists());

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_expired_session_is_wiped_and_next_run_pairs_again() {
    let root = tempfile::tempdir().unwrap();
    let opts = local_options(&root, "default");
    let store = store_for(&opts);
    std::fs::create_dir_all(store.path()).unwrap();

    let expired = Arc::new(MockLauncher::new());
    expired.page().always(&opts.qr_selector, hit("ref-stale"));
    let client = Client::builder().launcher(expired.clone()).build();
    let codes = record_qr_codes(&client);

    let err = client.initialize(opts.clone()).await.unwrap_err();

    assert!(err.is_session_expired());
    assert!(matches!(err, Error::Initialization { .. }));
    assert!(!store.exists());
    assert!(expired.browser().is_closed());
    assert!(codes.lock().unwrap().is_empty());
    assert_eq!(client.state().await, ClientState::Uninitialized);

    // Nothing persisted any more: the next run pairs by QR
    let client = Client::builder()
        .launcher(pairing_launcher(&opts, &["ref-new"]))
        .build();
    let codes = record_qr_codes(&client);
    client.initialize(opts).await.unwrap();
    assert_eq!(*codes.lock().unwrap(), vec!["ref-new"]);
}

#[tokio::test]
async fn test_unresolved_session_keeps_profile() {
    let root = tempfile::tempdir().unwrap();
    let opts = ClientOptions {
        session_max_retries: 1,
        ..local_options(&root, "default")
    };
    let store = store_for(&opts);
    std::fs::create_dir_all(store.path()).unwrap();

    let launcher = Arc::new(MockLauncher::new());
    let client = Client::builder().launcher(launcher.clone()).build();

    let err = client.initialize(opts.clone()).await.unwrap_err();

    assert!(err.is_session_load_failed());
    assert!(store.exists());
    assert_eq!(launcher.page().reload_count(), 1);
    assert!(launcher.browser().is_closed());
}

#[tokio::test]
async fn test_logout_removes_persisted_session() {
    let root = tempfile::tempdir().unwrap();
    let opts = local_options(&root, "default");
    let store = store_for(&opts);
    std::fs::create_dir_all(store.path()).unwrap();

    let launcher = logged_in_launcher(&opts);
    let client = Client::builder().launcher(launcher.clone()).build();
    client.initialize(opts).await.unwrap();

    client.logout().await.unwrap();

    assert_eq!(client.state().await, ClientState::Stopped);
    assert!(launcher.browser().is_closed());
    assert!(!store.exists());
}

#[tokio::test]
async fn test_qr_exhaustion_reverts_client() {
    let opts = ClientOptions {
        max_retries: 2,
        ..fast_options()
    };
    let launcher = Arc::new(MockLauncher::new());
    let client = Client::builder().launcher(launcher.clone()).build();

    let err = client.initialize(opts).await.unwrap_err();

    assert!(err.is_qr_exhausted());
    assert_eq!(client.state().await, ClientState::Uninitialized);
    assert!(launcher.browser().is_closed());
    assert_eq!(launcher.page().network_idle_waits(), 0);
}

#[tokio::test]
async fn test_cancel_aborts_pending_login() {
    let opts = ClientOptions {
        qr_poll_interval_ms: 20,
        ..Default::default()
    };
    let launcher = Arc::new(MockLauncher::new());
    launcher.page().always(&opts.qr_selector, hit("ref-a"));
    let client = Arc::new(Client::builder().launcher(launcher.clone()).build());
    let codes = record_qr_codes(&client);

    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.initialize(opts).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    client.cancellation_token().cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err.root(), Error::Cancelled));
    assert_eq!(*codes.lock().unwrap(), vec!["ref-a"]);
    assert_eq!(client.state().await, ClientState::Uninitialized);
    assert!(launcher.browser().is_closed());

    // A later initialize gets a fresh token
    assert!(!client.cancellation_token().is_cancelled());
}
