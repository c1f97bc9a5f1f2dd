//! # Webpair runner
//!
//! Logs a browser session into the configured web app and keeps it open until
//! interrupted.
//!
//! ## Flow
//! - Load options (`WEBPAIR_CONFIG` TOML file, else `WEBPAIR_*` variables)
//! - Launch Chrome and authenticate with the configured strategy
//! - Print every new QR payload on stdout, one per line, for an external
//!   renderer (e.g. `qrencode -t ansiutf8`)
//! - On SIGINT/SIGTERM: abort a pending login, or stop the client
//!
//! ## Environment variables
//! - `WEBPAIR_CONFIG`: path of a TOML options file
//! - `WEBPAIR_AUTH`: `none` or `local` (default: none)
//! - `WEBPAIR_HEADLESS`: run without a window (default: true)
//! - `RUST_LOG`: log filter, overrides `log_level`

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use webpair_oxide::{
    events::{QR, READY},
    listener, ChromeLauncher, Client, ClientOptions, Error,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = match std::env::var("WEBPAIR_CONFIG") {
        Ok(path) => ClientOptions::from_file(&path)?,
        Err(_) => ClientOptions::from_env()?,
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Webpair-Oxide v{}", webpair_oxide::VERSION);
    info!(
        "Configuration loaded: url={}, auth={:?}, headless={}",
        options.web_url, options.auth, options.headless
    );

    let client = Client::builder()
        .launcher(Arc::new(ChromeLauncher::from_options(&options)))
        .build();

    client.on(
        QR,
        listener(|payload| {
            if let Some(qr) = payload.as_qr() {
                println!("{}", qr.raw_data());
            }
            Ok(())
        }),
    );
    client.once(
        READY,
        listener(|_| {
            info!("Logged in; press Ctrl+C to stop");
            Ok(())
        }),
    );

    let shutdown = CancellationToken::new();
    let login = client.cancellation_token();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            login.cancel();
            shutdown.cancel();
        });
    }

    match client.initialize(options).await {
        Ok(()) => {}
        Err(e) if matches!(e.root(), Error::Cancelled) => {
            info!("Login aborted");
            return Ok(());
        }
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    }

    shutdown.cancelled().await;

    info!("Shutdown signal received, stopping client...");
    if let Err(e) = client.stop().await {
        error!("Failed to stop client: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received SIGINT signal");
                    }
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C signal");
    }
}
