//! Pocket Print Daemon
//!
//! Listens on a serial link for printer traffic and saves every print job
//! to the gallery directory as a PNG.

mod config;
mod gallery;

use anyhow::{Context, Result};
use pocket_print_core::{start_session, SerialTransport, TransportHandle};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use gallery::Gallery;

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load configuration, writing the defaults on first run
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());

    if !Path::new(&config_path).exists() {
        if let Some(parent) = Path::new(&config_path).parent() {
            std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
        }
        Config::default().save(&config_path)?;
        info!("Wrote default configuration to: {}", config_path);
    }

    let config = Config::load(&config_path).context("Failed to load configuration")?;
    info!("Loaded configuration from: {}", config_path);

    let session = config.session_config()?;
    let gallery = Gallery::open(&config.output.dir, config.output.data_uri)?;
    info!(
        "Saving prints to {} ({} backend)",
        gallery.dir().display(),
        session.png.backend
    );

    // Start the session controller
    let (handle, controller) = start_session(session, move |image| match gallery.save(&image) {
        Ok(path) => info!(
            "Saved {}x{} print to {}",
            image.width(),
            image.height(),
            path.display()
        ),
        Err(e) => warn!("Failed to save print: {:#}", e),
    });

    // Start the serial link
    let transport = SerialTransport::new(&config.serial.device, config.serial.baud_rate);
    let reconnect = Duration::from_millis(config.serial.reconnect);
    let link_handle = handle.clone();
    let link = tokio::spawn(async move {
        link_loop(transport, link_handle, reconnect).await;
    });

    // Setup Unix signal handlers
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
        }
    }

    // Finalize whatever is in flight before exiting
    link.abort();
    let _ = link.await;
    handle.disconnect();
    drop(handle);
    controller.await.context("Session controller panicked")?;

    Ok(())
}

/// Keeps the serial link open, reopening it after failures or hangups.
async fn link_loop(transport: SerialTransport, handle: TransportHandle, reconnect: Duration) {
    let mut consecutive_errors: u32 = 0;
    let mut suppressed: u32 = 0;
    let mut last_error_log = Instant::now();

    loop {
        match transport.pump(&handle).await {
            Ok(()) => {
                if handle.is_closed() {
                    break;
                }
                info!("Serial link {} closed, reopening", transport.port_path());
                consecutive_errors = 0;
            }
            Err(e) => {
                consecutive_errors += 1;
                // Log the first failure, then at most once per minute
                let elapsed = last_error_log.elapsed();
                if consecutive_errors == 1 || elapsed >= Duration::from_secs(60) {
                    if suppressed > 0 {
                        warn!(
                            "Serial error (repeated {} times in {:?}): {}",
                            suppressed + 1,
                            elapsed,
                            e
                        );
                    } else {
                        warn!("Serial error: {}", e);
                    }
                    last_error_log = Instant::now();
                    suppressed = 0;
                } else {
                    suppressed += 1;
                }
            }
        }
        tokio::time::sleep(reconnect).await;
    }
}
