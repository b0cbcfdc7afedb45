//! # Gamepad Bridge
//!
//! Replay remote virtual gamepads onto Linux kernel input devices.
//!
//! This application dials one producer socket per device slot and mirrors
//! every gamepad it receives onto a uinput virtual device.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use gamepad_bridge::bridge::Bridge;
use gamepad_bridge::config::Config;
use gamepad_bridge::device::uinput::UinputController;

/// Main entry point for Gamepad Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (`GAMEPAD_BRIDGE_CONFIG`, `GAMEPAD_BRIDGE_STABLE_SLOTS`)
///    - Set up logging to stdout or the configured log file
///
/// 2. **Main Loop**
///    - One supervisor per socket, each reconnecting forever
///    - Status transitions and periodic stats logged by the bridge
///
/// 3. **Shutdown**
///    - Ctrl+C or a fatal error stops every supervisor
///    - All virtual devices are destroyed before exit
///
/// # Errors
///
/// Returns error (non-zero exit) if:
/// - The configuration cannot be loaded
/// - The uinput control file cannot be opened
///
/// # Examples
///
/// ```bash
/// GAMEPAD_BRIDGE_STABLE_SLOTS=1 RUST_LOG=debug cargo run --release
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    let log_file = config.as_ref().ok().and_then(|c| c.logging.file.clone());
    let _guard = init_logging(log_file.as_deref())?;

    let config = config.context("Failed to load configuration")?;
    info!("Gamepad Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let bridge = Bridge::new(&config, |_| UinputController::new());
    info!("Press Ctrl+C to exit");

    bridge
        .run(shutdown_signal())
        .await
        .context("Gamepad Bridge stopped")?;

    info!("Gamepad Bridge stopped");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// Log level comes from `RUST_LOG` (default info). With a log file the
/// returned guard must stay alive to flush buffered lines.
fn init_logging(file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());

    let Some(path) = file else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    };

    let (dir, name) = log_file_parts(path)
        .with_context(|| format!("Invalid log file path {}", path.display()))?;
    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

/// Level filter from `RUST_LOG` directives; unset, empty or invalid means info.
fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Splits a log file path into its directory and file name
fn log_file_parts(path: &Path) -> Option<(PathBuf, OsString)> {
    let name = path.file_name()?.to_os_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, name))
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down..."),
        Err(e) => {
            error!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
