//! Multicast - plays a YouTube channel across a pool of Chromecasts.
//!
//! Every selected device gets a different video; whenever one finishes, it
//! is handed the next video nobody else is playing. Ctrl+C stops every
//! device and exits.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use multicast_core::{bootstrap, MulticastError};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

/// Multicast - keeps every Chromecast busy with a distinct channel video.
#[derive(Parser, Debug)]
#[command(name = "multicast")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Device names to use, followed by the channel/user URL.
    /// With no device names every discovered device is used.
    #[arg(required = true, num_args = 1.., value_name = "DEVICE ... CATALOG_URL")]
    targets: Vec<String>,

    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "MULTICAST_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// MIME type sent with every load (overrides config file).
    #[arg(long, env = "MULTICAST_CONTENT_TYPE")]
    content_type: Option<String>,
}

impl Args {
    /// Splits the positional arguments into device filters and the URL.
    fn filters_and_url(&self) -> (&[String], &str) {
        match self.targets.split_last() {
            Some((url, filters)) => (filters, url.as_str()),
            None => (&[], ""),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Multicast v{}", env!("CARGO_PKG_VERSION"));

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = exit_code(&e);
            log::error!("Exiting with status {} ({})", code, error_code(&e));
            eprintln!("Error: {:#}", e);
            ExitCode::from(code)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(content_type) = &args.content_type {
        config.content_type = content_type.clone();
    }

    let core_config = config.to_core_config();
    let (filters, url) = args.filters_and_url();
    if filters.is_empty() {
        log::info!("Configuration: all devices, source={}", url);
    } else {
        log::info!("Configuration: devices=[{}], source={}", filters.join(", "), url);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            log::info!("Shutdown signal received, stopping all devices...");
            cancel.cancel();
        }
    });

    let dispatcher = tokio::select! {
        _ = cancel.cancelled() => {
            log::info!("Interrupted during startup");
            return Ok(());
        }
        result = bootstrap(&core_config, url, filters, cancel.clone()) => result?,
    };

    log::info!("{} device(s) ready", dispatcher.devices().len());
    println!("Press Ctrl+C to stop all casting and terminate script.");

    dispatcher.run().await?;

    log::info!("Shutdown complete");
    Ok(())
}

/// Maps a failure to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<MulticastError>()
        .map_or(1, MulticastError::exit_code)
}

/// Machine-readable name of a failure, for the log.
fn error_code(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<MulticastError>()
        .map_or("unexpected", MulticastError::code)
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
