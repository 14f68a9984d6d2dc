// Connection Manager - Main Entry Point
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Connection Manager
//!
//! Keeps a gateway online by failing over between prioritised uplinks
//! (Ethernet, Wi-Fi and cellular modems with several SIM slots) through
//! NetworkManager and ModemManager.
//!
//! This is the main entry point for the daemon.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod dbus;
mod models;
mod services;

use dbus::{MmClient, NmClient};
use models::AppConfig;
use services::{FailoverEngine, Prober};

/// Human-readable application name.
pub const APP_NAME: &str = "Connection Manager";

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Print version information and exit.
fn print_version() {
    println!("{} {}", APP_NAME, VERSION);
    println!("Copyright (C) 2026 Christos A. Daggas");
    println!("License: MIT");
    println!();
    println!("Priority-based uplink failover for NetworkManager gateways.");
}

/// Print help information and exit.
fn print_help() {
    println!("Usage: {} [OPTIONS]", env::args().next().unwrap_or_else(|| "connection-manager".to_string()));
    println!();
    println!("Priority-based uplink failover for NetworkManager gateways.");
    println!();
    println!("Options:");
    println!("  -h, --help           Show this help message and exit");
    println!("  -v, --version        Show version information and exit");
    println!("  -d, --debug          Enable debug logging");
    println!("  -c, --config <PATH>  Configuration file (default: {})", default_config_path().display());
    println!();
    println!("Environment variables:");
    println!("  RUST_LOG             Set log level (trace, debug, info, warn, error)");
}

fn default_config_path() -> PathBuf {
    PathBuf::from(models::CONFIG_DIR).join(models::CONFIG_FILE_NAME)
}

/// Load the configuration; a missing file means built-in defaults.
fn load_config(path: &Path) -> models::Result<AppConfig> {
    if path.exists() {
        AppConfig::load_from_file(path)
    } else {
        Ok(AppConfig::default())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let mut debug_mode = false;
    let mut config_path = default_config_path();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "-v" | "--version" => {
                print_version();
                return ExitCode::SUCCESS;
            }
            "-d" | "--debug" => {
                debug_mode = true;
            }
            "-c" | "--config" => match iter.next() {
                Some(path) => config_path = PathBuf::from(path),
                None => {
                    eprintln!("Option {} requires a path", arg);
                    return ExitCode::FAILURE;
                }
            },
            _ => {
                eprintln!("Unknown option: {}", arg);
                eprintln!("Try '--help' for more information.");
                return ExitCode::FAILURE;
            }
        }
    }

    let config = load_config(&config_path);

    let log_level = match &config {
        _ if debug_mode => tracing::Level::DEBUG,
        Ok(config) => config.log_level.parse().unwrap_or(tracing::Level::INFO),
        Err(_) => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(log_level.into()),
        )
        .init();

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration {}: {}", config_path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(
        "Uplinks: {:?}",
        config.uplinks.iter().map(|u| u.id.as_str()).collect::<Vec<_>>()
    );

    let network = match NmClient::connect().await {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Cannot start without NetworkManager: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let modem = MmClient::new(network.connection().clone());
    let probe = Prober::from_config(&config.probe);
    tracing::info!("Connectivity probe: {}", config.probe.kind.as_str());

    let mut engine = FailoverEngine::new(network, modem, probe, &config);
    let period = config.check_period();

    // No signal handler: SIGINT and SIGTERM terminate the process.
    loop {
        match engine.check().await {
            Ok(report) => tracing::debug!("Cycle finished: {:?}", report),
            Err(e) => tracing::error!("Check cycle failed: {}", e),
        }
        tokio::time::sleep(period).await;
    }
}
