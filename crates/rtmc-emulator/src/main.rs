//! RTMC card emulator entry point.
//!
//! Runs an [`EmulationServer`] until Ctrl+C, so client programs can be
//! exercised against something that behaves like a card.
//!
//! # Usage
//!
//! ```text
//! rtmc-emulator [OPTIONS]
//!
//! Options:
//!   --config   <PATH>   TOML config file (fields default when absent)
//!   --token    <TOKEN>  API token clients must present
//!   --bind     <ADDR>   Address to bind [default from config: 127.0.0.1]
//!   --tcp-port <PORT>   Control port   [default from config: 65001]
//!   --udp-port <PORT>   Discovery port [default from config: 65002]
//!   --no-udp            Do not answer discovery over UDP
//!   --service  <NAME>   Service name matched by discovery queries
//! ```
//!
//! Command-line values override the config file.  Every option can also be
//! set through the `RTMC_*` environment variable shown in `--help`.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rtmc_emulator::domain::{load_config, EmulatorConfig};
use rtmc_emulator::EmulationServer;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Bare-bones RTMC card emulator.
#[derive(Debug, Parser)]
#[command(
    name = "rtmc-emulator",
    about = "Bare-bones RTMC card emulator for testing client connection logic",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "RTMC_CONFIG")]
    config: Option<PathBuf>,

    /// API token clients must send with `auth`.
    #[arg(long, env = "RTMC_TOKEN")]
    token: Option<String>,

    /// IP address the TCP listener binds to (discovery listens on all interfaces).
    #[arg(long, env = "RTMC_BIND")]
    bind: Option<IpAddr>,

    /// TCP control port (0 = pick a free port).
    #[arg(long, env = "RTMC_TCP_PORT")]
    tcp_port: Option<u16>,

    /// UDP discovery port (0 = pick a free port).
    #[arg(long, env = "RTMC_UDP_PORT")]
    udp_port: Option<u16>,

    /// Disable the UDP discovery listener.
    #[arg(long, env = "RTMC_NO_UDP")]
    no_udp: bool,

    /// Service name reported by discovery.
    #[arg(long, env = "RTMC_SERVICE")]
    service: Option<String>,
}

impl Cli {
    /// Builds the [`EmulatorConfig`]: config file (or defaults) first, then
    /// command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or no API token
    /// is configured anywhere.
    fn into_emulator_config(self) -> anyhow::Result<EmulatorConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => EmulatorConfig::default(),
        };

        if let Some(token) = self.token {
            config.api_token = token;
        }
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.tcp_port {
            config.tcp_port = port;
        }
        if let Some(port) = self.udp_port {
            config.udp_port = port;
        }
        if self.no_udp {
            config.udp_enabled = false;
        }
        if let Some(service) = self.service {
            config.service = service;
        }

        if config.api_token.is_empty() {
            bail!("an API token is required (--token, RTMC_TOKEN, or api_token in the config file)");
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_emulator_config()?;
    info!(
        "RTMC emulator starting: service={}, tcp={}:{}",
        config.service, config.bind_address, config.tcp_port
    );

    let server = EmulationServer::new(config);
    server
        .start()
        .await
        .context("failed to start emulation server")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("received Ctrl+C, shutting down");

    server.stop().await;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
