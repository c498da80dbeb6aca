//! RTMC client: one-shot command line tool.
//!
//! Connects to a card, authenticates, sends one command, prints the JSON
//! reply on stdout and disconnects.
//!
//! # Usage
//!
//! ```text
//! rtmc [OPTIONS] --token <TOKEN> <COMMAND>...
//!
//! Options:
//!   --host       <ADDR>   Card address            [default: 127.0.0.1]
//!   --port       <PORT>   Card control port       [default: 65001]
//!   --token      <TOKEN>  API token               [env: RTMC_TOKEN]
//!   --timeout-ms <MS>     Connect and I/O timeout [default: 1000]
//! ```
//!
//! The command words are joined with single spaces and sent verbatim, e.g.
//! `rtmc --token dummy_token discover 'rtmc*'`.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rtmc_client::Device;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Send one command to an RTMC card.
#[derive(Debug, Parser)]
#[command(name = "rtmc", about = "Send one command to an RTMC card", version)]
struct Cli {
    /// Card IP address.
    #[arg(long, env = "RTMC_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Card TCP control port.
    #[arg(long, env = "RTMC_PORT", default_value_t = 65001)]
    port: u16,

    /// API token sent with `auth`.
    #[arg(long, env = "RTMC_TOKEN")]
    token: String,

    /// Timeout for the dial and for every read and write, in milliseconds.
    #[arg(long, env = "RTMC_TIMEOUT_MS", default_value_t = 1000)]
    timeout_ms: u64,

    /// Command to send, e.g. `discover rtmc*`.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Cli {
    fn command_text(&self) -> String {
        self.command.join(" ")
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the reply.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let device = Device::new(cli.host, cli.port);

    let reply = device
        .connect(&cli.token, cli.timeout())
        .await
        .with_context(|| format!("failed to connect to {}", device.addr()))?;
    if !reply.is_okay() {
        println!("{reply}");
        bail!("connection to {} refused", device.addr());
    }

    let result = device.send(&cli.command_text()).await;
    device.disconnect().await;

    let reply = result.context("command failed")?;
    println!("{reply}");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_joins_command_words() {
        // Arrange
        let cli = Cli::parse_from(["rtmc", "--token", "t", "discover", "rtmc*"]);

        // Act / Assert
        assert_eq!(cli.command_text(), "discover rtmc*");
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["rtmc", "--token", "t", "xyz"]);
        assert_eq!(cli.host.to_string(), "127.0.0.1");
        assert_eq!(cli.port, 65001);
        assert_eq!(cli.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_cli_overrides_host_port_and_timeout() {
        let cli = Cli::parse_from([
            "rtmc",
            "--host",
            "10.0.0.5",
            "--port",
            "7001",
            "--timeout-ms",
            "250",
            "--token",
            "t",
            "auth",
            "t",
        ]);
        assert_eq!(cli.host.to_string(), "10.0.0.5");
        assert_eq!(cli.port, 7001);
        assert_eq!(cli.timeout(), Duration::from_millis(250));
        assert_eq!(cli.command_text(), "auth t");
    }

    #[test]
    fn test_cli_requires_a_command() {
        assert!(Cli::try_parse_from(["rtmc", "--token", "t"]).is_err());
    }
}
