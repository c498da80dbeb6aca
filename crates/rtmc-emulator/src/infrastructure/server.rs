//! Emulation server lifecycle: start, stop, and read-only accessors.
//!
//! ```text
//!            start()                      stop()
//!  Stopped ──────────▶ Running ───────────────────▶ Stopped
//!             binds TCP (+UDP),          flips flag, signals shutdown,
//!             spawns listener tasks      joins listener tasks
//! ```
//!
//! # Guarantees
//!
//! - Both sockets are bound before `start()` returns, so a caller can dial
//!   the control port immediately afterwards.
//! - `stop()` returns only after the listener tasks, and through them every
//!   connection task, have exited and dropped their sockets.  Calling
//!   `start()` again can rebind the same ports.
//! - `start()` and `stop()` are serialised by an async mutex, so a restart
//!   never overlaps a shutdown that is still draining.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{
    atomic::{AtomicBool, AtomicU16, Ordering},
    Arc,
};

use rtmc_core::DiscoveryInfo;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::application::CommandDispatcher;
use crate::domain::EmulatorConfig;
use crate::infrastructure::tcp_listener::{bind_control_listener, run_tcp_listener, ListenerContext};
use crate::infrastructure::udp_discovery::{bind_discovery_socket, run_discovery_listener};

/// Error type for emulation server operations.
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// The TCP control port could not be bound.
    #[error("failed to bind TCP control port on {addr}: {source}")]
    TcpBindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The UDP discovery port could not be bound.
    #[error("failed to bind UDP discovery port {port}: {source}")]
    UdpBindFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// Runtime state that exists only while the server is running.
struct Listeners {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

/// A bare-bones RTMC card.
///
/// Answers `auth` and `discover` on the TCP control port and `discover` on
/// the UDP discovery port.  Every other command is refused with
/// `"command not supported by emulator"`.
///
/// # Example
///
/// ```no_run
/// use rtmc_emulator::{EmulationServer, EmulatorConfig};
///
/// # async fn run() -> Result<(), rtmc_emulator::EmulatorError> {
/// let server = EmulationServer::new(EmulatorConfig::new("dummy_token"));
/// server.start().await?;
/// // ... exercise a client against server.tcp_addr() ...
/// server.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct EmulationServer {
    config: Arc<EmulatorConfig>,
    running: Arc<AtomicBool>,
    bound_tcp_port: AtomicU16,
    bound_udp_port: AtomicU16,
    listeners: Mutex<Option<Listeners>>,
}

impl EmulationServer {
    /// Creates a stopped server.
    pub fn new(config: EmulatorConfig) -> Self {
        Self {
            config: Arc::new(config),
            running: Arc::new(AtomicBool::new(false)),
            bound_tcp_port: AtomicU16::new(0),
            bound_udp_port: AtomicU16::new(0),
            listeners: Mutex::new(None),
        }
    }

    /// Binds the listening sockets and spawns the listener tasks.
    ///
    /// Does nothing if the server is already running.
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError`] if a port cannot be bound; the server then
    /// stays stopped and no socket is left open.
    pub async fn start(&self) -> Result<(), EmulatorError> {
        let mut listeners = self.listeners.lock().await;
        if listeners.is_some() {
            return Ok(());
        }

        let tcp_addr = SocketAddr::new(self.config.bind_address, self.config.tcp_port);
        let tcp_listener = bind_control_listener(tcp_addr)
            .map_err(|source| EmulatorError::TcpBindFailed { addr: tcp_addr, source })?;
        let tcp_port = tcp_listener
            .local_addr()
            .map_err(|source| EmulatorError::TcpBindFailed { addr: tcp_addr, source })?
            .port();

        let udp_socket = if self.config.udp_enabled {
            let socket = bind_discovery_socket(
                self.config.udp_port,
                self.config.udp_multicast_group,
                self.config.bind_address,
            )
            .and_then(|socket| socket.local_addr().map(|addr| (socket, addr.port())))
            .map_err(|source| EmulatorError::UdpBindFailed {
                port: self.config.udp_port,
                source,
            })?;
            Some(socket)
        } else {
            None
        };

        let dispatcher = Arc::new(CommandDispatcher::new(
            self.config.api_token.clone(),
            DiscoveryInfo {
                service: self.config.service.clone(),
                port: tcp_port,
                device: self.config.device.clone(),
                serial_number: self.config.serial_number.clone(),
                firmware_version: self.config.firmware_version.clone(),
            },
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = ListenerContext {
            dispatcher,
            running: Arc::clone(&self.running),
            shutdown: shutdown_rx,
            poll_interval: self.config.poll_interval(),
        };

        // The flag must be set before the loops take their first look at it.
        self.running.store(true, Ordering::Release);
        self.bound_tcp_port.store(tcp_port, Ordering::Release);

        let mut tasks = vec![tokio::spawn(run_tcp_listener(tcp_listener, ctx.clone()))];
        info!("emulator listening on TCP {}:{tcp_port}", self.config.bind_address);

        if let Some((socket, udp_port)) = udp_socket {
            self.bound_udp_port.store(udp_port, Ordering::Release);
            tasks.push(tokio::spawn(run_discovery_listener(socket, ctx)));
            info!(
                "emulator answering discovery on UDP {udp_port} (group {})",
                self.config.udp_multicast_group
            );
        }

        *listeners = Some(Listeners { shutdown_tx, tasks });
        Ok(())
    }

    /// Stops the listeners and waits until they have fully exited.
    ///
    /// Does nothing if the server is not running.
    pub async fn stop(&self) {
        let mut listeners = self.listeners.lock().await;
        let Some(Listeners { shutdown_tx, tasks }) = listeners.take() else {
            return;
        };

        self.running.store(false, Ordering::Release);
        // Receivers only disappear once their tasks have exited.
        let _ = shutdown_tx.send(true);

        for task in tasks {
            if let Err(e) = task.await {
                error!("listener task failed: {e}");
            }
        }

        self.bound_tcp_port.store(0, Ordering::Release);
        self.bound_udp_port.store(0, Ordering::Release);
        info!("emulator stopped");
    }

    /// `true` between a successful `start()` and the next `stop()`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Address the listeners bind to.
    pub fn ipv4_addr(&self) -> IpAddr {
        self.config.bind_address
    }

    /// Control port: the bound port while running, the configured one otherwise.
    pub fn tcp_port(&self) -> u16 {
        match self.bound_tcp_port.load(Ordering::Acquire) {
            0 => self.config.tcp_port,
            port => port,
        }
    }

    /// Discovery port: the bound port while running, the configured one otherwise.
    pub fn udp_port(&self) -> u16 {
        match self.bound_udp_port.load(Ordering::Acquire) {
            0 => self.config.udp_port,
            port => port,
        }
    }

    /// Address a client dials for the control channel.
    pub fn tcp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.tcp_port())
    }

    /// Address a client sends unicast discovery queries to.
    ///
    /// The discovery socket itself is bound to the wildcard address, so any
    /// local address with this port reaches it; this returns the configured
    /// bind address for symmetry with [`Self::tcp_addr`].
    pub fn udp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.udp_port())
    }

    pub fn udp_multicast_group(&self) -> Ipv4Addr {
        self.config.udp_multicast_group
    }

    pub fn api_token(&self) -> &str {
        &self.config.api_token
    }

    pub fn service(&self) -> &str {
        &self.config.service
    }

    pub fn device(&self) -> &str {
        &self.config.device
    }

    pub fn serial_number(&self) -> &str {
        &self.config.serial_number
    }

    pub fn firmware_version(&self) -> &str {
        &self.config.firmware_version
    }
}

impl Drop for EmulationServer {
    /// Signals the listener tasks to exit if the server is dropped without
    /// `stop()`.  The tasks are not joined.
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(listeners) = self.listeners.get_mut().as_ref() {
            let _ = listeners.shutdown_tx.send(true);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral_config() -> EmulatorConfig {
        EmulatorConfig {
            tcp_port: 0,
            udp_port: 0,
            ..EmulatorConfig::new("dummy_token")
        }
    }

    #[test]
    fn test_new_server_is_stopped() {
        let server = EmulationServer::new(EmulatorConfig::new("t"));
        assert!(!server.is_running());
    }

    #[test]
    fn test_accessors_report_configuration_before_start() {
        // Arrange / Act
        let server = EmulationServer::new(EmulatorConfig::new("dummy_token"));

        // Assert
        assert_eq!(server.api_token(), "dummy_token");
        assert_eq!(server.service(), "rtmc-tcp-1.0-emulator");
        assert_eq!(server.device(), "bare-bones-emulator");
        assert_eq!(server.serial_number(), "1234ABCD");
        assert_eq!(server.firmware_version(), "0.0.0");
        assert_eq!(server.tcp_port(), 65001);
        assert_eq!(server.udp_port(), 65002);
        assert_eq!(server.ipv4_addr().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_start_binds_ephemeral_ports_and_stop_clears_them() {
        // Arrange
        let server = EmulationServer::new(ephemeral_config());

        // Act
        server.start().await.unwrap();

        // Assert
        assert!(server.is_running());
        assert_ne!(server.tcp_port(), 0);
        assert_ne!(server.udp_port(), 0);

        server.stop().await;
        assert!(!server.is_running());
        assert_eq!(server.tcp_port(), 0, "falls back to the configured port");
    }

    #[tokio::test]
    async fn test_start_twice_is_a_no_op() {
        let server = EmulationServer::new(ephemeral_config());
        server.start().await.unwrap();
        let port = server.tcp_port();

        server.start().await.unwrap();

        assert_eq!(server.tcp_port(), port);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_a_no_op() {
        let server = EmulationServer::new(ephemeral_config());
        server.stop().await;
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_start_fails_when_tcp_port_is_taken() {
        // Arrange: occupy a port with a plain listener.
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = blocker.local_addr().unwrap().port();
        let server = EmulationServer::new(EmulatorConfig {
            tcp_port: port,
            udp_enabled: false,
            ..EmulatorConfig::new("t")
        });

        // Act
        let result = server.start().await;

        // Assert
        assert!(matches!(result, Err(EmulatorError::TcpBindFailed { .. })));
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_udp_disabled_spawns_only_tcp_listener() {
        let server = EmulationServer::new(EmulatorConfig {
            udp_enabled: false,
            ..ephemeral_config()
        });
        server.start().await.unwrap();

        assert_eq!(server.udp_port(), 0, "no UDP port bound");
        server.stop().await;
    }
}
