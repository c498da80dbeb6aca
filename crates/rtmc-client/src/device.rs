//! Client-side session with one RTMC card.
//!
//! ```text
//!                 connect(token) → OKAY
//!  Disconnected ─────────────────────────▶ Connected
//!       ▲                                     │
//!       └─────────────────────────────────────┘
//!         disconnect(), or send() transport failure
//! ```
//!
//! A [`Device`] holds at most one TCP connection.  The connection handle is
//! kept behind an async mutex, so a `Device` can be shared between tasks
//! (e.g. in an `Arc`) and every operation sees either the whole connection
//! or none of it.
//!
//! Every read uses a single buffer of [`MAX_MESSAGE_SIZE`] bytes and treats
//! what one receive call returns as one complete reply.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use rtmc_core::protocol::error_messages::{CLOSE_FAILED, DEVICE_UNREACHABLE, SOCKET_CLOSED};
use rtmc_core::{Command, Response, MAX_MESSAGE_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::DeviceError;

/// Timeout applied by [`Device::connect_default`].
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// An established, authenticated connection.
struct Connection {
    stream: TcpStream,
    /// Bound on every later read and write, taken from `connect`.
    io_timeout: Duration,
}

impl Connection {
    /// Writes `text` and reads one reply.
    async fn exchange(&mut self, text: &str) -> Result<Vec<u8>, DeviceError> {
        time::timeout(self.io_timeout, self.stream.write_all(text.as_bytes()))
            .await
            .map_err(std::io::Error::from)??;

        let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
        let n = time::timeout(self.io_timeout, self.stream.read(&mut buf))
            .await
            .map_err(std::io::Error::from)??;
        if n == 0 {
            return Err(DeviceError::ConnectionClosed);
        }
        buf.truncate(n);
        Ok(buf)
    }
}

/// An RTMC card reachable over the network.
///
/// # Example
///
/// ```no_run
/// use std::net::Ipv4Addr;
/// use rtmc_client::{Device, DEFAULT_CONNECT_TIMEOUT};
///
/// # async fn run() -> Result<(), rtmc_client::DeviceError> {
/// let card = Device::new(Ipv4Addr::LOCALHOST, 65001);
/// let reply = card.connect("dummy_token", DEFAULT_CONNECT_TIMEOUT).await?;
/// assert!(reply.is_okay());
///
/// let reply = card.send("discover rtmc*").await?;
/// println!("{reply}");
///
/// card.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct Device {
    ipv4_addr: IpAddr,
    port: u16,
    service: Option<String>,
    serial_number: Option<String>,
    firmware_version: Option<String>,
    connection: Mutex<Option<Connection>>,
}

impl Device {
    /// Creates a disconnected device descriptor.
    pub fn new(ipv4_addr: impl Into<IpAddr>, port: u16) -> Self {
        Self {
            ipv4_addr: ipv4_addr.into(),
            port,
            service: None,
            serial_number: None,
            firmware_version: None,
            connection: Mutex::new(None),
        }
    }

    /// Attaches descriptive metadata, typically taken from a discovery reply.
    pub fn with_metadata(
        mut self,
        service: impl Into<String>,
        serial_number: impl Into<String>,
        firmware_version: impl Into<String>,
    ) -> Self {
        self.service = Some(service.into());
        self.serial_number = Some(serial_number.into());
        self.firmware_version = Some(firmware_version.into());
        self
    }

    pub fn ipv4_addr(&self) -> IpAddr {
        self.ipv4_addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Control-channel address.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ipv4_addr, self.port)
    }

    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn firmware_version(&self) -> Option<&str> {
        self.firmware_version.as_deref()
    }

    /// `true` while an authenticated connection is held.
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Looks the card up on the network.
    ///
    /// # Errors
    ///
    /// Always returns [`DeviceError::NotImplemented`].
    pub async fn discover(&self) -> Result<Response, DeviceError> {
        Err(DeviceError::NotImplemented("discover"))
    }

    /// Opens a connection and authenticates with `api_token`.
    ///
    /// Returns `{"status":"OKAY"}` without any I/O if already connected.
    /// Otherwise returns the card's reply unchanged; the connection is kept
    /// only if that reply's status is `OKAY`.  `timeout` bounds the dial,
    /// the auth write and the reply read, and every later `send`.
    ///
    /// A refused or timed-out dial, or any other transport failure, is
    /// reported as `{"status":"ERROR","error-message":"the device cannot be
    /// reached"}` rather than as an `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Decode`] if the card's reply is not a JSON
    /// object.  The connection is closed in that case.
    pub async fn connect(&self, api_token: &str, timeout: Duration) -> Result<Response, DeviceError> {
        let mut connection = self.connection.lock().await;
        if connection.is_some() {
            return Ok(Response::okay());
        }

        let addr = self.addr();
        let (mut stream, reply) = match open_and_authenticate(addr, api_token, timeout).await {
            Ok(opened) => opened,
            Err(e) => {
                warn!("cannot reach device at {addr}: {e}");
                return Ok(Response::error(DEVICE_UNREACHABLE));
            }
        };

        let response = match Response::from_bytes(&reply) {
            Ok(response) => response,
            Err(e) => {
                let _ = stream.shutdown().await;
                return Err(e.into());
            }
        };

        if response.is_okay() {
            info!("connected to device at {addr}");
            *connection = Some(Connection {
                stream,
                io_timeout: timeout,
            });
        } else {
            debug!("device at {addr} refused authentication: {response}");
            let _ = stream.shutdown().await;
        }
        Ok(response)
    }

    /// [`Device::connect`] with [`DEFAULT_CONNECT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// See [`Device::connect`].
    pub async fn connect_default(&self, api_token: &str) -> Result<Response, DeviceError> {
        self.connect(api_token, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Closes the connection.
    ///
    /// Returns `{"status":"OKAY"}` if already disconnected or if the close
    /// succeeds, and `{"status":"ERROR","error-message":"failed to close
    /// socket"}` if it fails.  The device is disconnected afterwards either
    /// way.
    pub async fn disconnect(&self) -> Response {
        let Some(mut connection) = self.connection.lock().await.take() else {
            return Response::okay();
        };

        match connection.stream.shutdown().await {
            Ok(()) => {
                info!("disconnected from device at {}", self.addr());
                Response::okay()
            }
            Err(e) => {
                warn!("failed to close connection to {}: {e}", self.addr());
                Response::error(CLOSE_FAILED)
            }
        }
    }

    /// Sends `command` verbatim and returns the decoded reply.
    ///
    /// The caller formats the command; nothing is added or validated.
    /// Returns `{"status":"ERROR","error-message":"socket closed"}` without
    /// any I/O if not connected.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::Transport`] if the write or read fails or times out.
    /// - [`DeviceError::ConnectionClosed`] if the card hangs up.
    /// - [`DeviceError::Decode`] if the reply is not a JSON object.
    ///
    /// The first two also drop the connection; a decode error keeps it.
    pub async fn send(&self, command: &str) -> Result<Response, DeviceError> {
        let mut guard = self.connection.lock().await;
        let Some(connection) = guard.as_mut() else {
            return Ok(Response::error(SOCKET_CLOSED));
        };

        debug!("sending {:?}", Command::parse(command).keyword());
        match connection.exchange(command).await {
            Ok(reply) => Ok(Response::from_bytes(&reply)?),
            Err(e) => {
                warn!("connection to {} lost: {e}", self.addr());
                *guard = None;
                Err(e)
            }
        }
    }
}

/// Dials `addr`, sends `auth <token>` and reads the raw reply.
///
/// A zero-byte reply is reported as `UnexpectedEof`.
async fn open_and_authenticate(
    addr: SocketAddr,
    api_token: &str,
    timeout: Duration,
) -> std::io::Result<(TcpStream, Vec<u8>)> {
    let mut stream = time::timeout(timeout, TcpStream::connect(addr)).await??;

    let auth = Command::auth(api_token).to_string();
    time::timeout(timeout, stream.write_all(auth.as_bytes())).await??;

    let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
    let n = time::timeout(timeout, stream.read(&mut buf)).await??;
    if n == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "device closed the connection before replying",
        ));
    }
    buf.truncate(n);
    Ok((stream, buf))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
