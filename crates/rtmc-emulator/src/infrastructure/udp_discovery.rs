//! UDP discovery channel.
//!
//! The emulator binds a UDP socket on the discovery port and joins the
//! discovery multicast group.  Each datagram is one query:
//!
//! - `discover <pattern>` whose pattern matches the service name → the
//!   identity object is sent back to the datagram's source address.
//! - Anything else, including a non-matching pattern → nothing is sent.
//!
//! Silence on a mismatch keeps a multicast query from being answered by
//! every card on the segment; the control channel answers the same mismatch
//! with `{}` instead.
//!
//! # Socket setup
//!
//! The socket is created with `socket2` so `SO_REUSEADDR` can be set before
//! binding, then handed to Tokio.  It binds the wildcard address because a
//! socket bound to a unicast address does not receive multicast traffic.
//! Joining the group is best effort: hosts without a multicast route (many
//! containers and CI runners) still answer unicast queries.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use rtmc_core::{Command, MAX_MESSAGE_SIZE};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::infrastructure::tcp_listener::ListenerContext;

/// Binds the discovery socket on `port` and joins `group`.
///
/// `interface` selects the interface used for the multicast membership;
/// an unspecified or IPv6 address lets the OS choose.
///
/// # Errors
///
/// Returns the OS error if the socket cannot be created or bound.  A failed
/// multicast join is only logged.
pub fn bind_discovery_socket(
    port: u16,
    group: Ipv4Addr,
    interface: IpAddr,
) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;

    let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    socket.bind(&SockAddr::from(bind_addr))?;

    let iface = match interface {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
    };
    if let Err(e) = socket.join_multicast_v4(&group, &iface) {
        warn!("could not join discovery multicast group {group} on {iface}: {e}");
    }

    UdpSocket::from_std(socket.into())
}

/// Runs the datagram loop until the server stops.
pub async fn run_discovery_listener(socket: UdpSocket, mut ctx: ListenerContext) {
    let mut buf = [0u8; MAX_MESSAGE_SIZE];

    while ctx.should_run() {
        let received = tokio::select! {
            _ = ctx.shutdown.changed() => break,
            received = timeout(ctx.poll_interval, socket.recv_from(&mut buf)) => received,
        };

        let (len, src) = match received {
            Err(_) => continue,
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                // e.g. ICMP port-unreachable surfaced as ConnectionReset on Windows.
                debug!("discovery recv error: {e}");
                continue;
            }
        };

        let cmd = Command::parse(&String::from_utf8_lossy(&buf[..len]));
        match ctx.dispatcher.dispatch_datagram(&cmd) {
            Some(reply) => {
                debug!("answering discovery query from {src}");
                if let Err(e) = socket.send_to(reply.to_json().as_bytes(), src).await {
                    warn!("failed to send discovery reply to {src}: {e}");
                }
            }
            None => debug!("ignoring datagram from {src} ({:?})", cmd.keyword()),
        }
    }

    info!("UDP discovery listener stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{atomic::AtomicBool, Arc};
    use std::time::Duration;

    use rtmc_core::{DiscoveryInfo, Response};
    use tokio::sync::watch;

    use crate::application::CommandDispatcher;

    const GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 100);

    fn make_context() -> (ListenerContext, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let dispatcher = CommandDispatcher::new(
            "dummy_token",
            DiscoveryInfo {
                service: "rtmc-tcp-1.0-emulator".to_string(),
                port: 65001,
                device: "bare-bones-emulator".to_string(),
                serial_number: "1234ABCD".to_string(),
                firmware_version: "0.0.0".to_string(),
            },
        );
        let ctx = ListenerContext {
            dispatcher: Arc::new(dispatcher),
            running: Arc::new(AtomicBool::new(true)),
            shutdown: rx,
            poll_interval: Duration::from_millis(20),
        };
        (ctx, tx)
    }

    #[tokio::test]
    async fn test_bind_discovery_socket_on_ephemeral_port() {
        // Arrange / Act
        let socket = bind_discovery_socket(0, GROUP, IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();

        // Assert
        assert_ne!(socket.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_discovery_socket_uses_wildcard_address() {
        // Arrange / Act: the interface names a unicast address.
        let socket = bind_discovery_socket(0, GROUP, IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();

        // Assert: the bind itself is still the wildcard.
        assert!(socket.local_addr().unwrap().ip().is_unspecified());
    }

    #[tokio::test]
    async fn test_matching_query_is_answered_and_mismatch_is_silent() {
        // Arrange
        let socket = bind_discovery_socket(0, GROUP, IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();
        let port = socket.local_addr().unwrap().port();
        let (ctx, tx) = make_context();
        let task = tokio::spawn(run_discovery_listener(socket, ctx));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        let mut buf = [0u8; MAX_MESSAGE_SIZE];

        // Act / Assert: a mismatch produces no datagram.
        client.send_to(b"discover bad_query", target).await.unwrap();
        let silent = timeout(Duration::from_millis(200), client.recv_from(&mut buf)).await;
        assert!(silent.is_err(), "mismatch must not be answered");

        // Act / Assert: a match is answered with the identity.
        client.send_to(b"discover rtmc*", target).await.unwrap();
        let (n, _) = timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .expect("match must be answered")
            .unwrap();
        let reply = Response::from_bytes(&buf[..n]).unwrap();
        assert_eq!(reply.get("port").and_then(|v| v.as_u64()), Some(65001));

        tx.send(true).unwrap();
        task.await.unwrap();
    }
}
