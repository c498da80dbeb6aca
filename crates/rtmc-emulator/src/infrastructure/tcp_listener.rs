//! TCP control channel: accept loop and per-connection tasks.
//!
//! The accept loop runs as one long-lived Tokio task while the server is
//! running.  Each accepted connection is handed to its own task in a
//! [`JoinSet`] owned by the accept loop, so many clients are served in
//! parallel and the loop can wait for every one of them before it exits.
//!
//! # Shutdown
//!
//! Every blocking call (`accept`, `read`, `write_all`) is bounded by the
//! poll interval and raced against the server's shutdown signal.  A loop therefore notices
//! a stop request either immediately (signal) or within one poll interval
//! (running flag), whichever comes first.  The accept loop drains its
//! `JoinSet` before returning, so once its task has been joined no
//! connection socket is still open.
//!
//! # Framing
//!
//! There is none: one `read()` of up to [`MAX_MESSAGE_SIZE`] bytes is one
//! command, and each command gets one reply written with `write_all`.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use rtmc_core::MAX_MESSAGE_SIZE;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::application::{CommandDispatcher, Session};

/// Listen backlog for the control port.
const LISTEN_BACKLOG: u32 = 128;

/// Shared inputs of the accept loop and its connection tasks.
#[derive(Clone)]
pub struct ListenerContext {
    pub dispatcher: Arc<CommandDispatcher>,
    pub running: Arc<AtomicBool>,
    pub shutdown: watch::Receiver<bool>,
    pub poll_interval: Duration,
}

impl ListenerContext {
    /// `true` while neither the running flag nor the shutdown signal says stop.
    pub(crate) fn should_run(&self) -> bool {
        self.running.load(Ordering::Acquire) && !*self.shutdown.borrow()
    }
}

/// Binds the control port with `SO_REUSEADDR` and starts listening.
///
/// Address reuse lets a restarted server bind the same port while sockets
/// from the previous run linger in `TIME_WAIT`.
///
/// # Errors
///
/// Returns the OS error if the socket cannot be created, bound, or put into
/// the listening state.
pub fn bind_control_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

/// Runs the accept loop until the server stops.
///
/// Returns only after every connection task it spawned has finished.
pub async fn run_tcp_listener(listener: TcpListener, mut ctx: ListenerContext) {
    let mut connections = JoinSet::new();

    while ctx.should_run() {
        let accepted = tokio::select! {
            _ = ctx.shutdown.changed() => break,
            accepted = timeout(ctx.poll_interval, listener.accept()) => accepted,
        };

        match accepted {
            Ok(Ok((stream, peer_addr))) => {
                let span = info_span!("connection", id = %Uuid::new_v4(), peer = %peer_addr);
                info!(parent: &span, "client connected");
                connections.spawn(handle_connection(stream, ctx.clone()).instrument(span));
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {
                // Poll interval elapsed with no new client; re-check the flag.
            }
        }

        reap_finished(&mut connections);
    }

    debug!(
        "accept loop stopping; waiting for {} connection(s)",
        connections.len()
    );
    while let Some(result) = connections.join_next().await {
        log_join_result(result);
    }
    info!("TCP listener stopped");
}

/// Collects connection tasks that have already finished, without waiting.
fn reap_finished(connections: &mut JoinSet<()>) {
    while let Some(result) = connections.try_join_next() {
        log_join_result(result);
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!("connection task failed: {e}");
    }
}

/// Drives one accepted connection through its [`Session`].
///
/// The connection ends when the peer closes it, a read or write fails,
/// a reply is not accepted within the poll interval, authentication fails,
/// or the server stops.  The socket is dropped (and thereby closed) when
/// this function returns.
async fn handle_connection(mut stream: TcpStream, mut ctx: ListenerContext) {
    let mut session = Session::new(Arc::clone(&ctx.dispatcher));
    let mut buf = [0u8; MAX_MESSAGE_SIZE];

    while ctx.should_run() && !session.is_closed() {
        let read = tokio::select! {
            _ = ctx.shutdown.changed() => break,
            read = timeout(ctx.poll_interval, stream.read(&mut buf)) => read,
        };

        let len = match read {
            Err(_) => continue,
            Ok(Ok(0)) => {
                debug!("peer closed the connection");
                break;
            }
            Ok(Ok(len)) => len,
            Ok(Err(e)) => {
                debug!("read error: {e}");
                break;
            }
        };

        let text = String::from_utf8_lossy(&buf[..len]);
        let Some(reply) = session.on_message(&text) else {
            break;
        };

        let bytes = reply.to_json();
        let written = tokio::select! {
            _ = ctx.shutdown.changed() => break,
            written = timeout(ctx.poll_interval, stream.write_all(bytes.as_bytes())) => written,
        };
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("failed to send reply: {e}");
                break;
            }
            Err(_) => {
                // The peer is not draining its receive buffer.
                warn!(
                    "reply not accepted within {:?}; dropping connection",
                    ctx.poll_interval
                );
                break;
            }
        }
    }

    session.close();
    info!("connection closed");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
