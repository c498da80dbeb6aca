//! Per-connection session state machine for the control channel.
//!
//! ```text
//!                 auth <correct token>
//!  AwaitingAuth ───────────────────────▶ Authenticated ──┐
//!       │                                     ▲          │ any command
//!       │ anything else                       └──────────┘ (incl. re-auth)
//!       ▼
//!     Closed
//! ```
//!
//! A failed authentication does not merely deny one request: the reply is
//! sent and the session moves to `Closed`, after which the listener drops
//! the socket.  Once authenticated, the session never falls back to
//! `AwaitingAuth`, even if a later `auth` carries a wrong token.
//!
//! The session is owned exclusively by its connection task, so it needs no
//! synchronisation.

use std::sync::Arc;

use rtmc_core::{Command, Response};
use tracing::{debug, info};

use crate::application::dispatcher::CommandDispatcher;

/// Lifecycle state of one control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no successful `auth` yet.
    AwaitingAuth,
    /// `auth` succeeded; commands are dispatched.
    Authenticated,
    /// Authentication failed or the connection ended.
    Closed,
}

/// State machine driving one accepted TCP connection.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    dispatcher: Arc<CommandDispatcher>,
}

impl Session {
    /// Creates a session in [`SessionState::AwaitingAuth`].
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        Self {
            state: SessionState::AwaitingAuth,
            dispatcher,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Feeds one received message through the state machine.
    ///
    /// Returns the reply to send, or `None` once the session is closed.
    /// After a `Some` reply the caller must check [`Session::is_closed`] and
    /// drop the connection if it is set.
    pub fn on_message(&mut self, text: &str) -> Option<Response> {
        let cmd = Command::parse(text);
        debug!("received {:?} in state {:?}", cmd.keyword(), self.state);

        match self.state {
            SessionState::AwaitingAuth => {
                let reply = self.dispatcher.authenticate(&cmd);
                if reply.is_okay() {
                    info!("client authenticated");
                    self.state = SessionState::Authenticated;
                } else {
                    info!("authentication failed; closing connection");
                    self.state = SessionState::Closed;
                }
                Some(reply)
            }
            SessionState::Authenticated => Some(self.dispatcher.dispatch(&cmd)),
            SessionState::Closed => None,
        }
    }

    /// Marks the session closed (peer hang-up, I/O error, or shutdown).
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rtmc_core::DiscoveryInfo;

    fn make_session() -> Session {
        let dispatcher = CommandDispatcher::new(
            "correct_token",
            DiscoveryInfo {
                service: "rtmc-tcp-1.0-emulator".to_string(),
                port: 65001,
                device: "bare-bones-emulator".to_string(),
                serial_number: "1234ABCD".to_string(),
                firmware_version: "0.0.0".to_string(),
            },
        );
        Session::new(Arc::new(dispatcher))
    }

    #[test]
    fn test_new_session_awaits_auth() {
        let session = make_session();
        assert_eq!(session.state(), SessionState::AwaitingAuth);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_correct_token_authenticates() {
        // Arrange
        let mut session = make_session();

        // Act
        let reply = session.on_message("auth correct_token");

        // Assert
        assert_eq!(reply, Some(Response::okay()));
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_wrong_token_closes_session() {
        // Arrange
        let mut session = make_session();

        // Act
        let reply = session.on_message("auth wrong_token").unwrap();

        // Assert
        assert_eq!(reply.error_message(), Some("authentication failed"));
        assert!(session.is_closed());
    }

    #[test]
    fn test_non_auth_first_message_closes_session() {
        let mut session = make_session();
        let reply = session.on_message("xyz").unwrap();
        assert_eq!(reply.status(), Some("ERROR"));
        assert!(session.is_closed());
    }

    #[test]
    fn test_discover_before_auth_is_rejected() {
        let mut session = make_session();
        let reply = session.on_message("discover rtmc*").unwrap();
        assert_eq!(reply.error_message(), Some("authentication failed"));
        assert!(session.is_closed());
    }

    #[test]
    fn test_closed_session_produces_no_reply() {
        // Arrange: fail authentication first.
        let mut session = make_session();
        session.on_message("auth wrong_token");

        // Act: even the correct token is ignored now.
        let reply = session.on_message("auth correct_token");

        // Assert
        assert_eq!(reply, None);
        assert!(session.is_closed());
    }

    #[test]
    fn test_reauth_after_success_is_accepted() {
        let mut session = make_session();
        session.on_message("auth correct_token");
        let reply = session.on_message("auth correct_token");
        assert_eq!(reply, Some(Response::okay()));
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_failed_reauth_keeps_session_authenticated() {
        let mut session = make_session();
        session.on_message("auth correct_token");

        let reply = session.on_message("auth wrong_token").unwrap();

        assert!(!reply.is_okay());
        assert!(session.is_authenticated(), "authentication is never revoked");
    }

    #[test]
    fn test_unsupported_command_keeps_session_open() {
        let mut session = make_session();
        session.on_message("auth correct_token");

        let reply = session.on_message("xyz").unwrap();

        assert_eq!(
            reply.error_message(),
            Some("command not supported by emulator")
        );
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_discover_after_auth_is_dispatched() {
        let mut session = make_session();
        session.on_message("auth correct_token");
        let reply = session.on_message("discover rtmc*").unwrap();
        assert_eq!(
            reply.get("service").and_then(|v| v.as_str()),
            Some("rtmc-tcp-1.0-emulator")
        );
    }

    #[test]
    fn test_close_moves_to_closed() {
        let mut session = make_session();
        session.on_message("auth correct_token");
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }
}
