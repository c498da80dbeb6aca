//! Command dispatcher: maps a parsed [`Command`] to its handler.
//!
//! | Keyword    | Handler                   | Control channel (TCP) | Discovery channel (UDP) |
//! |------------|---------------------------|-----------------------|-------------------------|
//! | `auth`     | [`CommandDispatcher::authenticate`] | OKAY / ERROR  | ignored                 |
//! | `discover` | [`CommandDispatcher::discover`]     | identity / `{}` | identity / silence    |
//! | other      | –                         | "not supported" ERROR | ignored                 |
//!
//! The dispatcher holds only immutable data (the shared token and the
//! identity reported by discovery), so one instance is shared by every
//! listener task through an `Arc` without locking.
//!
//! Adding a command means adding a [`Command`] variant and an arm here; the
//! listener loops never look at command contents.

use rtmc_core::protocol::error_messages::{AUTHENTICATION_FAILED, COMMAND_NOT_SUPPORTED};
use rtmc_core::{matches_service, Command, DiscoveryInfo, Response};
use tracing::{debug, warn};

/// Routes commands to the emulator's handlers.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    api_token: String,
    identity: DiscoveryInfo,
}

impl CommandDispatcher {
    /// Creates a dispatcher accepting `api_token` and answering discovery
    /// queries with `identity`.
    pub fn new(api_token: impl Into<String>, identity: DiscoveryInfo) -> Self {
        Self {
            api_token: api_token.into(),
            identity,
        }
    }

    /// The identity reported to matching discovery queries.
    pub fn identity(&self) -> &DiscoveryInfo {
        &self.identity
    }

    /// Runs the authentication check.
    ///
    /// Anything other than an `auth` command carrying the configured token
    /// fails, so this is also the handler for the first message of an
    /// unauthenticated connection.
    pub fn authenticate(&self, cmd: &Command) -> Response {
        match cmd {
            Command::Auth { token } if *token == self.api_token => Response::okay(),
            Command::Auth { .. } => {
                warn!("authentication rejected: token mismatch");
                Response::error(AUTHENTICATION_FAILED)
            }
            other => {
                warn!(
                    "authentication rejected: expected auth, got {:?}",
                    other.keyword()
                );
                Response::error(AUTHENTICATION_FAILED)
            }
        }
    }

    /// Handles one command on an authenticated control connection.
    ///
    /// Always produces a reply.
    pub fn dispatch(&self, cmd: &Command) -> Response {
        match cmd {
            Command::Auth { .. } => self.authenticate(cmd),
            Command::Discover { pattern } => self.discover(pattern),
            Command::Unknown { .. } => {
                debug!("unsupported command {:?}", cmd.keyword());
                Response::error(COMMAND_NOT_SUPPORTED)
            }
        }
    }

    /// Handles one datagram on the discovery channel.
    ///
    /// Only matching `discover` queries are answered; `None` means nothing is
    /// sent back.
    pub fn dispatch_datagram(&self, cmd: &Command) -> Option<Response> {
        match cmd {
            Command::Discover { pattern } => self.discover_match(pattern).map(Response::from),
            _ => None,
        }
    }

    /// Answers a discovery query: the identity on a match, `{}` otherwise.
    pub fn discover(&self, pattern: &str) -> Response {
        self.discover_match(pattern)
            .map_or_else(Response::empty, Response::from)
    }

    /// Returns the identity if the service name matches `pattern`.
    pub fn discover_match(&self, pattern: &str) -> Option<DiscoveryInfo> {
        if matches_service(pattern, &self.identity.service) {
            Some(self.identity.clone())
        } else {
            debug!(
                "discovery pattern {pattern:?} does not match {:?}",
                self.identity.service
            );
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
