//! Protocol module containing the command parser and the JSON reply types.
//!
//! Wire format (both transports, ASCII text, one message per read):
//! ```text
//! client → card:  auth <token>
//!                 discover <glob-pattern>
//! card → client:  {"status":"OKAY"}
//!                 {"status":"ERROR","error-message":"..."}
//!                 {"service":"...","port":65001,"device":"...",
//!                  "serial_number":"...","firmware_version":"..."}
//!                 {}
//! ```

pub mod command;
pub mod response;

pub use command::Command;
pub use response::{ControlReply, DiscoveryInfo, ProtocolError, Response, Status};

/// Size of the single receive buffer used by both peers.
///
/// The protocol has no framing: one `read()` is assumed to yield one complete
/// message, so every message must fit in this many bytes.
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Canonical `error-message` texts carried by `ERROR` replies.
pub mod error_messages {
    /// Sent by the card when the `auth` token does not match.
    pub const AUTHENTICATION_FAILED: &str = "authentication failed";
    /// Sent by the card for any command it has no handler for.
    pub const COMMAND_NOT_SUPPORTED: &str = "command not supported by emulator";
    /// Produced locally by the client when the TCP connect fails.
    pub const DEVICE_UNREACHABLE: &str = "the device cannot be reached";
    /// Produced locally by the client when closing the socket fails.
    pub const CLOSE_FAILED: &str = "failed to close socket";
    /// Produced locally by the client when sending without a connection.
    pub const SOCKET_CLOSED: &str = "socket closed";
}
