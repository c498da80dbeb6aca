//! Error taxonomy of the device client.
//!
//! `connect` and `disconnect` translate transport failures into ERROR
//! replies.  `send` does not: its failures reach the caller as a
//! [`DeviceError`] so a broken session cannot be mistaken for a card that
//! answered with an error.

use rtmc_core::ProtocolError;
use thiserror::Error;

/// Errors returned by [`crate::Device`] operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// A read or write on the established connection failed or timed out.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    /// The card closed the connection instead of replying.
    #[error("connection closed by device")]
    ConnectionClosed,
    /// The card replied with text that is not a JSON object.
    #[error("malformed reply: {0}")]
    Decode(#[from] ProtocolError),
    /// The operation exists on the API but has no implementation yet.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}
