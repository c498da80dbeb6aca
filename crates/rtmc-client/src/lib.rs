//! rtmc-client library entry point.
//!
//! A [`Device`] is a client-side session with one RTMC card: it dials the
//! card's TCP control port, authenticates with the card's API token and then
//! exchanges text commands for JSON replies.
//!
//! ```text
//! client                         card
//! ──────                         ────
//! "auth <token>"          ──▶
//!                         ◀──    {"status":"OKAY"}
//! "discover rtmc*"        ──▶
//!                         ◀──    {"service":"…","port":65001,…}
//! ```

pub mod device;
pub mod error;

pub use device::{Device, DEFAULT_CONNECT_TIMEOUT};
pub use error::DeviceError;
