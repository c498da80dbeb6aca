//! # rtmc-core
//!
//! Shared library for the RTMC card protocol containing the wire codec and
//! the discovery pattern matcher.
//!
//! This crate is used by both the device client and the emulation server.
//! It has zero dependencies on sockets or async runtimes.
//!
//! # Protocol overview (for beginners)
//!
//! An RTMC card is a remote device reachable over the local network.  A
//! client talks to it in two ways:
//!
//! - **Control channel (TCP)**: the client opens a connection, sends
//!   `auth <token>`, and after a successful reply exchanges further text
//!   commands.  Every command gets exactly one JSON reply.
//!
//! - **Discovery channel (UDP)**: the client sends `discover <pattern>` as a
//!   single datagram.  A card whose service name matches the glob pattern
//!   answers with its identity; every other card stays silent.
//!
//! This crate defines:
//!
//! - **`protocol`** – How messages look on the wire.  Commands are plain text
//!   (`Command`), replies are JSON objects (`Response`).
//!
//! - **`pattern`** – Shell-glob matching of a service name against the
//!   pattern carried by a discovery query.

pub mod pattern;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `rtmc_core::Command` instead of `rtmc_core::protocol::command::Command`.
pub use pattern::{matches_service, PatternError, ServicePattern};
pub use protocol::command::Command;
pub use protocol::response::{ControlReply, DiscoveryInfo, ProtocolError, Response, Status};
pub use protocol::MAX_MESSAGE_SIZE;
