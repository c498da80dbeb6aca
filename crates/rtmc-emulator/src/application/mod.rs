//! Application layer for rtmc-emulator.
//!
//! Protocol logic with no sockets: the command dispatcher and the
//! per-connection session state machine.  The infrastructure layer feeds
//! received bytes in and writes the returned replies out.

pub mod dispatcher;
pub mod session;

pub use dispatcher::CommandDispatcher;
pub use session::{Session, SessionState};
