//! Infrastructure layer for rtmc-emulator.
//!
//! Owns every socket and task:
//!
//! - **`server`** – `EmulationServer`: binds the ports, spawns and joins the
//!   listener tasks.
//! - **`tcp_listener`** – control-channel accept loop and per-connection
//!   tasks driving the session state machine.
//! - **`udp_discovery`** – discovery datagram loop.

pub mod server;
pub mod tcp_listener;
pub mod udp_discovery;

pub use server::{EmulationServer, EmulatorError};
