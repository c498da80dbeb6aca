//! rtmc-emulator library entry point.
//!
//! A bare-bones RTMC card emulator.  Its sole purpose is to exercise a
//! client's connection logic without real hardware:
//!
//! - It acts as a TCP server for the control channel, requiring
//!   `auth <token>` before anything else.
//! - It answers `discover <pattern>` queries over TCP and over UDP.
//!
//! Every other command is answered with
//! `{"status":"ERROR","error-message":"command not supported by emulator"}`.
//!
//! # Layers
//!
//! - **`domain`** – configuration.
//! - **`application`** – command dispatcher and session state machine.
//! - **`infrastructure`** – sockets, listener tasks, server lifecycle.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::{ConfigError, EmulatorConfig};
pub use infrastructure::{EmulationServer, EmulatorError};
