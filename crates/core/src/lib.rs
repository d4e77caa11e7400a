//! RelayCraft Core Types
//!
//! Control messages, configuration and the error taxonomy shared by the
//! relay engine and the daemon.

mod config;
mod error;
mod types;

pub use config::*;
pub use error::*;
pub use types::*;
