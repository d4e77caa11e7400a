//! RelayCraft Relay
//!
//! Rendezvous relay engine. A host registers under an opaque id, a client
//! asks for that id, and once paired the relay copies raw bytes between the
//! two sockets without looking at them.
//!
//! ## Components
//!
//! - **codec**: length-prefixed JSON control frames used by the handshake
//! - **Registry**: host id → host connection, client connection → target id
//! - **matcher**: pairs a `connect` request with a registered host
//! - **Forwarder**: one direction of the byte copy
//! - **Connection**: lifecycle from accept to teardown
//! - **RelayStats** / **RelayMonitor**: counters and their read-only view
//! - **RelayServer**: accept loop

pub mod codec;
mod connection;
mod forwarder;
pub mod matcher;
mod peer;
mod registry;
mod server;
mod stats;

pub use connection::{Connection, ConnectionState, ConnectionSummary, RelayContext, Role};
pub use forwarder::Forwarder;
pub use matcher::Pairing;
pub use peer::PeerHandle;
pub use registry::{ClientSession, HostRegistration, PairingWatch, Registry};
pub use server::RelayServer;
pub use stats::{RelayMonitor, RelayStats, RelayStatus};
