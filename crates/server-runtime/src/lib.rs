//! # NETCONF Server Runtime
//!
//! Assembles the engine crates into a running server.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and the component container
//! - `adapters/` - config store subsystem, session lifecycle listeners
//! - `handlers/` - built-in RPC handlers (close/kill-session, lock/unlock,
//!   edit-config, get-config)
//! - `transport/` - TCP transport with end-of-message framing
//! - `wiring/` - router registration and metrics publication
//! - `server` - accept loop
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging, metrics registry)
//! 2. Load configuration (TOML file named by `NC_CONFIG`, then env overrides)
//! 3. Build the container (Level 0 → Level 3)
//! 4. Bind the TCP listener and start the metrics reporter
//! 5. Accept connections until Ctrl+C

#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod server;
pub mod transport;
pub mod wiring;

pub use container::{ContainerError, ServerConfig, ServerContainer};
pub use server::NetconfServer;
pub use transport::TcpTransportListener;
