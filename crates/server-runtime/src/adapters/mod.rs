//! # Adapters
//!
//! Runtime-side implementations of the ports the engine crates define.

pub mod config_store;
pub mod lifecycle;

pub use config_store::ConfigStore;
pub use lifecycle::{LockReleaseListener, SessionMetricsListener};
