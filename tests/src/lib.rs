//! # NETCONF Engine Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs            # In-memory server harness
//! └── integration/
//!     ├── scenarios.rs       # Canonical engine scenarios
//!     ├── locking_flows.rs   # lock / edit-config across sessions
//!     ├── session_flows.rs   # close-session, kill-session, teardown
//!     ├── notification_flows.rs
//!     ├── store_properties.rs # Config store model check, random workload
//!     └── tcp_flows.rs       # Framed TCP transport end to end
//!
//! tests/benches/
//! └── engine_benchmarks.rs   # Lock table, router dispatch, coordinator
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p nc-tests
//! cargo test -p nc-tests integration::locking_flows::
//! cargo bench -p nc-tests
//! ```

pub mod fixtures;
pub mod integration;
