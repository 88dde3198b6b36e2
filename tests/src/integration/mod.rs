//! Cross-crate integration flows, one module per flow.

pub mod locking_flows;
pub mod notification_flows;
pub mod scenarios;
pub mod session_flows;
pub mod store_properties;
pub mod tcp_flows;
