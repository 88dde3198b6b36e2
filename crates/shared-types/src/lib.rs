//! # Shared Types Crate
//!
//! This crate contains the protocol entities every component of the NETCONF
//! engine agrees on: session identity, negotiated capabilities, RPC request
//! and reply messages, the structured `rpc-error`, change sets and
//! notifications.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Types crossing a component boundary live here.
//! - **Opaque Payloads**: Operation input and reply data are JSON trees the
//!   core never interprets; only handlers and subsystems do.
//! - **Errors Are Values**: Expected protocol and validation outcomes are
//!   `RpcError` values, never panics.

pub mod capabilities;
pub mod change_set;
pub mod entities;
pub mod errors;
pub mod notification;
pub mod rpc;
pub mod wire;

pub use capabilities::{Capability, CapabilitySet, NegotiationError};
pub use change_set::{Change, ChangeOperation, ChangeSet, ChangeSetBuilder, SchemaPath};
pub use entities::*;
pub use errors::*;
pub use notification::{Notification, NotificationSink, DEFAULT_STREAM};
pub use rpc::{OperationName, ReplyBody, RpcReply, RpcRequest, BASE_NAMESPACE, NOTIFICATION_NAMESPACE};
pub use wire::{Credentials, WireMessage};
