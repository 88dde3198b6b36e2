//! # Domain Layer - Notifications
//!
//! - `entities`: subscriptions, stream filters, catalog modules
//! - `errors`: SubscriptionError

pub mod entities;
pub mod errors;

pub use entities::{ModuleInfo, StreamFilter, Subscription, SubscriptionId};
pub use errors::SubscriptionError;
