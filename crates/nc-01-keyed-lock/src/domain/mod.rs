//! # Domain Layer - Keyed Lock Manager
//!
//! - `entities`: OwnerId, LockMode, the per-key LockRecord and its wait queue
//! - `errors`: LockError enumeration

pub mod entities;
pub mod errors;

pub use entities::{HoldInfo, LockMode, OwnerId};
pub use errors::LockError;
