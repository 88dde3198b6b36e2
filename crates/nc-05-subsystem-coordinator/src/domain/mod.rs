//! # Domain Layer - Subsystem Coordinator
//!
//! - `entities`: registration handles and transaction states
//! - `errors`: SubsystemError and CoordinationError

pub mod entities;
pub mod errors;

pub use entities::{SubsystemHandle, TransactionState};
pub use errors::{CoordinationError, SubsystemError, SubsystemErrorKind};
