//! # Authentication Gateway
//!
//! Maps transport-level credentials to an authenticated `Identity` or a
//! rejection with a reason. The session layer depends only on the
//! `AuthenticationGateway` trait; `StaticUserGateway` is the built-in
//! implementation driven by the server's user table.
//!
//! ## Security
//!
//! - Password digests and public keys are compared in constant time.
//! - An unknown user and a wrong password produce the same result.
//! - Passwords never appear in logs (`Credentials` redacts them in `Debug`).

pub mod domain;
pub mod ports;
pub mod static_users;

pub use domain::{AuthError, AuthResult, FailureReason, UserEntry};
pub use ports::{AuthenticationGateway, SessionExpiryListener};
pub use static_users::StaticUserGateway;
