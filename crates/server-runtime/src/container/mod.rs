//! # Server Container
//!
//! Holds every engine component, built once from a `ServerConfig` and shared
//! by `Arc` with the accept loop and the handlers.

pub mod components;
pub mod config;

pub use components::{ContainerError, ServerContainer};
pub use config::{
    AuthConfig, ConfigError, ListenerConfig, LockConfig, MetricsConfig, RouterConfig, ServerConfig,
};
