//! # Wiring
//!
//! Connects the engine crates to each other and to the runtime's handlers.
//!
//! ```text
//!   handlers ──register──→ RpcRouter ──side-channel notifications──→ NotificationPipeline
//!      │                                                                   ↑
//!      ├── lock/unlock ──→ locks (<lock> table) ←── admit check ───┐        │
//!      │        └─────────→ commit_locks ←── apply_exclusive ──┐    │   SessionManager
//!      └── edit-config ──→ CompositeSubsystem ──→ ConfigStore  └────┘  (lifecycle listeners)
//! ```

pub mod metrics_reporter;
pub mod rpc_routing;

pub use metrics_reporter::{publish_metrics, spawn_metrics_reporter};
pub use rpc_routing::build_router;
