//! # RPC Router
//!
//! Maps a qualified operation name to its handler and drives each request
//! through a fixed state machine.
//!
//! ## Request Lifecycle
//!
//! ```text
//! [Received] ──lookup + capability check + validate──→ [Validated] ──→ [Executing]
//!     │                         │                                           │
//!     └──── not-supported ──────┴──────── validation error ──┐             │
//!                                                             ↓             ↓
//!                                                         [Failed]    [Responded | Failed]
//! ```
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | One handler per operation | `RpcRouterBuilder::register` rejects duplicates |
//! | Validation precedes execution | `execute` never runs after a failed `validate` |
//! | Unknown operation keeps the session | `operation-not-supported` reply only |
//! | Replies follow arrival order | `SessionServer` completes through `FuturesOrdered` |
//! | A handler panic fails one request | the join error becomes `operation-failed` |
//! | Streaming needs a channel | dispatch without one fails with a fixed message |

pub mod handler;
pub mod metrics;
pub mod router;
pub mod serve;

pub use handler::{HandlerOutput, RpcHandler, StreamingRpcHandler};
pub use metrics::{RouterMetrics, RouterMetricsSnapshot};
pub use router::{
    Completion, RegistrationError, RequestState, RpcRouter, RpcRouterBuilder,
    ASYNC_DISPATCH_REQUIRED,
};
pub use serve::{PoolClosed, SessionServer, WorkerPool};
