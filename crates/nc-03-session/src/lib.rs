//! # Sessions
//!
//! A session is one authenticated, capability-negotiated management
//! conversation with a single outbound channel shared by RPC replies and
//! pushed notifications.
//!
//! ## Session Lifecycle
//!
//! ```text
//! [connection] ──auth──→ [authenticated] ──hello exchange──→ [established]
//!                                                               │
//!                   close-session / kill-session / transport failure / expiry
//!                                                               ↓
//!                                              [closed: listeners notified once]
//! ```
//!
//! ## Guarantees
//!
//! - Session ids are allocated monotonically and never reused.
//! - No RPC is read before the hello exchange completes.
//! - The negotiated capability set never changes after establishment.
//! - Destruction runs every `SessionLifecycleListener` exactly once, which is
//!   where locks and subscriptions held by the session are released.
//! - Frames queued before close are still written.

pub mod channel;
pub mod config;
pub mod errors;
pub mod manager;
pub mod memory;
pub mod session;
pub mod test_utils;
pub mod transport;

pub use channel::{ChannelError, SessionChannel};
pub use config::SessionConfig;
pub use errors::SessionError;
pub use manager::{EstablishedSession, SessionLifecycleListener, SessionManager};
pub use memory::{duplex, MemoryClient};
pub use session::{CloseReason, InFlightGuard, Session};
pub use transport::{FrameReader, FrameWriter, TransportConnection, TransportError, TransportListener};
