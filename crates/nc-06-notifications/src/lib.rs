//! # Notifications
//!
//! Decouples "an event happened" from "deliver it to interested sessions".
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | `publish` never waits on a subscriber | `pipeline.rs` - `try_send` into the dispatch queue |
//! | Ack precedes the first notification | `pipeline.rs` - `create_subscription()` writes before registering |
//! | A closed subscriber is removed, others unaffected | `pipeline.rs` - `Registry::deliver()` |
//! | Session teardown drops its subscriptions | `SessionLifecycleListener` for `NotificationPipeline` |
//! | Missing module suppresses yang-library-change | `yang_library.rs` |

pub mod catalog;
pub mod config;
pub mod domain;
pub mod handler;
pub mod pipeline;
pub mod yang_library;

pub use catalog::{InMemoryModuleCatalog, ModuleCatalog};
pub use config::NotificationConfig;
pub use domain::{ModuleInfo, StreamFilter, Subscription, SubscriptionError, SubscriptionId};
pub use handler::CreateSubscriptionHandler;
pub use pipeline::{NotificationPipeline, PipelineStats, PipelineStatsSnapshot};
pub use yang_library::{YangLibraryChangeNotifier, YANG_LIBRARY_CHANGE, YANG_LIBRARY_NAMESPACE};
