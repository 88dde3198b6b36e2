//! Emits `yang-library-change` when the server's module set changes.

use crate::catalog::ModuleCatalog;
use serde_json::json;
use shared_types::{Identity, Notification, NotificationSink};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

pub const YANG_LIBRARY_NAMESPACE: &str = "urn:ietf:params:xml:ns:yang:ietf-yang-library";
pub const YANG_LIBRARY_CHANGE: &str = "yang-library-change";

pub struct YangLibraryChangeNotifier {
    catalog: Arc<dyn ModuleCatalog>,
    sink: Arc<dyn NotificationSink>,
    namespace: String,
}

impl YangLibraryChangeNotifier {
    pub fn new(catalog: Arc<dyn ModuleCatalog>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            catalog,
            sink,
            namespace: YANG_LIBRARY_NAMESPACE.to_string(),
        }
    }

    /// Watch a different module namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Report a new module set without blocking the caller.
    ///
    /// The task resolves to whether a notification was published. With no
    /// module in the watched namespace the event is suppressed.
    pub fn module_set_changed(&self, module_set_id: impl Into<String>) -> JoinHandle<bool> {
        let catalog = Arc::clone(&self.catalog);
        let sink = Arc::clone(&self.sink);
        let namespace = self.namespace.clone();
        let module_set_id = module_set_id.into();

        tokio::spawn(async move {
            let Some(module) = catalog.find_by_namespace(&namespace) else {
                debug!(
                    module_set_id = %module_set_id,
                    namespace = %namespace,
                    "[Notifications] no module for namespace, yang-library-change suppressed"
                );
                return false;
            };

            let body = json!({
                "module-set-id": module_set_id,
                "module": module.name,
                "revision": module.revision,
            });
            sink.publish(Notification::new(YANG_LIBRARY_CHANGE, body, Identity::system()));
            true
        })
    }
}
