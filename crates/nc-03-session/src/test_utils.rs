//! Helpers for exercising session consumers without a transport.

use crate::channel::SessionChannel;
use crate::session::Session;
use shared_types::{CapabilitySet, Endpoints, Identity, SessionId, WireMessage};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A session with no transport or manager behind it.
///
/// Everything written to its channel lands in the returned receiver.
pub fn detached_session(
    id: SessionId,
    identity: &str,
    capabilities: CapabilitySet,
    queue: usize,
) -> (Arc<Session>, mpsc::Receiver<WireMessage>) {
    let (channel, outbound) = SessionChannel::new(id, queue);
    let session = Session::new(
        Identity::new(identity),
        capabilities,
        Endpoints::local(),
        "detached",
        channel,
    );
    (Arc::new(session), outbound)
}

/// Begin closing a detached session, as the manager would.
pub fn close_detached(session: &Session) {
    session.begin_close();
}
