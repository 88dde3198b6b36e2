//! # Capabilities
//!
//! Capability strings exchanged in the `<hello>` handshake and the
//! negotiation rule that turns two advertised sets into the session's
//! immutable working set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Well-known capability URNs.
pub struct Capability;

impl Capability {
    /// NETCONF base protocol 1.0 (end-of-message framing).
    pub const BASE_1_0: &'static str = "urn:ietf:params:netconf:base:1.0";
    /// NETCONF base protocol 1.1 (chunked framing).
    pub const BASE_1_1: &'static str = "urn:ietf:params:netconf:base:1.1";
    /// Event notifications (`create-subscription`).
    pub const NOTIFICATION_1_0: &'static str = "urn:ietf:params:netconf:capability:notification:1.0";
    /// RPCs may be interleaved with an active subscription.
    pub const INTERLEAVE_1_0: &'static str = "urn:ietf:params:netconf:capability:interleave:1.0";
    /// The running datastore is directly writable.
    pub const WRITABLE_RUNNING_1_0: &'static str =
        "urn:ietf:params:netconf:capability:writable-running:1.0";
    /// A candidate datastore exists.
    pub const CANDIDATE_1_0: &'static str = "urn:ietf:params:netconf:capability:candidate:1.0";
    /// The server publishes an ietf-yang-library.
    pub const YANG_LIBRARY_1_0: &'static str =
        "urn:ietf:params:netconf:capability:yang-library:1.0";

    /// Whether the string names a base protocol version.
    #[must_use]
    pub fn is_base(capability: &str) -> bool {
        capability == Self::BASE_1_0 || capability == Self::BASE_1_1
    }
}

/// Errors from capability negotiation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NegotiationError {
    /// Peers share no base protocol version.
    #[error("no common base capability (client advertised {client:?})")]
    NoCommonBase {
        /// Base capabilities the client offered.
        client: Vec<String>,
    },
}

/// An ordered, immutable set of capability strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<String>);

impl CapabilitySet {
    /// Build a set from any iterator of strings.
    pub fn new<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(capabilities.into_iter().map(Into::into).collect())
    }

    /// Whether the set contains a capability.
    #[must_use]
    pub fn contains(&self, capability: &str) -> bool {
        self.0.contains(capability)
    }

    /// Iterate in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Negotiate the working set of a session.
    ///
    /// The result is the intersection of what both peers advertised. It must
    /// contain at least one base protocol version.
    pub fn negotiate(server: &Self, client: &Self) -> Result<Self, NegotiationError> {
        let common: BTreeSet<String> = server.0.intersection(&client.0).cloned().collect();

        if !common.iter().any(|c| Capability::is_base(c)) {
            return Err(NegotiationError::NoCommonBase {
                client: client
                    .0
                    .iter()
                    .filter(|c| Capability::is_base(c))
                    .cloned()
                    .collect(),
            });
        }

        Ok(Self(common))
    }
}

impl FromIterator<String> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
