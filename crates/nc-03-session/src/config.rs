//! Session layer settings.

use serde::{Deserialize, Serialize};
use shared_types::{Capability, CapabilitySet};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline for the client's credentials and hello.
    #[serde(with = "humantime_serde")]
    pub hello_timeout: Duration,
    /// Outbound frames buffered per session.
    pub outbound_queue: usize,
    /// How long `kill-session` waits for in-flight requests.
    #[serde(with = "humantime_serde")]
    pub kill_grace_period: Duration,
    /// Capabilities the server advertises.
    pub capabilities: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hello_timeout: Duration::from_secs(30),
            outbound_queue: 256,
            kill_grace_period: Duration::from_secs(5),
            capabilities: [
                Capability::BASE_1_0,
                Capability::BASE_1_1,
                Capability::NOTIFICATION_1_0,
                Capability::INTERLEAVE_1_0,
                Capability::WRITABLE_RUNNING_1_0,
                Capability::CANDIDATE_1_0,
                Capability::YANG_LIBRARY_1_0,
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        }
    }
}

impl SessionConfig {
    pub fn server_capabilities(&self) -> CapabilitySet {
        self.capabilities.iter().cloned().collect()
    }
}
