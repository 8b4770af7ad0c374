//! Transport configuration.

use std::time::Duration;

/// Timeouts and worker sizing for one node's outbound and inbound traffic.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Timeout for steady-state synchronous calls.
    pub call_timeout: Duration,
    /// Timeout for each readiness ping during a startup handshake.
    pub handshake_timeout: Duration,
    /// Pause between handshake attempts.
    pub handshake_retry_delay: Duration,
    /// Give up after this many handshake attempts (`None` retries forever).
    pub max_handshake_attempts: Option<u32>,
    /// Concurrent handler executions per peer.
    pub workers_per_peer: usize,
    /// Concurrent handler executions for the coordinator.
    pub coordinator_workers: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_millis(50),
            handshake_retry_delay: Duration::from_millis(10),
            max_handshake_attempts: None,
            workers_per_peer: 4,
            coordinator_workers: 1,
        }
    }
}

impl TransportConfig {
    /// Short timeouts for in-process tests.
    pub fn for_testing() -> Self {
        Self {
            call_timeout: Duration::from_millis(500),
            handshake_timeout: Duration::from_millis(20),
            handshake_retry_delay: Duration::from_millis(1),
            max_handshake_attempts: Some(50),
            ..Self::default()
        }
    }
}
