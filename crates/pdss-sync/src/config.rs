//! Configuration for sync behavior.

use std::time::Duration;

/// Configuration for a client's snapshot bootstrap.
///
/// The snapshot request is retried with a timeout rather than fired once
/// and forgotten; a client that never hears back gives up explicitly
/// instead of hanging forever.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// How long to wait for a snapshot response (in milliseconds).
    pub snapshot_timeout_ms: u64,
    /// How many requests to attempt before giving up.
    pub snapshot_retries: u32,
}

impl SyncConfig {
    pub(crate) fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            snapshot_timeout_ms: 2000,
            snapshot_retries: 3,
        }
    }
}

/// Builder for sync configuration.
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    pub fn snapshot_timeout(mut self, ms: u64) -> Self {
        self.config.snapshot_timeout_ms = ms;
        self
    }

    pub fn snapshot_retries(mut self, retries: u32) -> Self {
        self.config.snapshot_retries = retries;
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}

impl Default for SyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = SyncConfigBuilder::new()
            .snapshot_timeout(500)
            .snapshot_retries(7)
            .build();

        assert_eq!(config.snapshot_timeout_ms, 500);
        assert_eq!(config.snapshot_retries, 7);
    }
}
