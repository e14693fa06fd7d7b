//! Engine configuration.

use std::time::Duration;

use tandem_store::documents::DEFAULT_GUID_LENGTH;

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between liveness sweeps over open connections.
    pub heartbeat_interval: Duration,
    /// Length of generated game guids.
    pub guid_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            guid_length: DEFAULT_GUID_LENGTH,
        }
    }
}
