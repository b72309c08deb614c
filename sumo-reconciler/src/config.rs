use std::time::Duration;

/// Timing knobs for the reconciliation loop, read from environment by the
/// controller binary and handed in here as a plain struct.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub sweep_interval: Duration,
    pub unavailable_sweep_interval: Duration,
    pub orphan_sweep_interval: Duration,
    pub orphan_max_age: Duration,
    pub configmap_cleanup_delay: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            unavailable_sweep_interval: Duration::from_secs(60),
            orphan_sweep_interval: Duration::from_secs(5 * 60),
            orphan_max_age: Duration::from_secs(60 * 60),
            configmap_cleanup_delay: Duration::from_secs(300),
        }
    }
}
