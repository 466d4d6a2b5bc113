use std::time::Duration;

/// Tunables for the reconciliation loop.
///
/// Every interval and retry bound used by the engine lives here so call sites
/// never carry their own constants. The defaults are suitable for an
/// interactive card-linking flow where backend confirmation usually lands
/// within a couple of minutes.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Pause between reconciliation ticks. Default: 3s.
    pub poll_interval: Duration,
    /// Minimum spacing between advisory verification nudges. Default: 10s.
    pub verify_interval: Duration,
    /// Budget for a single verification call, independent of the poll loop.
    /// Default: 5s.
    pub verify_timeout: Duration,
    /// Absolute reconciliation budget, measured from session creation and
    /// never extended by ticks or resume probes. Default: 120s.
    pub timeout_budget: Duration,
    /// Snapshot fetch failures tolerated in a row before the session is
    /// treated as timed out. Default: 5.
    pub max_consecutive_failures: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            verify_interval: Duration::from_secs(10),
            verify_timeout: Duration::from_secs(5),
            timeout_budget: Duration::from_secs(120),
            max_consecutive_failures: 5,
        }
    }
}
