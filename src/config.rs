//! Configuration for hasteward components

use crate::waiter::DEFAULT_POLL_INTERVAL;
use std::time::Duration;

/// Default convergence timeout for composite cluster operations
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Largest timeout accepted on the command line (one week)
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Configuration for maintenance and standby operations.
///
/// Convergence timeouts are given per operation.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Pause between two polls of the cluster manager.
    /// The waiter caps it at half of the step timeout.
    pub poll_interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl MaintenanceConfig {
    /// Set the poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Configuration for the notification relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// How long a correlator waits for a delivery confirmation.
    /// `None` waits forever.
    pub delivery_timeout: Option<Duration>,

    /// Capacity of the outbound broadcast queue
    pub queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: None,
            queue_capacity: 1,
        }
    }
}

impl RelayConfig {
    /// Bound the delivery confirmation wait.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = Some(timeout);
        self
    }
}

/// Locations of the cluster manager command line tools.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub pcs_binary: String,
    pub crm_mon_binary: String,
    pub crm_attribute_binary: String,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            pcs_binary: "pcs".to_string(),
            crm_mon_binary: "crm_mon".to_string(),
            crm_attribute_binary: "crm_attribute".to_string(),
        }
    }
}
