//! Error types for cluster orchestration

use crate::waiter::WaitError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure to talk to the underlying cluster manager
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The cluster tool could not be started
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The cluster tool ran but reported failure
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The cluster tool output could not be understood
    #[error("Unexpected cluster tool output: {0}")]
    Parse(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),
}

/// Step of `enter_maintenance` that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceStep {
    DisableStonith,
    StandbyAll,
}

impl fmt::Display for MaintenanceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaintenanceStep::DisableStonith => write!(f, "disable stonith"),
            MaintenanceStep::StandbyAll => write!(f, "standby all nodes"),
        }
    }
}

/// Errors surfaced by `ClusterOrchestrator` operations
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// A convergence wait passed its deadline
    #[error("Timed out after {}s waiting for: {title}", .timeout.as_secs_f64())]
    Timeout { title: String, timeout: Duration },

    #[error("Invalid wait '{title}': {reason}")]
    InvalidWait { title: String, reason: String },

    /// `enter_maintenance` stopped half way. Never rolled back.
    #[error("Failed to switch to maintenance mode ({step}): {source}")]
    MaintenanceFailed {
        step: MaintenanceStep,
        #[source]
        source: Box<ClusterError>,
    },
}

impl ClusterError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClusterError::Timeout { .. })
    }

    pub fn is_maintenance_failure(&self) -> bool {
        matches!(self, ClusterError::MaintenanceFailed { .. })
    }
}

impl From<WaitError<ConnectorError>> for ClusterError {
    fn from(err: WaitError<ConnectorError>) -> Self {
        match err {
            WaitError::Timeout { title, timeout } => ClusterError::Timeout { title, timeout },
            WaitError::InvalidSpec { title, reason } => ClusterError::InvalidWait { title, reason },
            WaitError::Provider(err) => ClusterError::Connector(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_timeout_maps_to_cluster_timeout() {
        let err: ClusterError = WaitError::<ConnectorError>::Timeout {
            title: "no running resources".to_string(),
            timeout: Duration::from_secs(120),
        }
        .into();

        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "Timed out after 120s waiting for: no running resources"
        );
    }

    #[test]
    fn test_maintenance_failure_keeps_cause() {
        let err = ClusterError::MaintenanceFailed {
            step: MaintenanceStep::DisableStonith,
            source: Box::new(ClusterError::Connector(ConnectorError::Parse("bad xml".into()))),
        };

        assert!(err.is_maintenance_failure());
        assert!(err.to_string().contains("disable stonith"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
