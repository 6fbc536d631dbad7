//! Cluster orchestration
//!
//! Standby, fencing and maintenance transitions against a pacemaker-style
//! cluster manager. Every mutation is followed by a polling convergence
//! check.

pub mod cli_connector;
pub mod connector;
pub mod error;
pub mod in_memory;
pub mod orchestrator;
pub mod types;

pub use cli_connector::CliConnector;
pub use connector::ClusterConnector;
pub use error::{ClusterError, ConnectorError, MaintenanceStep};
pub use in_memory::InMemoryConnector;
pub use orchestrator::ClusterOrchestrator;
pub use types::{Node, Resource};
