pub mod cli;
pub mod cluster;
pub mod config;
pub mod logging;
pub mod relay;
pub mod waiter;

pub use cluster::{
    CliConnector, ClusterConnector, ClusterError, ClusterOrchestrator, ConnectorError,
    InMemoryConnector, MaintenanceStep, Node, Resource,
};
pub use config::{ConnectorConfig, MaintenanceConfig, RelayConfig};
pub use relay::{
    start_relay, DeliveryHerald, DeliveryPromise, Fid, HAState, MessageCorrelator, MessageId,
    ProcessOutcome, RelayError, RelayHandle, StaticObjectResolver,
};
pub use waiter::{PollingWaiter, WaitError, WaitSpec};
