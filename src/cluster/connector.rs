use super::error::ConnectorError;
use super::types::{Node, Resource};
use async_trait::async_trait;

/// Queries and mutations against the cluster manager
///
/// Implementations must return fresh snapshots on every query; the
/// orchestrator polls these methods to detect convergence.
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn get_nodes(&self) -> Result<Vec<Node>, ConnectorError>;

    async fn get_resources(&self) -> Result<Vec<Resource>, ConnectorError>;

    /// Fencing resources only
    async fn get_stonith_resources(&self) -> Result<Vec<Resource>, ConnectorError> {
        let resources = self.get_resources().await?;
        Ok(resources.into_iter().filter(Resource::is_stonith).collect())
    }

    async fn get_cluster_name(&self) -> Result<String, ConnectorError>;

    async fn standby_node(&self, node_name: &str) -> Result<(), ConnectorError>;

    async fn unstandby_node(&self, node_name: &str) -> Result<(), ConnectorError>;

    async fn standby_all(&self) -> Result<(), ConnectorError>;

    async fn unstandby_all(&self) -> Result<(), ConnectorError>;

    /// Power off a node
    async fn shutdown_node(&self, node_name: &str) -> Result<(), ConnectorError>;

    async fn disable_resource(&self, resource: &Resource) -> Result<(), ConnectorError>;

    async fn enable_resource(&self, resource: &Resource) -> Result<(), ConnectorError>;
}
