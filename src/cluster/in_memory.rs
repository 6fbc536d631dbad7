//! In-memory cluster connector
//!
//! Simulates a cluster manager in the same process. Node mode changes take
//! effect immediately while resources converge towards their target state
//! only after a configurable number of queries, which mimics the delay a
//! real cluster manager needs to stop or start resources. Used by tests and
//! dry runs.

use super::connector::ClusterConnector;
use super::error::ConnectorError;
use super::types::{Node, Resource, STONITH_AGENT_PREFIX};
use async_trait::async_trait;
use tokio::sync::Mutex;

struct SimResource {
    name: String,
    resource_agent: String,
    enabled: bool,
    active: bool,
    /// Queries left before `active` follows the target state
    pending: u32,
    /// Never converges (simulates a resource that refuses to stop or start)
    stuck: bool,
}

impl SimResource {
    fn is_stonith(&self) -> bool {
        self.resource_agent.starts_with(STONITH_AGENT_PREFIX)
    }

    fn snapshot(&self) -> Resource {
        Resource {
            name: self.name.clone(),
            active: self.active,
            resource_agent: self.resource_agent.clone(),
        }
    }
}

struct SimState {
    cluster_name: String,
    nodes: Vec<Node>,
    resources: Vec<SimResource>,
    convergence_lag: u32,
    calls: Vec<String>,
    failing_calls: Vec<String>,
}

impl SimState {
    fn record(&mut self, call: String) -> Result<(), ConnectorError> {
        let fail = self.failing_calls.iter().any(|f| call.starts_with(f.as_str()));
        self.calls.push(call.clone());
        if fail {
            return Err(ConnectorError::CommandFailed {
                command: call,
                status: "exit status: 1".to_string(),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(())
    }

    fn can_host_resources(&self) -> bool {
        self.nodes.iter().any(|n| n.online && !n.standby)
    }

    /// Advance the simulation by one observation
    fn tick(&mut self) {
        let hosts_available = self.can_host_resources();
        let lag = self.convergence_lag;

        for r in self.resources.iter_mut() {
            // Fencing devices follow their enabled flag; everything else also
            // needs a node that is online and not in standby.
            let target = r.enabled && (r.is_stonith() || hosts_available);
            if r.active == target {
                r.pending = lag;
                continue;
            }
            if r.stuck {
                continue;
            }
            if r.pending == 0 {
                r.active = target;
                r.pending = lag;
            } else {
                r.pending -= 1;
            }
        }
    }

    fn set_standby(&mut self, node_name: &str, standby: bool) -> Result<(), ConnectorError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.name == node_name)
            .ok_or_else(|| ConnectorError::UnknownNode(node_name.to_string()))?;
        node.standby = standby;
        Ok(())
    }

    fn set_enabled(&mut self, resource_name: &str, enabled: bool) -> Result<(), ConnectorError> {
        let resource = self
            .resources
            .iter_mut()
            .find(|r| r.name == resource_name)
            .ok_or_else(|| ConnectorError::UnknownResource(resource_name.to_string()))?;
        resource.enabled = enabled;
        Ok(())
    }
}

/// Cluster manager simulation implementing `ClusterConnector`
pub struct InMemoryConnector {
    state: Mutex<SimState>,
}

impl InMemoryConnector {
    /// Create an empty cluster where resources converge on the next query
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(SimState {
                cluster_name: cluster_name.into(),
                nodes: Vec::new(),
                resources: Vec::new(),
                convergence_lag: 0,
                calls: Vec::new(),
                failing_calls: Vec::new(),
            }),
        }
    }

    /// Add an online node that is not in standby
    pub fn with_node(mut self, name: impl Into<String>) -> Self {
        self.state.get_mut().nodes.push(Node {
            name: name.into(),
            online: true,
            standby: false,
        });
        self
    }

    /// Add an enabled, running resource
    pub fn with_resource(mut self, name: impl Into<String>, resource_agent: impl Into<String>) -> Self {
        let state = self.state.get_mut();
        let lag = state.convergence_lag;
        state.resources.push(SimResource {
            name: name.into(),
            resource_agent: resource_agent.into(),
            enabled: true,
            active: true,
            pending: lag,
            stuck: false,
        });
        self
    }

    /// Number of extra queries a resource needs before it changes state
    pub fn with_convergence_lag(mut self, queries: u32) -> Self {
        let state = self.state.get_mut();
        state.convergence_lag = queries;
        for r in state.resources.iter_mut() {
            r.pending = queries;
        }
        self
    }

    /// Make a resource ignore every state change from now on
    pub async fn set_stuck(&self, resource_name: &str, stuck: bool) {
        let mut state = self.state.lock().await;
        if let Some(r) = state.resources.iter_mut().find(|r| r.name == resource_name) {
            r.stuck = stuck;
        }
    }

    /// Make every call whose recorded name starts with `prefix` fail
    pub async fn fail_calls(&self, prefix: &str) {
        self.state.lock().await.failing_calls.push(prefix.to_string());
    }

    /// Calls issued so far, e.g. `get_nodes`, `standby_all` or `disable_resource:fence-1`
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    /// Current state without advancing the simulation
    pub async fn peek_resources(&self) -> Vec<Resource> {
        let state = self.state.lock().await;
        state.resources.iter().map(SimResource::snapshot).collect()
    }

    pub async fn peek_nodes(&self) -> Vec<Node> {
        self.state.lock().await.nodes.clone()
    }
}

#[async_trait]
impl ClusterConnector for InMemoryConnector {
    async fn get_nodes(&self) -> Result<Vec<Node>, ConnectorError> {
        let mut state = self.state.lock().await;
        state.record("get_nodes".to_string())?;
        state.tick();
        Ok(state.nodes.clone())
    }

    async fn get_resources(&self) -> Result<Vec<Resource>, ConnectorError> {
        let mut state = self.state.lock().await;
        state.record("get_resources".to_string())?;
        state.tick();
        Ok(state.resources.iter().map(SimResource::snapshot).collect())
    }

    async fn get_cluster_name(&self) -> Result<String, ConnectorError> {
        let mut state = self.state.lock().await;
        state.record("get_cluster_name".to_string())?;
        Ok(state.cluster_name.clone())
    }

    async fn standby_node(&self, node_name: &str) -> Result<(), ConnectorError> {
        let mut state = self.state.lock().await;
        state.record(format!("standby_node:{}", node_name))?;
        state.set_standby(node_name, true)
    }

    async fn unstandby_node(&self, node_name: &str) -> Result<(), ConnectorError> {
        let mut state = self.state.lock().await;
        state.record(format!("unstandby_node:{}", node_name))?;
        state.set_standby(node_name, false)
    }

    async fn standby_all(&self) -> Result<(), ConnectorError> {
        let mut state = self.state.lock().await;
        state.record("standby_all".to_string())?;
        for node in state.nodes.iter_mut() {
            node.standby = true;
        }
        Ok(())
    }

    async fn unstandby_all(&self) -> Result<(), ConnectorError> {
        let mut state = self.state.lock().await;
        state.record("unstandby_all".to_string())?;
        for node in state.nodes.iter_mut() {
            node.standby = false;
        }
        Ok(())
    }

    async fn shutdown_node(&self, node_name: &str) -> Result<(), ConnectorError> {
        let mut state = self.state.lock().await;
        state.record(format!("shutdown_node:{}", node_name))?;
        let node = state
            .nodes
            .iter_mut()
            .find(|n| n.name == node_name)
            .ok_or_else(|| ConnectorError::UnknownNode(node_name.to_string()))?;
        node.online = false;
        Ok(())
    }

    async fn disable_resource(&self, resource: &Resource) -> Result<(), ConnectorError> {
        let mut state = self.state.lock().await;
        state.record(format!("disable_resource:{}", resource.name))?;
        state.set_enabled(&resource.name, false)
    }

    async fn enable_resource(&self, resource: &Resource) -> Result<(), ConnectorError> {
        let mut state = self.state.lock().await;
        state.record(format!("enable_resource:{}", resource.name))?;
        state.set_enabled(&resource.name, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::types::all_stopped;

    fn cluster() -> InMemoryConnector {
        InMemoryConnector::new("test-cluster")
            .with_node("node-1")
            .with_node("node-2")
            .with_resource("fence-1", "stonith:fence_ipmilan")
            .with_resource("vip", "ocf::heartbeat:IPaddr2")
    }

    #[tokio::test]
    async fn test_resources_stop_after_standby_all() {
        let connector = cluster();
        connector.standby_all().await.unwrap();

        let resources = connector.get_resources().await.unwrap();
        let vip = resources.iter().find(|r| r.name == "vip").unwrap();
        assert!(!vip.active);
        // Fencing does not depend on node mode
        let fence = resources.iter().find(|r| r.name == "fence-1").unwrap();
        assert!(fence.active);
    }

    #[tokio::test]
    async fn test_convergence_lag_delays_state_change() {
        let connector = cluster().with_convergence_lag(2);
        let fence = connector.get_stonith_resources().await.unwrap().remove(0);
        connector.disable_resource(&fence).await.unwrap();

        assert!(!all_stopped(&connector.get_stonith_resources().await.unwrap()));
        assert!(!all_stopped(&connector.get_stonith_resources().await.unwrap()));
        assert!(all_stopped(&connector.get_stonith_resources().await.unwrap()));
    }

    #[tokio::test]
    async fn test_stuck_resource_never_converges() {
        let connector = cluster();
        connector.set_stuck("fence-1", true).await;
        let fence = connector.get_stonith_resources().await.unwrap().remove(0);
        connector.disable_resource(&fence).await.unwrap();

        for _ in 0..5 {
            assert!(!all_stopped(&connector.get_stonith_resources().await.unwrap()));
        }
    }

    #[tokio::test]
    async fn test_unknown_node_is_rejected() {
        let connector = cluster();
        assert!(matches!(
            connector.standby_node("node-9").await,
            Err(ConnectorError::UnknownNode(name)) if name == "node-9"
        ));
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let connector = cluster();
        connector.fail_calls("standby_all").await;

        assert!(connector.standby_all().await.is_err());
        assert_eq!(connector.calls().await, vec!["standby_all".to_string()]);
        assert!(connector.peek_nodes().await.iter().all(|n| !n.standby));
    }
}
