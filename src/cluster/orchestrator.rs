//! Cluster Orchestrator
//!
//! Sequences cluster mutations, each followed by a convergence wait.
//! Composite operations never roll back: a failed `enter_maintenance`
//! leaves the cluster as it is and the operator recovers with
//! `exit_maintenance`.

use super::connector::ClusterConnector;
use super::error::{ClusterError, MaintenanceStep};
use super::types::{all_started, all_stopped, no_standby_nodes, Node};
use crate::config::MaintenanceConfig;
use crate::waiter::{PollingWaiter, WaitSpec};
use slog::{debug, info, warn, Logger};
use std::sync::Arc;
use std::time::Duration;

/// Drives standby and maintenance transitions through a `ClusterConnector`
///
/// Composite operations are not safe to run concurrently against the same
/// cluster: intermediate states (fencing disabled, some nodes in standby)
/// are visible to everyone.
pub struct ClusterOrchestrator {
    connector: Arc<dyn ClusterConnector>,
    waiter: PollingWaiter,
    logger: Logger,
}

impl ClusterOrchestrator {
    /// Create an orchestrator, probing the cluster manager once
    ///
    /// # Errors
    /// Fails with `ClusterError::Connector` when the node query fails, so a
    /// broken cluster tool is detected before any mutation is issued.
    pub async fn new(
        connector: Arc<dyn ClusterConnector>,
        config: MaintenanceConfig,
        logger: Logger,
    ) -> Result<Self, ClusterError> {
        connector.get_nodes().await?;
        Ok(Self::new_unchecked(connector, config, logger))
    }

    /// Create an orchestrator without probing the cluster manager
    pub fn new_unchecked(
        connector: Arc<dyn ClusterConnector>,
        config: MaintenanceConfig,
        logger: Logger,
    ) -> Self {
        let waiter = PollingWaiter::new(config.poll_interval, logger.clone());
        Self {
            connector,
            waiter,
            logger,
        }
    }

    pub async fn all_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        Ok(self.connector.get_nodes().await?)
    }

    pub async fn online_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        let nodes = self.connector.get_nodes().await?;
        Ok(nodes.into_iter().filter(|n| n.online).collect())
    }

    pub async fn cluster_name(&self) -> Result<String, ClusterError> {
        Ok(self.connector.get_cluster_name().await?)
    }

    /// Put one node into standby without waiting for convergence
    pub async fn standby_node(&self, node_name: &str) -> Result<(), ClusterError> {
        Ok(self.connector.standby_node(node_name).await?)
    }

    /// Bring one node out of standby without waiting for convergence
    pub async fn unstandby_node(&self, node_name: &str) -> Result<(), ClusterError> {
        Ok(self.connector.unstandby_node(node_name).await?)
    }

    /// Power off a node. No convergence wait.
    pub async fn shutdown_node(&self, node_name: &str) -> Result<(), ClusterError> {
        info!(self.logger, "Shutting down node"; "node" => node_name);
        Ok(self.connector.shutdown_node(node_name).await?)
    }

    /// Put every node into standby and wait until no resource is running
    pub async fn standby_all(&self, timeout: Duration) -> Result<(), ClusterError> {
        info!(self.logger, "Putting all nodes into standby");
        self.connector.standby_all().await?;

        let connector = &self.connector;
        self.waiter
            .wait(WaitSpec::new(
                "no running resources",
                timeout,
                || connector.get_resources(),
                all_stopped,
            ))
            .await?;
        Ok(())
    }

    /// Bring every node out of standby and wait until none is left in standby
    pub async fn unstandby_all(&self, timeout: Duration) -> Result<(), ClusterError> {
        info!(self.logger, "Bringing all nodes out of standby");
        self.connector.unstandby_all().await?;

        let connector = &self.connector;
        self.waiter
            .wait(WaitSpec::new(
                "no standby nodes in cluster",
                timeout,
                || connector.get_nodes(),
                no_standby_nodes,
            ))
            .await?;
        Ok(())
    }

    /// Disable every fencing resource and wait until all of them stopped
    pub async fn disable_stonith(&self, timeout: Duration) -> Result<(), ClusterError> {
        let resources = self.connector.get_stonith_resources().await?;
        for resource in &resources {
            debug!(self.logger, "Disabling stonith resource"; "resource" => &resource.name);
            self.connector.disable_resource(resource).await?;
        }

        let connector = &self.connector;
        self.waiter
            .wait(WaitSpec::new(
                "stonith resources are disabled",
                timeout,
                || connector.get_stonith_resources(),
                all_stopped,
            ))
            .await?;
        Ok(())
    }

    /// Enable every fencing resource and wait until all of them run
    pub async fn enable_stonith(&self, timeout: Duration) -> Result<(), ClusterError> {
        let resources = self.connector.get_stonith_resources().await?;
        for resource in &resources {
            debug!(self.logger, "Enabling stonith resource"; "resource" => &resource.name);
            self.connector.enable_resource(resource).await?;
        }

        let connector = &self.connector;
        self.waiter
            .wait(WaitSpec::new(
                "stonith resources are enabled",
                timeout,
                || connector.get_stonith_resources(),
                all_started,
            ))
            .await?;
        Ok(())
    }

    /// Switch the cluster to maintenance mode: disable fencing, then standby
    /// every node.
    ///
    /// Any failure aborts with `ClusterError::MaintenanceFailed`. Nothing is
    /// undone: if the standby step fails, fencing stays disabled. Recovery is
    /// `exit_maintenance`.
    pub async fn enter_maintenance(&self, timeout: Duration) -> Result<(), ClusterError> {
        info!(self.logger, "Disabling stonith resources first");
        if let Err(err) = self.disable_stonith(timeout).await {
            warn!(self.logger, "Maintenance aborted"; "step" => %MaintenanceStep::DisableStonith, "error" => %err);
            return Err(ClusterError::MaintenanceFailed {
                step: MaintenanceStep::DisableStonith,
                source: Box::new(err),
            });
        }

        debug!(self.logger, "Switching to standby mode");
        if let Err(err) = self.standby_all(timeout).await {
            warn!(self.logger, "Maintenance aborted with stonith disabled";
                "step" => %MaintenanceStep::StandbyAll, "error" => %err);
            return Err(ClusterError::MaintenanceFailed {
                step: MaintenanceStep::StandbyAll,
                source: Box::new(err),
            });
        }

        info!(self.logger, "All nodes are in standby mode now");
        Ok(())
    }

    /// Return the cluster to normal mode: unstandby every node, then enable
    /// fencing. Succeeds without changes on a cluster that is already normal.
    pub async fn exit_maintenance(&self, timeout: Duration) -> Result<(), ClusterError> {
        self.unstandby_all(timeout).await?;
        info!(self.logger, "All nodes are back to normal mode");

        self.enable_stonith(timeout).await?;
        info!(self.logger, "Stonith resources are enabled. Cluster is functional now");
        Ok(())
    }
}
