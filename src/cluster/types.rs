use serde::{Deserialize, Serialize};

/// Resource agent prefix used by the cluster manager for fencing devices
pub const STONITH_AGENT_PREFIX: &str = "stonith:";

/// Snapshot of a cluster node as reported by the cluster manager
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub online: bool,
    pub standby: bool,
}

/// Snapshot of a cluster resource
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub active: bool,
    /// Agent class, e.g. `stonith:fence_ipmilan` or `ocf::heartbeat:IPaddr2`
    pub resource_agent: String,
}

impl Resource {
    pub fn is_stonith(&self) -> bool {
        self.resource_agent.starts_with(STONITH_AGENT_PREFIX)
    }
}

/// True when no resource in the snapshot is running
pub fn all_stopped(resources: &[Resource]) -> bool {
    resources.iter().all(|r| !r.active)
}

/// True when every resource in the snapshot is running
pub fn all_started(resources: &[Resource]) -> bool {
    resources.iter().all(|r| r.active)
}

/// True when no node in the snapshot is in standby
pub fn no_standby_nodes(nodes: &[Node]) -> bool {
    nodes.iter().all(|n| !n.standby)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(name: &str, active: bool, agent: &str) -> Resource {
        Resource {
            name: name.to_string(),
            active,
            resource_agent: agent.to_string(),
        }
    }

    #[test]
    fn test_stonith_detection() {
        assert!(resource("fence-1", true, "stonith:fence_ipmilan").is_stonith());
        assert!(!resource("vip", true, "ocf::heartbeat:IPaddr2").is_stonith());
    }

    #[test]
    fn test_predicates_on_empty_snapshot() {
        assert!(all_stopped(&[]));
        assert!(all_started(&[]));
        assert!(no_standby_nodes(&[]));
    }

    #[test]
    fn test_mixed_resources() {
        let snapshot = vec![
            resource("a", true, "ocf::heartbeat:Dummy"),
            resource("b", false, "ocf::heartbeat:Dummy"),
        ];
        assert!(!all_stopped(&snapshot));
        assert!(!all_started(&snapshot));
    }

    #[test]
    fn test_node_serializes_with_status_fields() {
        let node = Node {
            name: "srvnode-1".to_string(),
            online: true,
            standby: false,
        };
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"name":"srvnode-1","online":true,"standby":false}"#);
    }
}
