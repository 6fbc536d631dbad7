//! Cluster connector backed by the pacemaker command line tools
//!
//! Snapshots come from `crm_mon --as-xml`; mutations go through `pcs`.

use super::connector::ClusterConnector;
use super::error::ConnectorError;
use super::types::{Node, Resource};
use crate::config::ConnectorConfig;
use async_trait::async_trait;
use slog::{debug, info, Logger};
use tokio::process::Command;

pub struct CliConnector {
    config: ConnectorConfig,
    logger: Logger,
}

impl CliConnector {
    pub fn new(config: ConnectorConfig, logger: Logger) -> Self {
        Self { config, logger }
    }

    /// Run a tool and return its stdout, failing on a non-zero exit status
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, ConnectorError> {
        let command = format!("{} {}", program, args.join(" "));
        debug!(self.logger, "Executing cluster command"; "command" => &command);

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| ConnectorError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ConnectorError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn pcs(&self, args: &[&str]) -> Result<(), ConnectorError> {
        self.run(&self.config.pcs_binary, args).await.map(|_| ())
    }

    async fn full_status_xml(&self) -> Result<String, ConnectorError> {
        self.run(&self.config.crm_mon_binary, &["--as-xml"]).await
    }
}

#[async_trait]
impl ClusterConnector for CliConnector {
    async fn get_nodes(&self) -> Result<Vec<Node>, ConnectorError> {
        let xml = self.full_status_xml().await?;
        parse_nodes(&xml)
    }

    async fn get_resources(&self) -> Result<Vec<Resource>, ConnectorError> {
        let xml = self.full_status_xml().await?;
        parse_resources(&xml)
    }

    async fn get_cluster_name(&self) -> Result<String, ConnectorError> {
        let out = self
            .run(
                &self.config.crm_attribute_binary,
                &["--query", "--quiet", "--name", "cluster-name"],
            )
            .await?;
        Ok(out.trim().to_string())
    }

    async fn standby_node(&self, node_name: &str) -> Result<(), ConnectorError> {
        info!(self.logger, "Putting node into standby"; "node" => node_name);
        self.pcs(&["node", "standby", node_name]).await
    }

    async fn unstandby_node(&self, node_name: &str) -> Result<(), ConnectorError> {
        info!(self.logger, "Removing node from standby"; "node" => node_name);
        self.pcs(&["node", "unstandby", node_name]).await
    }

    async fn standby_all(&self) -> Result<(), ConnectorError> {
        self.pcs(&["node", "standby", "--all"]).await
    }

    async fn unstandby_all(&self) -> Result<(), ConnectorError> {
        self.pcs(&["node", "unstandby", "--all"]).await
    }

    async fn shutdown_node(&self, node_name: &str) -> Result<(), ConnectorError> {
        info!(self.logger, "Powering off node"; "node" => node_name);
        self.pcs(&["stonith", "fence", node_name, "--off"]).await
    }

    async fn disable_resource(&self, resource: &Resource) -> Result<(), ConnectorError> {
        self.pcs(&["resource", "disable", &resource.name]).await
    }

    async fn enable_resource(&self, resource: &Resource) -> Result<(), ConnectorError> {
        self.pcs(&["resource", "enable", &resource.name]).await
    }
}

fn parse_document(xml: &str) -> Result<roxmltree::Document<'_>, ConnectorError> {
    roxmltree::Document::parse(xml)
        .map_err(|e| ConnectorError::Parse(format!("invalid crm_mon XML: {}", e)))
}

fn required_attr<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Result<&'a str, ConnectorError> {
    node.attribute(name).ok_or_else(|| {
        ConnectorError::Parse(format!(
            "<{}> element without '{}' attribute",
            node.tag_name().name(),
            name
        ))
    })
}

fn bool_attr(node: roxmltree::Node<'_, '_>, name: &str) -> Result<bool, ConnectorError> {
    match required_attr(node, name)? {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ConnectorError::Parse(format!(
            "attribute '{}' has non-boolean value '{}'",
            name, other
        ))),
    }
}

fn section<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
    tag: &str,
) -> Result<roxmltree::Node<'a, 'input>, ConnectorError> {
    doc.root_element()
        .children()
        .find(|n| n.has_tag_name(tag))
        .ok_or_else(|| ConnectorError::Parse(format!("no <{}> section in crm_mon output", tag)))
}

/// Extract node snapshots from `crm_mon --as-xml` output
pub fn parse_nodes(xml: &str) -> Result<Vec<Node>, ConnectorError> {
    let doc = parse_document(xml)?;
    let nodes_section = section(&doc, "nodes")?;

    nodes_section
        .children()
        .filter(|n| n.has_tag_name("node"))
        .map(|n| -> Result<Node, ConnectorError> {
            Ok(Node {
                name: required_attr(n, "name")?.to_string(),
                online: bool_attr(n, "online")?,
                standby: bool_attr(n, "standby")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()
}

/// Extract resource snapshots, including members of groups and clones
pub fn parse_resources(xml: &str) -> Result<Vec<Resource>, ConnectorError> {
    let doc = parse_document(xml)?;
    let resources = match section(&doc, "resources") {
        Ok(found) => found,
        // crm_mon omits the section entirely when nothing is configured
        Err(_) => return Ok(Vec::new()),
    };

    resources
        .descendants()
        .filter(|n| n.has_tag_name("resource"))
        .map(|n| -> Result<Resource, ConnectorError> {
            Ok(Resource {
                name: required_attr(n, "id")?.to_string(),
                active: bool_attr(n, "active")?,
                resource_agent: n.attribute("resource_agent").unwrap_or_default().to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_XML: &str = r#"<?xml version="1.0"?>
<crm_mon version="2.0.3">
    <summary>
        <nodes_configured number="2"/>
    </summary>
    <nodes>
        <node name="srvnode-1" id="1" online="true" standby="false" standby_onfail="false" maintenance="false"/>
        <node name="srvnode-2" id="2" online="false" standby="true" standby_onfail="false" maintenance="false"/>
    </nodes>
    <resources>
        <resource id="stonith-c1" resource_agent="stonith:fence_ipmilan" role="Started" active="true" orphaned="false" failed="false"/>
        <group id="io_group" number_resources="2">
            <resource id="vip" resource_agent="ocf::heartbeat:IPaddr2" role="Stopped" active="false" orphaned="false" failed="false"/>
            <resource id="motr-ios" resource_agent="systemd:motr" role="Started" active="true" orphaned="false" failed="false"/>
        </group>
    </resources>
</crm_mon>"#;

    #[test]
    fn test_parse_nodes() {
        let nodes = parse_nodes(STATUS_XML).unwrap();
        assert_eq!(
            nodes,
            vec![
                Node { name: "srvnode-1".into(), online: true, standby: false },
                Node { name: "srvnode-2".into(), online: false, standby: true },
            ]
        );
    }

    #[test]
    fn test_parse_resources_includes_group_members() {
        let resources = parse_resources(STATUS_XML).unwrap();
        let names: Vec<&str> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["stonith-c1", "vip", "motr-ios"]);
        assert!(resources[0].is_stonith());
        assert!(!resources[1].active);
    }

    #[test]
    fn test_missing_resources_section_is_empty() {
        let xml = r#"<crm_mon><nodes/></crm_mon>"#;
        assert!(parse_resources(xml).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_xml_is_parse_error() {
        assert!(matches!(parse_nodes("<crm_mon>"), Err(ConnectorError::Parse(_))));
    }

    #[test]
    fn test_non_boolean_attribute_is_rejected() {
        let xml = r#"<crm_mon><nodes><node name="a" online="yes" standby="false"/></nodes></crm_mon>"#;
        assert!(matches!(parse_nodes(xml), Err(ConnectorError::Parse(_))));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let config = ConnectorConfig {
            crm_mon_binary: "/nonexistent/crm_mon".to_string(),
            ..ConnectorConfig::default()
        };
        let connector = CliConnector::new(config, Logger::root(slog::Discard, slog::o!()));

        assert!(matches!(
            connector.get_nodes().await,
            Err(ConnectorError::Spawn { .. })
        ));
    }
}
