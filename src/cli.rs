//! Command line surface
//!
//! clap parses the arguments; `Args::into_command` then turns them into the
//! closed `Command` enum that the binary matches exhaustively.

use crate::config::{ConnectorConfig, RelayConfig, DEFAULT_TIMEOUT, MAX_TIMEOUT_SECS};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "hasteward")]
#[command(about = "Manages the nodes in HA cluster", long_about = None)]
pub struct Args {
    /// Be verbose while executing
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Name used when printing recovery instructions
    #[arg(long, env = "HASTEWARD_PROG_NAME", default_value = "hasteward", hide = true)]
    pub prog_name: String,

    /// Path to the `pcs` tool
    #[arg(long, env = "HASTEWARD_PCS", default_value = "pcs", global = true)]
    pub pcs: String,

    /// Path to the `crm_mon` tool
    #[arg(long, env = "HASTEWARD_CRM_MON", default_value = "crm_mon", global = true)]
    pub crm_mon: String,

    /// Path to the `crm_attribute` tool
    #[arg(long, env = "HASTEWARD_CRM_ATTRIBUTE", default_value = "crm_attribute", global = true)]
    pub crm_attribute: String,

    #[command(subcommand)]
    pub command: CommandArgs,
}

#[derive(Subcommand, Debug)]
pub enum CommandArgs {
    /// Show status of all cluster nodes
    Status,

    /// Standby a node
    Standby(TargetArgs),

    /// Unstandby a node
    Unstandby(TargetArgs),

    /// Shutdown (power off) the node by name
    Shutdown {
        /// Name of the node to power off
        node: String,
    },

    /// Switch the cluster to maintenance mode
    Maintenance(MaintenanceArgs),

    /// Move the cluster from maintenance back to normal mode
    Unmaintenance(MaintenanceArgs),

    /// Relay object state notifications read line by line
    Relay(RelayArgs),
}

#[derive(clap::Args, Debug)]
pub struct TargetArgs {
    /// Name of the node
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub node: Option<String>,

    /// Apply to all the nodes in the cluster (no node name is required)
    #[arg(long, default_value_t = false)]
    pub all: bool,

    /// Maximum time to wait for the cluster to converge (with --all)
    #[arg(
        long = "timeout-sec",
        default_value_t = DEFAULT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS)
    )]
    pub timeout_sec: u64,
}

#[derive(clap::Args, Debug)]
pub struct MaintenanceArgs {
    /// Apply to the whole cluster
    #[arg(long, required = true)]
    pub all: bool,

    /// Maximum time that this command will wait for any operation to complete
    /// before raising an error
    #[arg(
        long = "timeout-sec",
        default_value_t = DEFAULT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS)
    )]
    pub timeout_sec: u64,
}

#[derive(clap::Args, Debug)]
pub struct RelayArgs {
    /// JSON table mapping object type and name to device ids
    #[arg(long)]
    pub objects: PathBuf,

    /// File with one envelope per line (defaults to stdin)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Give up waiting for a delivery confirmation after this many seconds
    #[arg(
        long = "delivery-timeout-sec",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS)
    )]
    pub delivery_timeout_sec: Option<u64>,
}

/// Which nodes a standby command applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(String),
    All { timeout: Duration },
}

/// Closed set of operations the binary can perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Standby(Target),
    Unstandby(Target),
    Shutdown { node: String },
    Maintenance { timeout: Duration },
    Unmaintenance { timeout: Duration },
    Relay {
        objects: PathBuf,
        input: Option<PathBuf>,
        config: RelayConfig,
    },
}

impl TargetArgs {
    fn into_target(self) -> Target {
        match self.node {
            Some(node) if !self.all => Target::Node(node),
            _ => Target::All {
                timeout: Duration::from_secs(self.timeout_sec),
            },
        }
    }
}

impl Args {
    pub fn connector_config(&self) -> ConnectorConfig {
        ConnectorConfig {
            pcs_binary: self.pcs.clone(),
            crm_mon_binary: self.crm_mon.clone(),
            crm_attribute_binary: self.crm_attribute.clone(),
        }
    }

    pub fn into_command(self) -> Command {
        match self.command {
            CommandArgs::Status => Command::Status,
            CommandArgs::Standby(target) => Command::Standby(target.into_target()),
            CommandArgs::Unstandby(target) => Command::Unstandby(target.into_target()),
            CommandArgs::Shutdown { node } => Command::Shutdown { node },
            CommandArgs::Maintenance(args) => Command::Maintenance {
                timeout: Duration::from_secs(args.timeout_sec),
            },
            CommandArgs::Unmaintenance(args) => Command::Unmaintenance {
                timeout: Duration::from_secs(args.timeout_sec),
            },
            CommandArgs::Relay(args) => {
                let mut config = RelayConfig::default();
                if let Some(secs) = args.delivery_timeout_sec {
                    config = config.with_delivery_timeout(Duration::from_secs(secs));
                }
                Command::Relay {
                    objects: args.objects,
                    input: args.input,
                    config,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Command {
        Args::try_parse_from(argv).unwrap().into_command()
    }

    #[test]
    fn test_standby_single_node() {
        assert_eq!(
            parse(&["hasteward", "standby", "srvnode-1"]),
            Command::Standby(Target::Node("srvnode-1".to_string()))
        );
    }

    #[test]
    fn test_unstandby_all_uses_default_timeout() {
        assert_eq!(
            parse(&["hasteward", "unstandby", "--all"]),
            Command::Unstandby(Target::All {
                timeout: Duration::from_secs(120)
            })
        );
    }

    #[test]
    fn test_standby_requires_node_or_all() {
        assert!(Args::try_parse_from(["hasteward", "standby"]).is_err());
        assert!(Args::try_parse_from(["hasteward", "standby", "n1", "--all"]).is_err());
    }

    #[test]
    fn test_maintenance_requires_all() {
        assert!(Args::try_parse_from(["hasteward", "maintenance"]).is_err());
        assert_eq!(
            parse(&["hasteward", "maintenance", "--all", "--timeout-sec", "30"]),
            Command::Maintenance {
                timeout: Duration::from_secs(30)
            }
        );
        assert_eq!(
            parse(&["hasteward", "unmaintenance", "--all"]),
            Command::Unmaintenance {
                timeout: Duration::from_secs(120)
            }
        );
    }

    #[test]
    fn test_timeouts_are_bounded() {
        assert!(Args::try_parse_from([
            "hasteward",
            "maintenance",
            "--all",
            "--timeout-sec",
            "18446744073709551615"
        ])
        .is_err());
        assert!(Args::try_parse_from(["hasteward", "standby", "--all", "--timeout-sec", "0"]).is_err());
        assert!(Args::try_parse_from([
            "hasteward",
            "relay",
            "--objects",
            "objects.json",
            "--delivery-timeout-sec",
            "604801"
        ])
        .is_err());
        assert_eq!(
            parse(&["hasteward", "unmaintenance", "--all", "--timeout-sec", "604800"]),
            Command::Unmaintenance {
                timeout: Duration::from_secs(MAX_TIMEOUT_SECS)
            }
        );
    }

    #[test]
    fn test_shutdown_and_status() {
        assert_eq!(
            parse(&["hasteward", "shutdown", "srvnode-2"]),
            Command::Shutdown {
                node: "srvnode-2".to_string()
            }
        );
        assert_eq!(parse(&["hasteward", "--verbose", "status"]), Command::Status);
    }

    #[test]
    fn test_relay_arguments() {
        match parse(&[
            "hasteward",
            "relay",
            "--objects",
            "/etc/hasteward/objects.json",
            "--delivery-timeout-sec",
            "15",
        ]) {
            Command::Relay {
                objects,
                input,
                config,
            } => {
                assert_eq!(objects, PathBuf::from("/etc/hasteward/objects.json"));
                assert!(input.is_none());
                assert_eq!(config.delivery_timeout, Some(Duration::from_secs(15)));
                assert_eq!(config.queue_capacity, 1);
            }
            other => panic!("Expected relay command, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_paths() {
        let args =
            Args::try_parse_from(["hasteward", "status", "--pcs", "/usr/sbin/pcs"]).unwrap();
        let config = args.connector_config();
        assert_eq!(config.pcs_binary, "/usr/sbin/pcs");
        assert_eq!(config.crm_mon_binary, "crm_mon");
    }
}
