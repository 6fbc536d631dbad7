use clap::Parser;
use hasteward::cli::{Args, Command, Target};
use hasteward::cluster::{CliConnector, ClusterError, ClusterOrchestrator};
use hasteward::config::{ConnectorConfig, MaintenanceConfig, RelayConfig};
use hasteward::logging;
use hasteward::relay::{
    start_relay, LogSink, ProcessOutcome, RelayError, ResolverLoadError, StaticObjectResolver,
};
use slog::{debug, error, info, o, Logger};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    ResolverLoad(#[from] ResolverLoadError),

    #[error("Cannot read notifications: {0}")]
    Input(#[from] std::io::Error),

    #[error("Cannot encode node status: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Broadcaster task failed: {0}")]
    Broadcaster(#[from] tokio::task::JoinError),
}

impl RunError {
    fn is_unexpected(&self) -> bool {
        matches!(self, RunError::Output(_) | RunError::Broadcaster(_))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let logger = logging::build_logger(args.verbose);
    let prog_name = args.prog_name.clone();
    let connector_config = args.connector_config();
    let command = args.into_command();

    let code = match run(command, connector_config, &logger).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&logger, &err, &prog_name);
            ExitCode::FAILURE
        }
    };

    // Flush the async drain before exiting
    drop(logger);
    code
}

async fn orchestrator(
    config: ConnectorConfig,
    logger: &Logger,
) -> Result<ClusterOrchestrator, ClusterError> {
    let connector = CliConnector::new(config, logger.new(o!("component" => "connector")));
    ClusterOrchestrator::new(
        Arc::new(connector),
        MaintenanceConfig::default(),
        logger.new(o!("component" => "orchestrator")),
    )
    .await
}

async fn run(
    command: Command,
    connector_config: ConnectorConfig,
    logger: &Logger,
) -> Result<(), RunError> {
    debug!(logger, "Executing command"; "command" => ?command);

    match command {
        Command::Status => {
            let nodes = orchestrator(connector_config, logger).await?.all_nodes().await?;
            println!("{}", serde_json::to_string(&nodes)?);
        }
        Command::Standby(Target::Node(node)) => {
            orchestrator(connector_config, logger).await?.standby_node(&node).await?;
        }
        Command::Standby(Target::All { timeout }) => {
            orchestrator(connector_config, logger).await?.standby_all(timeout).await?;
        }
        Command::Unstandby(Target::Node(node)) => {
            orchestrator(connector_config, logger).await?.unstandby_node(&node).await?;
        }
        Command::Unstandby(Target::All { timeout }) => {
            orchestrator(connector_config, logger).await?.unstandby_all(timeout).await?;
        }
        Command::Shutdown { node } => {
            orchestrator(connector_config, logger).await?.shutdown_node(&node).await?;
        }
        Command::Maintenance { timeout } => {
            orchestrator(connector_config, logger).await?.enter_maintenance(timeout).await?;
        }
        Command::Unmaintenance { timeout } => {
            orchestrator(connector_config, logger).await?.exit_maintenance(timeout).await?;
        }
        Command::Relay {
            objects,
            input,
            config,
        } => relay(objects, input, config, logger).await?,
    }
    Ok(())
}

async fn relay(
    objects: PathBuf,
    input: Option<PathBuf>,
    config: RelayConfig,
    logger: &Logger,
) -> Result<(), RunError> {
    let resolver = StaticObjectResolver::from_file(&objects)?;
    info!(logger, "Loaded object table"; "path" => %objects.display(), "objects" => resolver.len());

    let sink = Arc::new(LogSink::new(logger.new(o!("component" => "sink"))));
    let relay = start_relay(Arc::new(resolver), sink, &config, logger.clone());

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match input {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let mut lines = reader.lines();

    let mut seq: u64 = 0;
    let (mut delivered, mut unresolved, mut malformed, mut unconfirmed) = (0u64, 0u64, 0u64, 0u64);

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        seq += 1;

        match relay.correlator.process(seq, &line).await {
            Ok(ProcessOutcome::Delivered { .. }) => delivered += 1,
            Ok(ProcessOutcome::Unresolved(_)) => unresolved += 1,
            Ok(ProcessOutcome::Malformed(_)) => malformed += 1,
            Err(err @ RelayError::DeliveryTimeout { .. }) => {
                error!(logger, "Delivery not confirmed"; "seq" => seq, "error" => %err);
                unconfirmed += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let served = relay.shutdown().await?;
    info!(logger, "Relay finished";
        "received" => seq,
        "broadcast" => served,
        "delivered" => delivered,
        "unconfirmed" => unconfirmed,
        "unresolved" => unresolved,
        "malformed" => malformed);
    Ok(())
}

fn report_failure(logger: &Logger, err: &RunError, prog_name: &str) {
    if let RunError::Cluster(cluster_err) = err {
        if cluster_err.is_maintenance_failure() {
            error!(logger, "{}", cluster_err);
            error!(
                logger,
                "The cluster is now unstable. Maintenance mode was not rolled back \
                 to prevent STONITH actions to happen unexpectedly."
            );
            error!(
                logger,
                "Consider running `{} unmaintenance --all` to switch the cluster to normal mode manually.",
                prog_name
            );
            return;
        }
    }

    if err.is_unexpected() {
        error!(logger, "Unexpected error happened: {}", err);
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            error!(logger, "Caused by: {}", cause);
            source = cause.source();
        }
        return;
    }

    error!(logger, "Exiting with FAILURE: {}", err);
}
