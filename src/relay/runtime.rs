//! Relay runtime
//!
//! Wires a correlator to an in-process broadcaster task.

use super::broadcaster::{outbound_queue, BroadcastSink, Broadcaster};
use super::correlator::MessageCorrelator;
use super::herald::DeliveryHerald;
use super::resolver::ObjectResolver;
use crate::config::RelayConfig;
use slog::{o, Logger};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Running relay: a correlator plus the broadcaster task draining its queue
pub struct RelayHandle {
    pub correlator: MessageCorrelator,
    pub herald: Arc<DeliveryHerald>,
    broadcaster: JoinHandle<u64>,
}

impl RelayHandle {
    /// Drop the correlator and wait for the broadcaster to drain the queue
    ///
    /// Clones of the correlator keep the queue open; drop them first.
    ///
    /// # Returns
    /// Number of broadcast requests served
    pub async fn shutdown(self) -> Result<u64, tokio::task::JoinError> {
        drop(self.correlator);
        self.broadcaster.await
    }
}

/// Start a relay delivering through `sink`
pub fn start_relay(
    resolver: Arc<dyn ObjectResolver>,
    sink: Arc<dyn BroadcastSink>,
    config: &RelayConfig,
    logger: Logger,
) -> RelayHandle {
    let (queue, receiver) = outbound_queue(config.queue_capacity);
    let herald = Arc::new(DeliveryHerald::new(logger.new(o!("component" => "herald"))));

    let broadcaster = Broadcaster::new(
        receiver,
        sink,
        herald.clone(),
        logger.new(o!("component" => "broadcaster")),
    );
    let broadcaster = tokio::spawn(broadcaster.run());

    let correlator = MessageCorrelator::new(
        queue,
        herald.clone(),
        resolver,
        logger.new(o!("component" => "correlator")),
    )
    .with_delivery_timeout(config.delivery_timeout);

    RelayHandle {
        correlator,
        herald,
        broadcaster,
    }
}
