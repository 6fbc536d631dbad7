//! Broadcaster
//!
//! Single consumer of the outbound queue. Assigns message ids, answers the
//! submitter, then hands every state to a `BroadcastSink` and acknowledges
//! successful deliveries on the `DeliveryHerald`.

use super::error::BroadcastError;
use super::herald::DeliveryHerald;
use super::types::{BroadcastRequest, HAState, MessageId};
use async_trait::async_trait;
use slog::{debug, info, warn, Logger};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Create the outbound queue shared by correlators and the broadcaster
pub fn outbound_queue(
    capacity: usize,
) -> (mpsc::Sender<BroadcastRequest>, mpsc::Receiver<BroadcastRequest>) {
    mpsc::channel(capacity.max(1))
}

/// Destination of broadcast states
#[async_trait]
pub trait BroadcastSink: Send + Sync {
    /// Deliver one state; `Ok` means at least one consumer received it
    async fn deliver(&self, id: MessageId, state: &HAState) -> Result<(), BroadcastError>;
}

/// Sink that only records the states it is given
pub struct LogSink {
    logger: Logger,
}

impl LogSink {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl BroadcastSink for LogSink {
    async fn deliver(&self, id: MessageId, state: &HAState) -> Result<(), BroadcastError> {
        info!(self.logger, "Broadcasting HA state";
            "id" => %id, "fid" => %state.fid, "status" => &state.status);
        Ok(())
    }
}

/// Drains the outbound queue
pub struct Broadcaster {
    receiver: mpsc::Receiver<BroadcastRequest>,
    sink: Arc<dyn BroadcastSink>,
    herald: Arc<DeliveryHerald>,
    next_id: u64,
    logger: Logger,
}

impl Broadcaster {
    pub fn new(
        receiver: mpsc::Receiver<BroadcastRequest>,
        sink: Arc<dyn BroadcastSink>,
        herald: Arc<DeliveryHerald>,
        logger: Logger,
    ) -> Self {
        Self {
            receiver,
            sink,
            herald,
            next_id: 1,
            logger,
        }
    }

    /// Serve requests until every sender of the queue is dropped
    ///
    /// # Returns
    /// Number of requests served
    pub async fn run(mut self) -> u64 {
        let mut served = 0;
        while let Some(request) = self.receiver.recv().await {
            self.handle(request).await;
            served += 1;
        }
        debug!(self.logger, "Outbound queue closed"; "served" => served);
        served
    }

    async fn handle(&mut self, request: BroadcastRequest) {
        let BroadcastRequest { states, reply_to } = request;
        let ids: Vec<MessageId> = states.iter().map(|_| self.allocate_id()).collect();

        if reply_to.send(ids.clone()).is_err() {
            warn!(self.logger, "Submitter went away before receiving message ids"; "ids" => ?ids);
        }

        for (id, state) in ids.into_iter().zip(states.iter()) {
            match self.sink.deliver(id, state).await {
                Ok(()) => self.herald.notify_delivered(id).await,
                Err(err) => warn!(self.logger, "Broadcast failed"; "id" => %id, "error" => %err),
            }
        }
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::herald::DeliveryPromise;
    use crate::relay::types::Fid;
    use std::time::Duration;
    use tokio::sync::{oneshot, Mutex};

    fn logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    /// Sink that records deliveries and rejects states with a given status
    struct RecordingSink {
        delivered: Mutex<Vec<(MessageId, HAState)>>,
        reject_status: Option<String>,
    }

    #[async_trait]
    impl BroadcastSink for RecordingSink {
        async fn deliver(&self, id: MessageId, state: &HAState) -> Result<(), BroadcastError> {
            if self.reject_status.as_deref() == Some(state.status.as_str()) {
                return Err(BroadcastError {
                    id,
                    reason: "rejected".to_string(),
                });
            }
            self.delivered.lock().await.push((id, state.clone()));
            Ok(())
        }
    }

    fn state(key: u64, status: &str) -> HAState {
        HAState {
            fid: Fid::drive(key),
            status: status.to_string(),
        }
    }

    #[tokio::test]
    async fn test_ids_are_assigned_in_order_and_acknowledged() {
        let (tx, rx) = outbound_queue(1);
        let herald = Arc::new(DeliveryHerald::new(logger()));
        let sink = Arc::new(RecordingSink {
            delivered: Mutex::new(Vec::new()),
            reject_status: None,
        });
        let handle = tokio::spawn(Broadcaster::new(rx, sink.clone(), herald.clone(), logger()).run());

        let (reply_to, reply) = oneshot::channel();
        tx.send(BroadcastRequest {
            states: vec![state(1, "failed"), state(2, "online")],
            reply_to,
        })
        .await
        .unwrap();
        assert_eq!(reply.await.unwrap(), vec![MessageId(1), MessageId(2)]);

        let promise = DeliveryPromise::new([MessageId(2)]);
        herald.wait_for_any(&promise, Some(Duration::from_secs(1))).await.unwrap();

        drop(tx);
        assert_eq!(handle.await.unwrap(), 1);
        assert_eq!(sink.delivered.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_not_acknowledged() {
        let (tx, rx) = outbound_queue(1);
        let herald = Arc::new(DeliveryHerald::new(logger()));
        let sink = Arc::new(RecordingSink {
            delivered: Mutex::new(Vec::new()),
            reject_status: Some("failed".to_string()),
        });
        let handle = tokio::spawn(Broadcaster::new(rx, sink, herald.clone(), logger()).run());

        let (reply_to, reply) = oneshot::channel();
        tx.send(BroadcastRequest {
            states: vec![state(1, "failed")],
            reply_to,
        })
        .await
        .unwrap();
        let ids = reply.await.unwrap();

        drop(tx);
        handle.await.unwrap();

        let promise = DeliveryPromise::new(ids);
        assert!(herald.wait_for_any(&promise, Some(Duration::from_millis(30))).await.is_err());
    }

    #[test]
    fn test_zero_capacity_queue_is_clamped() {
        let (tx, _rx) = outbound_queue(0);
        assert_eq!(tx.max_capacity(), 1);
    }
}
