//! Message Correlator
//!
//! Turns one raw notification envelope into a broadcast request, hands it to
//! the broadcaster through the outbound queue and waits until the delivery
//! of at least one resulting message has been confirmed.

use super::error::{EnvelopeError, RelayError, ResolveError};
use super::herald::{DeliveryHerald, DeliveryPromise};
use super::resolver::ObjectResolver;
use super::types::{BroadcastRequest, Fid, HAState, MessageId};
use serde_json::Value;
use slog::{debug, error, Logger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Object reference carried by a notification payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub obj_type: String,
    pub obj_name: String,
    pub obj_state: String,
}

/// Extract the object reference from a raw envelope
///
/// Expected shape:
/// `{"payload": {"obj_type": "..", "obj_name": "..", "obj_state": ".."}}`
pub fn parse_envelope(raw: &str) -> Result<Notification, EnvelopeError> {
    let envelope: Value =
        serde_json::from_str(raw).map_err(|e| EnvelopeError::InvalidJson(e.to_string()))?;
    let payload = envelope.get("payload").ok_or(EnvelopeError::MissingKey("payload"))?;

    let field = |key: &'static str| -> Result<String, EnvelopeError> {
        payload
            .get(key)
            .ok_or(EnvelopeError::MissingKey(key))?
            .as_str()
            .map(str::to_string)
            .ok_or(EnvelopeError::InvalidField(key))
    };

    Ok(Notification {
        obj_type: field("obj_type")?,
        obj_name: field("obj_name")?,
        obj_state: field("obj_state")?,
    })
}

/// What happened to one envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Broadcast and confirmed through the given message id
    Delivered { id: MessageId },

    /// The object is unknown, nothing was broadcast
    Unresolved(ResolveError),

    /// The envelope was dropped, nothing was broadcast
    Malformed(EnvelopeError),
}

impl ProcessOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ProcessOutcome::Delivered { .. })
    }
}

/// Correlates notifications with broadcast confirmations
///
/// One `process` call has at most one request in flight: it does not return
/// before the broadcaster replied and the herald confirmed delivery.
#[derive(Clone)]
pub struct MessageCorrelator {
    queue: mpsc::Sender<BroadcastRequest>,
    herald: Arc<DeliveryHerald>,
    resolver: Arc<dyn ObjectResolver>,
    delivery_timeout: Option<Duration>,
    logger: Logger,
}

impl MessageCorrelator {
    pub fn new(
        queue: mpsc::Sender<BroadcastRequest>,
        herald: Arc<DeliveryHerald>,
        resolver: Arc<dyn ObjectResolver>,
        logger: Logger,
    ) -> Self {
        Self {
            queue,
            herald,
            resolver,
            delivery_timeout: None,
            logger,
        }
    }

    /// Give up on delivery confirmations after `timeout`
    pub fn with_delivery_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Process the envelope numbered `seq`
    ///
    /// Malformed envelopes and unknown objects are logged and reported
    /// through the outcome; they never cause an error.
    ///
    /// # Errors
    /// * `RelayError::QueueClosed` / `ReplyDropped` / `EmptyReply` - the
    ///   broadcaster went away or misbehaved
    /// * `RelayError::DeliveryTimeout` - no confirmation within the
    ///   configured delivery timeout
    pub async fn process(&self, seq: u64, raw: &str) -> Result<ProcessOutcome, RelayError> {
        debug!(self.logger, "Message received"; "seq" => seq, "raw" => raw);

        let notification = match parse_envelope(raw) {
            Ok(notification) => notification,
            Err(err) => {
                error!(self.logger, "Dropping message"; "seq" => seq, "error" => %err);
                return Ok(ProcessOutcome::Malformed(err));
            }
        };

        // Payloads carry a single object for now; a multi-object payload
        // would extend this list.
        let mut states = Vec::with_capacity(1);
        match self.to_ha_state(&notification) {
            Ok(state) => states.push(state),
            Err(err) => {
                debug!(self.logger, "No ha states to broadcast"; "seq" => seq, "reason" => %err);
                return Ok(ProcessOutcome::Unresolved(err));
            }
        }

        let ids = self.submit(states).await?;
        let id = self
            .herald
            .wait_for_any(&DeliveryPromise::new(ids), self.delivery_timeout)
            .await?;

        debug!(self.logger, "Message processed"; "seq" => seq, "id" => %id);
        Ok(ProcessOutcome::Delivered { id })
    }

    fn to_ha_state(&self, notification: &Notification) -> Result<HAState, ResolveError> {
        let device_id = self
            .resolver
            .resolve(&notification.obj_type, &notification.obj_name)?;
        Ok(HAState {
            fid: Fid::drive(device_id),
            status: notification.obj_state.clone(),
        })
    }

    /// Place the states on the outbound queue and wait for their message ids
    async fn submit(&self, states: Vec<HAState>) -> Result<Vec<MessageId>, RelayError> {
        let (reply_to, reply) = oneshot::channel();
        self.queue
            .send(BroadcastRequest { states, reply_to })
            .await
            .map_err(|_| RelayError::QueueClosed)?;

        let ids = reply.await.map_err(|_| RelayError::ReplyDropped)?;
        if ids.is_empty() {
            return Err(RelayError::EmptyReply);
        }
        Ok(ids)
    }
}
