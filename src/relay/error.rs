//! Error types for the notification relay

use super::types::MessageId;
use std::time::Duration;
use thiserror::Error;

/// A notification envelope that cannot be turned into a state update
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("Cannot parse payload, invalid json: {0}")]
    InvalidJson(String),

    #[error("Invalid json payload, no key ({0}) present")]
    MissingKey(&'static str),

    #[error("Invalid json payload, key ({0}) is not a string")]
    InvalidField(&'static str),
}

/// An object name that does not map to a known device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Unknown {obj_type} object '{obj_name}'")]
    Unknown { obj_type: String, obj_name: String },
}

/// Failure to load an object id table
#[derive(Debug, Error)]
pub enum ResolverLoadError {
    #[error("Cannot read object table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid object table: {0}")]
    Format(#[from] serde_json::Error),
}

/// A sink failed to hand a state over to its consumers
#[derive(Debug, Clone, Error)]
#[error("Broadcast of {id} failed: {reason}")]
pub struct BroadcastError {
    pub id: MessageId,
    pub reason: String,
}

/// Failures that abort a `MessageCorrelator::process` call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// No broadcaster is draining the outbound queue any more
    #[error("Outbound broadcast queue is closed")]
    QueueClosed,

    /// The broadcaster dropped the reply channel without answering
    #[error("Broadcaster dropped the request without assigning message ids")]
    ReplyDropped,

    #[error("Broadcaster assigned no message ids")]
    EmptyReply,

    /// No id of the promise was acknowledged in time
    #[error("No delivery confirmation for {ids:?} within {}s", .timeout.as_secs_f64())]
    DeliveryTimeout { ids: Vec<MessageId>, timeout: Duration },
}
