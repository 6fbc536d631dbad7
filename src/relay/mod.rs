//! Notification relay
//!
//! Turns object state-change notifications into HA state broadcasts and
//! waits for their delivery to be confirmed.

pub mod broadcaster;
pub mod correlator;
pub mod error;
pub mod herald;
pub mod resolver;
pub mod runtime;
pub mod types;

pub use broadcaster::{outbound_queue, BroadcastSink, Broadcaster, LogSink};
pub use correlator::{parse_envelope, MessageCorrelator, Notification, ProcessOutcome};
pub use error::{BroadcastError, EnvelopeError, RelayError, ResolveError, ResolverLoadError};
pub use herald::{DeliveryHerald, DeliveryPromise};
pub use resolver::{ObjectResolver, StaticObjectResolver};
pub use runtime::{start_relay, RelayHandle};
pub use types::{BroadcastRequest, Fid, HAState, MessageId};
