use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

/// Type tag of drive objects (`'k'`)
pub const DRIVE_TYPE_TAG: u8 = b'k';

/// Identifier of a managed storage object
///
/// The high byte of `container` carries the object type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fid {
    pub container: u64,
    pub key: u64,
}

impl Fid {
    pub const fn new(container: u64, key: u64) -> Self {
        Self { container, key }
    }

    /// Container value for objects of the given type
    pub const fn type_container(tag: u8) -> u64 {
        ((tag as u64) << 56) | 1
    }

    /// Fid of the drive with the given numeric id
    pub const fn drive(key: u64) -> Self {
        Self::new(Self::type_container(DRIVE_TYPE_TAG), key)
    }

    pub fn type_tag(&self) -> u8 {
        (self.container >> 56) as u8
    }
}

impl fmt::Display for Fid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:{:#x}", self.container, self.key)
    }
}

/// New state of one object, to be broadcast to the cluster
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HAState {
    pub fid: Fid,
    pub status: String,
}

/// Correlation token assigned by the broadcaster to one broadcast state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Request placed on the outbound queue
///
/// `reply_to` is created per request and receives one `MessageId` per
/// entry of `states`, in order.
#[derive(Debug)]
pub struct BroadcastRequest {
    pub states: Vec<HAState>,
    pub reply_to: oneshot::Sender<Vec<MessageId>>,
}
