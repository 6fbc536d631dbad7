//! Delivery Herald
//!
//! Tracks delivery acknowledgments for broadcast message ids and lets
//! submitters wait until one of their ids has been confirmed.

use super::error::RelayError;
use super::types::MessageId;
use slog::{debug, Logger};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

/// Number of released ids remembered while their acknowledgment is pending
const RELEASED_CAPACITY: usize = 4096;

/// Set of message ids awaiting acknowledgment on behalf of one submission
///
/// Satisfied as soon as any single member is acknowledged.
#[derive(Debug, Clone)]
pub struct DeliveryPromise {
    ids: Vec<MessageId>,
}

impl DeliveryPromise {
    pub fn new(ids: impl IntoIterator<Item = MessageId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn ids(&self) -> &[MessageId] {
        &self.ids
    }
}

#[derive(Default)]
struct Acks {
    /// Acknowledged ids nobody has claimed yet
    delivered: HashSet<MessageId>,

    /// Ids nobody will wait for any more (promise claimed through another
    /// id, or abandoned after a timeout) whose acknowledgment is still due
    released: HashSet<MessageId>,
    released_order: VecDeque<MessageId>,
}

impl Acks {
    /// Forget every id of `promise`; pending ones are dropped when they arrive
    fn release(&mut self, promise: &DeliveryPromise) {
        for id in promise.ids() {
            if self.delivered.remove(id) || !self.released.insert(*id) {
                continue;
            }
            self.released_order.push_back(*id);
            if self.released_order.len() > RELEASED_CAPACITY {
                if let Some(oldest) = self.released_order.pop_front() {
                    self.released.remove(&oldest);
                }
            }
        }
    }

    /// Record an acknowledgment; false when nobody can claim it any more
    fn acknowledge(&mut self, id: MessageId) -> bool {
        if self.released.remove(&id) {
            self.released_order.retain(|released| *released != id);
            return false;
        }
        self.delivered.insert(id);
        true
    }
}

/// Acknowledgment tracker shared by the broadcaster and the correlators
pub struct DeliveryHerald {
    acks: Mutex<Acks>,
    notify: Notify,
    logger: Logger,
}

impl DeliveryHerald {
    pub fn new(logger: Logger) -> Self {
        Self {
            acks: Mutex::new(Acks::default()),
            notify: Notify::new(),
            logger,
        }
    }

    /// Record that `id` reached at least one consumer
    ///
    /// Acknowledgments arriving before anyone waits are kept until claimed.
    /// Acknowledgments for ids of an already claimed or abandoned promise
    /// are dropped.
    pub async fn notify_delivered(&self, id: MessageId) {
        if !self.acks.lock().await.acknowledge(id) {
            debug!(self.logger, "Late delivery dropped"; "id" => %id);
            return;
        }
        debug!(self.logger, "Message delivered"; "id" => %id);
        self.notify.notify_waiters();
    }

    /// Wait until any id of `promise` has been acknowledged
    ///
    /// On success all ids of the promise are released and the acknowledged
    /// one is returned. On timeout the promise is abandoned. With
    /// `wait_timeout` set to `None` the call waits forever.
    pub async fn wait_for_any(
        &self,
        promise: &DeliveryPromise,
        wait_timeout: Option<Duration>,
    ) -> Result<MessageId, RelayError> {
        debug!(self.logger, "Waiting for delivery"; "ids" => ?promise.ids());

        let wait_future = async {
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                // Register before checking so an acknowledgment landing in
                // between is not missed.
                notified.as_mut().enable();

                if let Some(id) = self.claim(promise).await {
                    return id;
                }
                notified.await;
            }
        };

        let id = match wait_timeout {
            Some(duration) => match timeout(duration, wait_future).await {
                Ok(id) => id,
                Err(_) => {
                    self.acks.lock().await.release(promise);
                    return Err(RelayError::DeliveryTimeout {
                        ids: promise.ids().to_vec(),
                        timeout: duration,
                    });
                }
            },
            None => wait_future.await,
        };

        debug!(self.logger, "Delivery confirmed"; "id" => %id);
        Ok(id)
    }

    /// Release the promise if any of its ids has been acknowledged
    async fn claim(&self, promise: &DeliveryPromise) -> Option<MessageId> {
        let mut acks = self.acks.lock().await;
        let hit = promise.ids().iter().copied().find(|id| acks.delivered.contains(id))?;
        acks.release(promise);
        Some(hit)
    }

    /// Number of acknowledged ids nobody has waited for yet
    pub async fn unclaimed(&self) -> usize {
        self.acks.lock().await.delivered.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn herald() -> Arc<DeliveryHerald> {
        Arc::new(DeliveryHerald::new(Logger::root(slog::Discard, slog::o!())))
    }

    #[tokio::test]
    async fn test_early_acknowledgment_is_not_lost() {
        let herald = herald();
        herald.notify_delivered(MessageId(7)).await;

        let promise = DeliveryPromise::new([MessageId(7)]);
        let id = herald.wait_for_any(&promise, Some(Duration::from_millis(50))).await.unwrap();
        assert_eq!(id, MessageId(7));
        assert_eq!(herald.unclaimed().await, 0);
    }

    #[tokio::test]
    async fn test_any_member_satisfies_promise() {
        let herald = herald();
        let promise = DeliveryPromise::new([MessageId(1), MessageId(2), MessageId(3)]);

        let waiter = {
            let herald = herald.clone();
            let promise = promise.clone();
            tokio::spawn(async move { herald.wait_for_any(&promise, None).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        herald.notify_delivered(MessageId(2)).await;
        let id = waiter.await.unwrap().unwrap();
        assert_eq!(id, MessageId(2));
    }

    #[tokio::test]
    async fn test_unrelated_acknowledgment_does_not_resolve() {
        let herald = herald();
        herald.notify_delivered(MessageId(99)).await;

        let promise = DeliveryPromise::new([MessageId(1)]);
        let result = herald.wait_for_any(&promise, Some(Duration::from_millis(50))).await;

        match result {
            Err(RelayError::DeliveryTimeout { ids, timeout }) => {
                assert_eq!(ids, vec![MessageId(1)]);
                assert_eq!(timeout, Duration::from_millis(50));
            }
            other => panic!("Expected DeliveryTimeout, got {:?}", other),
        }
        assert_eq!(herald.unclaimed().await, 1);
    }

    #[tokio::test]
    async fn test_late_acknowledgments_are_not_retained() {
        let herald = herald();

        for n in 1..=100 {
            let promise = DeliveryPromise::new([MessageId(n)]);
            let result = herald.wait_for_any(&promise, Some(Duration::from_millis(1))).await;
            assert!(matches!(result, Err(RelayError::DeliveryTimeout { .. })));
            herald.notify_delivered(MessageId(n)).await;
        }

        assert_eq!(herald.unclaimed().await, 0);
    }

    #[tokio::test]
    async fn test_remaining_ids_of_claimed_promise_are_dropped() {
        let herald = herald();
        herald.notify_delivered(MessageId(1)).await;

        let promise = DeliveryPromise::new([MessageId(1), MessageId(2), MessageId(3)]);
        let id = herald.wait_for_any(&promise, None).await.unwrap();
        assert_eq!(id, MessageId(1));

        herald.notify_delivered(MessageId(2)).await;
        herald.notify_delivered(MessageId(3)).await;
        assert_eq!(herald.unclaimed().await, 0);

        // Ids of a later submission are tracked again
        herald.notify_delivered(MessageId(4)).await;
        assert_eq!(herald.unclaimed().await, 1);
    }
}
