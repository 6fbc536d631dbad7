//! Polling Waiter
//!
//! Blocks the calling task until a freshly polled snapshot satisfies a
//! predicate, or until a deadline passes. Used after every cluster mutation
//! to confirm that the cluster manager has converged.

use slog::{debug, Logger};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};

/// Default pause between two consecutive polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Description of a single convergence wait
///
/// # Type Parameters
/// * `P` - Provider returning a future that resolves to a fresh snapshot
/// * `F` - Predicate evaluated against each snapshot
pub struct WaitSpec<P, F> {
    /// Human readable description, reported on timeout
    pub title: String,

    /// Maximum time to wait; must be non-zero
    pub timeout: Duration,

    /// Produces a fresh snapshot on every call
    pub provider: P,

    /// Pure function of the latest snapshot
    pub predicate: F,
}

impl<P, F> WaitSpec<P, F> {
    pub fn new(title: impl Into<String>, timeout: Duration, provider: P, predicate: F) -> Self {
        Self {
            title: title.into(),
            timeout,
            provider,
            predicate,
        }
    }
}

/// Errors that can occur while waiting for convergence
#[derive(Debug, Error)]
pub enum WaitError<E> {
    /// The deadline passed before the predicate held
    #[error("Timed out after {}s waiting for: {title}", .timeout.as_secs_f64())]
    Timeout { title: String, timeout: Duration },

    /// The wait was rejected before the first poll
    #[error("Invalid wait '{title}': {reason}")]
    InvalidSpec { title: String, reason: String },

    /// The provider failed; the wait is aborted immediately
    #[error("{0}")]
    Provider(#[source] E),
}

/// Repeatedly polls a provider until a predicate holds or time runs out
#[derive(Clone)]
pub struct PollingWaiter {
    poll_interval: Duration,
    logger: Logger,
}

impl PollingWaiter {
    /// Create a waiter sleeping `poll_interval` between polls
    pub fn new(poll_interval: Duration, logger: Logger) -> Self {
        Self {
            poll_interval,
            logger,
        }
    }

    /// Wait until `spec.predicate` holds for a snapshot from `spec.provider`
    ///
    /// The interval actually used is capped at half the timeout so that at
    /// least one retry happens before the deadline. The last poll happens at
    /// the deadline itself, so success is reported no later than
    /// `timeout + poll_interval` and timeouts are reported within one poll
    /// interval of `timeout`.
    ///
    /// # Returns
    /// * `Ok(())` - The predicate held for some snapshot
    /// * `Err(WaitError::Timeout)` - The deadline passed
    /// * `Err(WaitError::Provider)` - The provider failed (not retried)
    pub async fn wait<T, E, P, Fut, F>(&self, spec: WaitSpec<P, F>) -> Result<(), WaitError<E>>
    where
        T: fmt::Debug,
        P: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
        F: Fn(&[T]) -> bool,
    {
        let WaitSpec {
            title,
            timeout,
            mut provider,
            predicate,
        } = spec;

        if timeout.is_zero() {
            return Err(WaitError::InvalidSpec {
                title,
                reason: "timeout must be greater than zero".to_string(),
            });
        }

        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Err(WaitError::InvalidSpec {
                title,
                reason: format!("timeout of {}s is out of range", timeout.as_secs()),
            });
        };
        let interval = self.poll_interval.min(timeout / 2);
        let mut attempt: u32 = 0;

        debug!(self.logger, "Waiting for condition";
            "title" => &title, "timeout_ms" => timeout.as_millis() as u64);

        loop {
            attempt += 1;
            let snapshot = provider().await.map_err(WaitError::Provider)?;
            debug!(self.logger, "Polled snapshot";
                "title" => &title, "attempt" => attempt, "snapshot" => ?snapshot);

            if predicate(&snapshot) {
                debug!(self.logger, "Condition met"; "title" => &title, "attempt" => attempt);
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(WaitError::Timeout { title, timeout });
            }
            sleep(interval.min(deadline - now)).await;
        }
    }
}
