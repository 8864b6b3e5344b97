//! Per-client admission control
//!
//! Every request entering the engine is admitted through a [`RateLimiter`]
//! keyed by client. For each key three constraints hold at once:
//! - at most `max_concurrent` admitted operations are in flight
//! - consecutive admissions start at least `min_interval` apart
//! - admissions draw from a reservoir refilled every `refill_interval`
//!
//! Callers wait cooperatively until all three allow them through. A wait that
//! would exceed `max_wait` (or any wait on an empty reservoir in hard-ceiling
//! mode) fails with [`HiveError::RateLimitExceeded`] instead.

mod state;

pub use state::GateState;

use crate::config::LimiterConfig;
use crate::{HiveError, Result};
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

/// Admission policy applied to every key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterPolicy {
    pub min_interval: Duration,
    pub max_concurrent: usize,
    pub reservoir: u32,
    pub refill_amount: u32,
    pub refill_interval: Duration,
    pub max_wait: Duration,
    pub reject_when_exhausted: bool,
}

impl Default for LimiterPolicy {
    fn default() -> Self {
        Self::from(&LimiterConfig::default())
    }
}

impl From<&LimiterConfig> for LimiterPolicy {
    fn from(config: &LimiterConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_interval_ms),
            max_concurrent: config.max_concurrent.max(1) as usize,
            reservoir: config.reservoir,
            refill_amount: config.refill_amount,
            refill_interval: Duration::from_millis(config.refill_interval_ms.max(1)),
            max_wait: Duration::from_millis(config.max_wait_ms),
            reject_when_exhausted: config.reject_when_exhausted,
        }
    }
}

/// Snapshot of one key's limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterInfo {
    /// Callers currently waiting for admission
    pub queued: usize,
    /// Admitted operations still in flight
    pub running: usize,
    /// Operations left in the reservoir
    pub reservoir: u32,
}

/// Limiter state for a single key
#[derive(Debug)]
struct KeyLimiter {
    permits: Arc<Semaphore>,
    /// Held by the one caller whose admission is being decided
    turn: Mutex<()>,
    /// Spacing and reservoir state; only locked for reads and updates
    gate: Mutex<GateState>,
    /// Wakes the caller sleeping on the gate when the key is reset
    reset: Notify,
    waiting: AtomicUsize,
}

impl KeyLimiter {
    fn new(policy: &LimiterPolicy) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(policy.max_concurrent)),
            turn: Mutex::new(()),
            gate: Mutex::new(GateState::new(policy, Instant::now())),
            reset: Notify::new(),
            waiting: AtomicUsize::new(0),
        }
    }
}

/// Decrements the waiting count when an admission attempt ends, including
/// when the attempt is cancelled
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Proof of admission; the slot is released when this is dropped
///
/// Dropping happens exactly once whether the guarded operation succeeds,
/// fails or panics.
#[derive(Debug)]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
}

/// Registry of per-key limiters
///
/// Limiters are created on first use of a key and live until [`reset`] removes
/// them.
///
/// [`reset`]: RateLimiter::reset
#[derive(Debug)]
pub struct RateLimiter {
    policy: LimiterPolicy,
    keys: DashMap<String, Arc<KeyLimiter>>,
}

impl RateLimiter {
    pub fn new(policy: LimiterPolicy) -> Self {
        Self {
            policy,
            keys: DashMap::new(),
        }
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self::new(LimiterPolicy::from(config))
    }

    pub fn policy(&self) -> &LimiterPolicy {
        &self.policy
    }

    fn limiter_for(&self, key: &str) -> Arc<KeyLimiter> {
        self.keys
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(KeyLimiter::new(&self.policy)))
            .clone()
    }

    /// Waits until `key` may start another operation
    ///
    /// # Errors
    ///
    /// Returns `RateLimitExceeded` when the wait would exceed the policy's
    /// `max_wait`, when the reservoir is empty in hard-ceiling mode, or when
    /// the key is reset while waiting.
    pub async fn admit(&self, key: &str) -> Result<Admission> {
        let limiter = self.limiter_for(key);
        let _waiting = WaitingGuard::enter(&limiter.waiting);
        let deadline = Instant::now() + self.policy.max_wait;

        let permit = match timeout_at(deadline, limiter.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(reset_error(key)),
            Err(_) => {
                return Err(HiveError::RateLimitExceeded(format!(
                    "Too many concurrent requests for '{}', try again later",
                    key
                )))
            }
        };

        // Holding the turn serializes admission decisions for this key
        let _turn = match timeout_at(deadline, limiter.turn.lock()).await {
            Ok(turn) => turn,
            Err(_) => return Err(exhausted_error(key)),
        };

        let reset = limiter.reset.notified();
        tokio::pin!(reset);
        reset.as_mut().enable();

        loop {
            if limiter.permits.is_closed() {
                return Err(reset_error(key));
            }

            let now = Instant::now();
            let wait = {
                let mut gate = limiter.gate.lock().await;
                gate.refill(&self.policy, now);

                if let Some(wait) = gate.time_until_token(&self.policy, now) {
                    if self.policy.reject_when_exhausted || now + wait > deadline {
                        debug!(key, ?wait, "Rejecting request: reservoir exhausted");
                        return Err(exhausted_error(key));
                    }
                    trace!(key, ?wait, "Reservoir empty, waiting for refill");
                    wait
                } else if let Some(wait) = gate.time_until_spacing(&self.policy, now) {
                    if now + wait > deadline {
                        return Err(exhausted_error(key));
                    }
                    trace!(key, ?wait, "Waiting for minimum request spacing");
                    wait
                } else {
                    gate.record_start(now);
                    break;
                }
            };

            // The gate is not held while sleeping
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = reset.as_mut() => return Err(reset_error(key)),
            }
        }

        Ok(Admission { _permit: permit })
    }

    /// Runs `operation` once `key` is admitted, releasing the slot when it ends
    pub async fn run<F>(&self, key: &str, operation: F) -> Result<F::Output>
    where
        F: Future,
    {
        let _admission = self.admit(key).await?;
        Ok(operation.await)
    }

    /// Returns a snapshot of `key`'s limiter; unknown keys report an idle,
    /// full limiter
    pub async fn info(&self, key: &str) -> LimiterInfo {
        let limiter = match self.keys.get(key) {
            Some(limiter) => limiter.clone(),
            None => {
                return LimiterInfo {
                    queued: 0,
                    running: 0,
                    reservoir: self.policy.reservoir,
                }
            }
        };

        let reservoir = {
            let mut gate = limiter.gate.lock().await;
            gate.refill(&self.policy, Instant::now());
            gate.tokens()
        };

        LimiterInfo {
            queued: limiter.waiting.load(Ordering::SeqCst),
            running: self
                .policy
                .max_concurrent
                .saturating_sub(limiter.permits.available_permits()),
            reservoir,
        }
    }

    /// Removes `key`'s limiter, failing every caller still waiting on it
    ///
    /// Operations already admitted run to completion. Returns true if the key
    /// existed.
    pub fn reset(&self, key: &str) -> bool {
        match self.keys.remove(key) {
            Some((_, limiter)) => {
                limiter.permits.close();
                limiter.reset.notify_waiters();
                debug!(key, "Rate limiter reset");
                true
            }
            None => false,
        }
    }

    /// Number of keys with a live limiter
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn reset_error(key: &str) -> HiveError {
    HiveError::RateLimitExceeded(format!(
        "Rate limiter for '{}' was reset while waiting",
        key
    ))
}

fn exhausted_error(key: &str) -> HiveError {
    HiveError::RateLimitExceeded(format!(
        "Rate limit exceeded for '{}', try again later",
        key
    ))
}
