use crate::limiter::LimiterPolicy;
use std::time::Duration;
use tokio::time::Instant;

/// Rate state for one limiter key
///
/// Tracks the reservoir balance and the start time of the last admitted
/// operation. Concurrency is not tracked here; the key's semaphore owns it.
#[derive(Debug, Clone)]
pub struct GateState {
    /// Operations left in the reservoir
    tokens: u32,

    /// Start of the current refill period
    last_refill: Instant,

    /// When the last admitted operation started
    last_start: Option<Instant>,
}

impl GateState {
    /// Creates a state with a full reservoir
    pub fn new(policy: &LimiterPolicy, now: Instant) -> Self {
        Self {
            tokens: policy.reservoir,
            last_refill: now,
            last_start: None,
        }
    }

    /// Adds `refill_amount` for every full refill interval elapsed since the
    /// last refill, never exceeding the reservoir capacity
    pub fn refill(&mut self, policy: &LimiterPolicy, now: Instant) {
        let interval = policy.refill_interval.as_nanos().max(1);
        let elapsed = now.saturating_duration_since(self.last_refill).as_nanos();
        let periods = elapsed / interval;

        if periods == 0 {
            return;
        }

        let added = periods.saturating_mul(policy.refill_amount as u128);
        let balance = (self.tokens as u128).saturating_add(added);
        self.tokens = balance.min(policy.reservoir as u128) as u32;

        let advance = u64::try_from(periods * interval).unwrap_or(u64::MAX);
        self.last_refill += Duration::from_nanos(advance);
    }

    /// Time until the next refill, if the reservoir is empty
    pub fn time_until_token(&self, policy: &LimiterPolicy, now: Instant) -> Option<Duration> {
        if self.tokens > 0 {
            return None;
        }
        let next_refill = self.last_refill + policy.refill_interval;
        Some(next_refill.saturating_duration_since(now))
    }

    /// Time until the minimum spacing since the last start has passed
    pub fn time_until_spacing(&self, policy: &LimiterPolicy, now: Instant) -> Option<Duration> {
        let last = self.last_start?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < policy.min_interval {
            Some(policy.min_interval - elapsed)
        } else {
            None
        }
    }

    /// Records that an operation was admitted at `now`
    pub fn record_start(&mut self, now: Instant) {
        self.tokens = self.tokens.saturating_sub(1);
        self.last_start = Some(now);
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }
}
