//! Retry decisions for a single request.
//!
//! Rate-limit waits are unbounded but free: they never consume the retry
//! budget. Transient failures back off exponentially until the budget is
//! spent. Fatal failures are never retried.

use std::time::{Duration, SystemTime};

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RESET_SKEW: Duration = Duration::from_secs(1);

/// When a rate-limited request may be issued again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReset {
    /// Absolute reset time reported by the server.
    At(SystemTime),
    /// Relative wait reported by the server.
    After(Duration),
}

/// What went wrong with the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrySignal {
    RateLimited(RateLimitReset),
    Transient,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Wait(Duration),
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Transient retries allowed per request; the failure after the last one aborts.
    pub max_attempts: u32,
    /// Added to every rate-limit wait to absorb clock differences with the server.
    pub reset_skew: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            reset_skew: DEFAULT_RESET_SKEW,
        }
    }
}

/// Per-request retry state. Create a fresh controller for every request.
#[derive(Debug, Clone)]
pub struct BackoffController {
    policy: BackoffPolicy,
    attempts: u32,
}

impl BackoffController {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Transient failures seen so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn next_delay(&mut self, signal: RetrySignal, now: SystemTime) -> Backoff {
        match signal {
            RetrySignal::RateLimited(reset) => {
                let wait = match reset {
                    RateLimitReset::At(reset_at) => {
                        reset_at.duration_since(now).unwrap_or(Duration::ZERO)
                    }
                    RateLimitReset::After(delay) => delay,
                };
                Backoff::Wait(wait.saturating_add(self.policy.reset_skew))
            }
            RetrySignal::Transient => {
                self.attempts += 1;
                if self.attempts > self.policy.max_attempts {
                    return Backoff::Abort;
                }
                Backoff::Wait(self.transient_delay())
            }
            RetrySignal::Fatal => Backoff::Abort,
        }
    }

    fn transient_delay(&self) -> Duration {
        let factor = 1u32
            .checked_shl(self.attempts.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.policy
            .base_delay
            .saturating_mul(factor)
            .min(self.policy.max_delay)
    }
}
