//! Bounded polling used by every action and assertion
//!
//! Nothing in the crate sleeps for a fixed amount of time. Callers probe the
//! page, and if the condition does not hold they ask a [`Poller`] for the next
//! slot. The poller sleeps according to the [`Backoff`] strategy and reports
//! when the deadline has passed so the caller can build a typed error.

use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Default timeout for auto-waiting (5 seconds, same as Playwright's expect)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default polling interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Sleep the base interval between every probe
    Fixed,
    /// Multiply the interval by `factor` after each probe, up to `max`
    Exponential { factor: u32, max: Duration },
}

/// How long and how often to probe the page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
    pub backoff: Backoff,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            backoff: Backoff::Fixed,
        }
    }
}

impl WaitPolicy {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn poller(&self) -> Poller {
        Poller::start(*self)
    }
}

/// State of one bounded wait
#[derive(Debug)]
pub struct Poller {
    policy: WaitPolicy,
    started: Instant,
    next_delay: Duration,
    attempts: usize,
}

impl Poller {
    pub fn start(policy: WaitPolicy) -> Self {
        Self {
            policy,
            started: Instant::now(),
            next_delay: policy.interval,
            attempts: 0,
        }
    }

    /// Sleep until the next probe. Returns `false` once the deadline has
    /// passed; the caller should give up and report its last observation.
    pub async fn wait(&mut self) -> bool {
        self.attempts += 1;

        let elapsed = self.started.elapsed();
        if elapsed >= self.policy.timeout {
            return false;
        }

        let remaining = self.policy.timeout - elapsed;
        let delay = self.next_delay.min(remaining);
        sleep(delay).await;

        self.next_delay = match self.policy.backoff {
            Backoff::Fixed => self.policy.interval,
            Backoff::Exponential { factor, max } => {
                self.next_delay.saturating_mul(factor.max(1)).min(max)
            }
        };

        true
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Number of times [`Poller::wait`] has been called
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}
