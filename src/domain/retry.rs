//! Bounded retry policy and the per-job fetch state machine.

use crate::domain::run_window::RunWindow;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::ZERO,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Pause before `attempt` (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => self.delay.saturating_mul(1 << (attempt - 2).min(16)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

/// One symbol's fetch for one window.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub symbol: String,
    pub window: RunWindow,
    state: FetchState,
    attempt: u32,
}

impl FetchJob {
    pub fn new(symbol: &str, window: RunWindow) -> Self {
        Self {
            symbol: symbol.to_string(),
            window,
            state: FetchState::Pending,
            attempt: 0,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    /// Attempts started so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, FetchState::Succeeded | FetchState::Failed)
    }

    /// Pending -> InFlight, once the rate limiter admitted the request.
    pub fn start(&mut self) {
        debug_assert_eq!(self.state, FetchState::Pending);
        self.attempt += 1;
        self.state = FetchState::InFlight;
    }

    pub fn succeed(&mut self) {
        debug_assert_eq!(self.state, FetchState::InFlight);
        self.state = FetchState::Succeeded;
    }

    /// InFlight -> Pending while attempts remain, otherwise terminal Failed.
    pub fn fail(&mut self, policy: &RetryPolicy) {
        debug_assert_eq!(self.state, FetchState::InFlight);
        self.state = if self.attempt < policy.max_attempts {
            FetchState::Pending
        } else {
            FetchState::Failed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> RunWindow {
        RunWindow::new(NaiveDate::from_ymd_opt(2023, 6, 5).unwrap()).unwrap()
    }

    #[test]
    fn fixed_delay_applies_from_second_attempt() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(5),
            backoff: Backoff::Fixed,
        };
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_secs(5));
        assert_eq!(policy.delay_before(3), Duration::from_secs(5));
    }

    #[test]
    fn exponential_delay_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            delay: Duration::from_secs(1),
            backoff: Backoff::Exponential,
        };
        assert_eq!(policy.delay_before(2), Duration::from_secs(1));
        assert_eq!(policy.delay_before(3), Duration::from_secs(2));
        assert_eq!(policy.delay_before(4), Duration::from_secs(4));
    }

    #[test]
    fn job_fails_terminally_after_max_attempts() {
        let policy = RetryPolicy::default();
        let mut job = FetchJob::new("GOOG", window());
        for expected in 1..=3 {
            assert_eq!(job.state(), FetchState::Pending);
            job.start();
            assert_eq!(job.attempt(), expected);
            job.fail(&policy);
        }
        assert_eq!(job.state(), FetchState::Failed);
        assert!(job.is_terminal());
    }

    #[test]
    fn job_succeeds_after_retry() {
        let policy = RetryPolicy::default();
        let mut job = FetchJob::new("AMZN", window());
        job.start();
        job.fail(&policy);
        job.start();
        job.succeed();
        assert_eq!(job.state(), FetchState::Succeeded);
        assert_eq!(job.attempt(), 2);
    }
}
