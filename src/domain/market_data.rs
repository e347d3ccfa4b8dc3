//! Drives one fetch job to a terminal state.
//!
//! Every attempt passes the shared rate limiter before touching the provider.
//! Failed attempts are retried until the policy's budget is spent, after which
//! the job resolves to an all-empty record so the window can still load.

use crate::domain::daily_record::DailyRecord;
use crate::domain::error::FetchError;
use crate::domain::normalizer::{normalize, parse_series};
use crate::domain::rate_limiter::RateLimiter;
use crate::domain::raw_snapshot::RawSnapshot;
use crate::domain::retry::{FetchJob, RetryPolicy};
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::raw_store_port::{PutOutcome, RawStorePort};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum FetchStatus {
    Succeeded,
    /// Replayed from a stored snapshot without calling the provider.
    Replayed,
    Exhausted { last_error: FetchError },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub symbol: String,
    pub record: DailyRecord,
    pub attempts: u32,
    pub status: FetchStatus,
}

impl FetchOutcome {
    pub fn is_exhausted(&self) -> bool {
        matches!(self.status, FetchStatus::Exhausted { .. })
    }
}

pub struct MarketDataClient<'a> {
    port: &'a dyn MarketDataPort,
    raw_store: &'a dyn RawStorePort,
    limiter: &'a RateLimiter,
    policy: RetryPolicy,
    replay_raw: bool,
}

impl<'a> MarketDataClient<'a> {
    pub fn new(
        port: &'a dyn MarketDataPort,
        raw_store: &'a dyn RawStorePort,
        limiter: &'a RateLimiter,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            port,
            raw_store,
            limiter,
            policy,
            replay_raw: false,
        }
    }

    /// Normalize an existing snapshot instead of calling the provider.
    pub fn with_replay(mut self, replay_raw: bool) -> Self {
        self.replay_raw = replay_raw;
        self
    }

    pub fn fetch(&self, mut job: FetchJob) -> FetchOutcome {
        if self.replay_raw {
            if let Some(outcome) = self.replay(&job) {
                return outcome;
            }
        }

        let date = job.window.date();
        let mut last_error = None;
        while !job.is_terminal() {
            let pause = self.policy.delay_before(job.attempt() + 1);
            if !pause.is_zero() {
                std::thread::sleep(pause);
            }
            self.limiter.acquire();
            job.start();

            let result = self.port.fetch_daily_series(&job.symbol).and_then(|body| {
                let record = parse_series(&body)?.record_for(&job.symbol, date)?;
                Ok((body, record))
            });

            match result {
                Ok((body, record)) => {
                    job.succeed();
                    self.store(RawSnapshot::new(&job.symbol, date, body));
                    let attempts = job.attempt();
                    return FetchOutcome {
                        symbol: job.symbol,
                        record,
                        attempts,
                        status: FetchStatus::Succeeded,
                    };
                }
                Err(err) => {
                    warn!(
                        symbol = %job.symbol,
                        window = %job.window,
                        attempt = job.attempt(),
                        max_attempts = self.policy.max_attempts,
                        error = %err,
                        "fetch attempt failed"
                    );
                    job.fail(&self.policy);
                    last_error = Some(err);
                }
            }
        }

        let last_error = last_error.unwrap_or(FetchError::Network {
            reason: "no attempt made".into(),
        });
        let attempts = job.attempt();
        FetchOutcome {
            record: DailyRecord::empty(&job.symbol, date),
            attempts,
            status: FetchStatus::Exhausted { last_error },
            symbol: job.symbol,
        }
    }

    fn replay(&self, job: &FetchJob) -> Option<FetchOutcome> {
        let date = job.window.date();
        let snapshot = match self.raw_store.get(&job.symbol, date) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(err) => {
                warn!(symbol = %job.symbol, window = %job.window, error = %err, "raw snapshot unreadable");
                return None;
            }
        };
        match normalize(&snapshot, &job.symbol, date) {
            Ok(record) => {
                debug!(symbol = %job.symbol, window = %job.window, "replayed raw snapshot");
                Some(FetchOutcome {
                    symbol: job.symbol.clone(),
                    record,
                    attempts: 0,
                    status: FetchStatus::Replayed,
                })
            }
            Err(err) => {
                warn!(symbol = %job.symbol, window = %job.window, error = %err, "raw snapshot not replayable");
                None
            }
        }
    }

    fn store(&self, snapshot: RawSnapshot) {
        match self.raw_store.put(&snapshot) {
            Ok(PutOutcome::Written) => {}
            Ok(PutOutcome::AlreadyPresent) => {
                debug!(key = %snapshot.key(), "raw snapshot already present");
            }
            Err(err) => warn!(key = %snapshot.key(), error = %err, "raw snapshot not stored"),
        }
    }
}
