use std::time::Duration;

use tracing::warn;

use crate::error::FetchError;
use crate::nba_fetch::BoxscoreSource;
use crate::raw_table::RawTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after failed attempt `n` is `2 * n * backoff_unit`.
    pub backoff_unit: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(2u32.saturating_mul(attempt))
    }
}

/// Result of fetching one box score under a retry policy.
#[derive(Debug)]
pub enum FetchOutcome {
    Table(RawTable),
    /// Every attempt timed out.
    Exhausted { attempts: u32, last_error: FetchError },
    /// A non-transient failure; not retried.
    Failed { attempts: u32, error: FetchError },
}

impl FetchOutcome {
    pub fn into_table(self) -> Option<RawTable> {
        match self {
            FetchOutcome::Table(table) => Some(table),
            _ => None,
        }
    }
}

/// Fetches one box score, retrying timeouts. `sleep` waits out the backoff
/// between attempts.
pub fn fetch_with_retry<S, F>(
    source: &S,
    game_id: &str,
    policy: &RetryPolicy,
    mut sleep: F,
) -> FetchOutcome
where
    S: BoxscoreSource + ?Sized,
    F: FnMut(Duration),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match source.fetch_boxscore(game_id, policy.request_timeout) {
            Ok(table) => return FetchOutcome::Table(table),
            Err(err) if !err.is_transient() => {
                warn!(game_id, attempt, error = %err, "box score fetch failed");
                return FetchOutcome::Failed {
                    attempts: attempt,
                    error: err,
                };
            }
            Err(err) if attempt >= max_attempts => {
                warn!(game_id, attempts = attempt, error = %err, "box score retries exhausted");
                return FetchOutcome::Exhausted {
                    attempts: attempt,
                    last_error: err,
                };
            }
            Err(err) => {
                let delay = policy.backoff_for(attempt);
                warn!(
                    game_id,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "box score fetch timed out, retrying"
                );
                sleep(delay);
            }
        }
    }
}
