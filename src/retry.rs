use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Round-based failover policy.
///
/// A round tries every candidate once, in order. Failed attempts wait
/// `candidate_delay` before the next candidate; a fully failed round waits
/// `round_delay` before the next round. Worst case is
/// `max_rounds * candidates.len()` attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_rounds: u32,
    pub candidate_delay: Duration,
    pub round_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            candidate_delay: Duration::from_secs(3),
            round_delay: Duration::from_secs(5),
        }
    }
}

/// How a failover run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Failover<E> {
    /// Candidate `index` succeeded after `attempts` total attempts.
    Succeeded { index: usize, attempts: u32 },
    /// Every round failed. `last_error` is `None` only when there were no
    /// candidates or no rounds.
    Exhausted { attempts: u32, last_error: Option<E> },
    /// The token was cancelled between attempts.
    Cancelled { attempts: u32 },
}

/// Sleep for `delay` unless `shutdown` fires first. Returns `true` if
/// cancelled.
pub async fn cancellable_sleep(delay: Duration, shutdown: &CancellationToken) -> bool {
    if delay.is_zero() {
        return shutdown.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.cancelled() => true,
    }
}

/// Run `operation` against each candidate in order, for up to
/// `config.max_rounds` rounds, stopping at the first success.
///
/// Candidates are always tried in slice order; a candidate that failed in
/// an earlier round is tried again in the next one. `operation` receives
/// the candidate index, the candidate and the 1-based round number. An
/// attempt that has started always runs to completion; cancellation is
/// only observed between attempts.
pub async fn failover_rounds<'a, C, F, Fut, E>(
    config: &RetryConfig,
    candidates: &'a [C],
    shutdown: &CancellationToken,
    mut operation: F,
) -> Failover<E>
where
    F: FnMut(usize, &'a C, u32) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0u32;
    let mut last_error = None;

    for round in 1..=config.max_rounds {
        for (index, candidate) in candidates.iter().enumerate() {
            if shutdown.is_cancelled() {
                return Failover::Cancelled { attempts };
            }
            attempts += 1;
            match operation(index, candidate, round).await {
                Ok(()) => return Failover::Succeeded { index, attempts },
                Err(e) => {
                    let has_next = index + 1 < candidates.len();
                    if has_next {
                        tracing::debug!(
                            round,
                            candidate = index + 1,
                            "attempt failed, trying next in {}s: {}",
                            config.candidate_delay.as_secs(),
                            e
                        );
                    }
                    last_error = Some(e);
                    if has_next && cancellable_sleep(config.candidate_delay, shutdown).await {
                        return Failover::Cancelled { attempts };
                    }
                }
            }
        }

        if round < config.max_rounds && !candidates.is_empty() {
            tracing::warn!(
                "Round {}/{} failed on all {} candidates, waiting {}s",
                round,
                config.max_rounds,
                candidates.len(),
                config.round_delay.as_secs()
            );
            if cancellable_sleep(config.round_delay, shutdown).await {
                return Failover::Cancelled { attempts };
            }
        }
    }

    Failover::Exhausted {
        attempts,
        last_error,
    }
}
