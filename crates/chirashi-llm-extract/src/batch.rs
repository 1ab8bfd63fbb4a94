//! Batch scheduling for ensemble extraction.
//!
//! A batch issues N independent extraction calls against the identical
//! image, partitioned into sequential waves of at most `max_concurrency`
//! in-flight calls. Calls within a wave run concurrently; wave k+1 never
//! starts before wave k has fully settled.
//!
//! Failure policy: a failed or timed-out call is logged and dropped from
//! the run sequence; the batch keeps going. Only when every call fails
//! does the batch as a whole fail with
//! [`ExtractError::AllAttemptsFailed`]. A partial batch is a successful
//! batch; the outcome reports how many of the requested calls succeeded.
//!
//! Runs enter the sequence in completion order within each wave, so
//! "earliest run" downstream (the reconciler's last tie-break) follows
//! completion order, not submission order. Known limitations: no mid-batch
//! cancellation (dropping the future is the only abandonment path), and no
//! in-call retry (a later wave's fresh call is the only retry there is).

use std::time::Duration;

use chirashi_core::{ExtractError, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{info, warn};

use crate::models::ExtractionRun;
use crate::usage::UsageAccount;

/// Upper bound on requests per batch.
pub const MAX_REQUEST_COUNT: usize = 10;

/// Default concurrency window.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Explicit scheduling policy for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPolicy {
    request_count: usize,
    max_concurrency: usize,
    call_timeout: Duration,
}

impl BatchPolicy {
    /// Policy for `request_count` calls with default concurrency and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidInput`] when `request_count` is 0 or
    /// exceeds [`MAX_REQUEST_COUNT`].
    pub fn new(request_count: usize) -> Result<Self> {
        if request_count == 0 || request_count > MAX_REQUEST_COUNT {
            return Err(ExtractError::InvalidInput(format!(
                "request count must be between 1 and {MAX_REQUEST_COUNT}, got {request_count}"
            )));
        }
        Ok(Self {
            request_count,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        })
    }

    /// Override the concurrency window.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidInput`] when `max_concurrency` is 0.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(ExtractError::InvalidInput(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        self.max_concurrency = max_concurrency;
        Ok(self)
    }

    /// Override the per-call timeout. Expiry counts as a call failure.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Number of calls this batch will issue.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count
    }

    /// Maximum concurrently in-flight calls.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Per-call timeout.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }
}

/// Fractional completion of a running batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Calls settled so far (success or failure). Monotonic.
    pub completed: usize,
    /// Calls requested in total.
    pub requested: usize,
}

impl BatchProgress {
    /// Completion as a percentage in `[0, 100]`.
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.requested == 0 {
            return 100.0;
        }
        self.completed as f64 / self.requested as f64 * 100.0
    }
}

/// Final state of a settled batch: the run sequence, the usage account,
/// and the success counts.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Successful runs in completion order within the flattening of waves.
    pub runs: Vec<ExtractionRun>,
    /// Token usage accumulated across the successful runs.
    pub usage: UsageAccount,
    /// Calls requested.
    pub requested: usize,
    /// Calls that produced a run.
    pub succeeded: usize,
}

impl BatchOutcome {
    /// Calls that failed (dropped from the run sequence).
    #[must_use]
    pub fn failed(&self) -> usize {
        self.requested - self.succeeded
    }

    /// Whether some but not all calls failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.succeeded < self.requested
    }
}

/// Run one batch of extraction calls.
///
/// `extract_fn` is invoked once per request index; `on_progress` is invoked
/// after every settled call with the monotonic completion fraction. The
/// scheduler owns the run sequence and usage account for the duration of
/// the batch and hands both over in the outcome; a fresh batch always
/// starts from zeroed state.
///
/// # Errors
///
/// Returns [`ExtractError::AllAttemptsFailed`] when every call fails.
pub async fn run_batch<F, Fut, C>(
    policy: &BatchPolicy,
    extract_fn: F,
    mut on_progress: C,
) -> Result<BatchOutcome>
where
    F: Fn(usize) -> Fut,
    Fut: std::future::Future<Output = Result<ExtractionRun>>,
    C: FnMut(BatchProgress),
{
    let requested = policy.request_count();
    info!(
        requested,
        max_concurrency = policy.max_concurrency(),
        "starting extraction batch"
    );

    let mut runs = Vec::with_capacity(requested);
    let mut usage = UsageAccount::new();
    let mut completed = 0usize;

    let indices: Vec<usize> = (0..requested).collect();
    for wave in indices.chunks(policy.max_concurrency()) {
        let mut in_flight: FuturesUnordered<_> = wave
            .iter()
            .map(|&index| {
                let call = extract_fn(index);
                let timeout = policy.call_timeout();
                async move { (index, tokio::time::timeout(timeout, call).await) }
            })
            .collect();

        // Settle the whole wave before the next one starts; each settled
        // call updates progress immediately, in completion order.
        while let Some((index, settled)) = in_flight.next().await {
            completed += 1;
            match settled {
                Ok(Ok(run)) => {
                    usage.record(run.input_tokens, run.output_tokens);
                    runs.push(run);
                }
                Ok(Err(e)) => {
                    warn!(request_index = index, error = %e, "extraction call failed");
                }
                Err(_) => {
                    warn!(
                        request_index = index,
                        timeout_secs = policy.call_timeout().as_secs(),
                        "extraction call timed out"
                    );
                }
            }
            on_progress(BatchProgress {
                completed,
                requested,
            });
        }
    }

    let succeeded = runs.len();
    if succeeded == 0 {
        return Err(ExtractError::AllAttemptsFailed {
            attempted: requested,
        });
    }
    info!(succeeded, requested, "batch settled");

    Ok(BatchOutcome {
        runs,
        usage,
        requested,
        succeeded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirashi_core::{ExtractedRecord, FieldValue};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn run_with(index: usize, rent: &str) -> ExtractionRun {
        let mut record = ExtractedRecord::new();
        record.insert("家賃", FieldValue::scalar(rent));
        ExtractionRun {
            request_index: index,
            record,
            raw_response: String::new(),
            input_tokens: 100,
            output_tokens: 40,
        }
    }

    #[test]
    fn test_policy_bounds() {
        assert!(BatchPolicy::new(0).is_err());
        assert!(BatchPolicy::new(11).is_err());
        assert!(BatchPolicy::new(1).is_ok());
        assert!(BatchPolicy::new(10).is_ok());
        assert!(BatchPolicy::new(5).unwrap().with_max_concurrency(0).is_err());
    }

    #[test]
    fn test_policy_defaults() {
        let policy = BatchPolicy::new(3).unwrap();
        assert_eq!(policy.max_concurrency(), DEFAULT_MAX_CONCURRENCY);
        assert_eq!(policy.call_timeout(), DEFAULT_CALL_TIMEOUT);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_batch_alive() {
        let policy = BatchPolicy::new(5).unwrap();
        let outcome = run_batch(
            &policy,
            |index| async move {
                if index == 1 || index == 3 {
                    Err(chirashi_core::ExtractError::Provider(
                        "HTTP 500: boom".to_string(),
                    ))
                } else {
                    Ok(run_with(index, "8.5万円"))
                }
            },
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.runs.len(), 3);
        assert_eq!(outcome.succeeded, 3);
        assert_eq!(outcome.failed(), 2);
        assert!(outcome.is_partial());
    }

    #[tokio::test]
    async fn test_total_failure_raises_all_attempts_failed() {
        let policy = BatchPolicy::new(4).unwrap();
        let result = run_batch(
            &policy,
            |_| async {
                Err::<ExtractionRun, _>(chirashi_core::ExtractError::Provider(
                    "HTTP 503".to_string(),
                ))
            },
            |_| {},
        )
        .await;

        match result {
            Err(chirashi_core::ExtractError::AllAttemptsFailed { attempted }) => {
                assert_eq!(attempted, 4);
            }
            other => panic!("expected AllAttemptsFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_window() {
        let policy = BatchPolicy::new(10)
            .unwrap()
            .with_max_concurrency(5)
            .unwrap();

        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        // Two full waves through a window of 5.
        let outcome = run_batch(
            &policy,
            |index| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(run_with(index, "7万円"))
                }
            },
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.runs.len(), 10);
        assert!(
            peak.load(Ordering::SeqCst) <= 5,
            "peak in-flight {} exceeded the window",
            peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_reaches_100() {
        let policy = BatchPolicy::new(4).unwrap().with_max_concurrency(2).unwrap();
        let mut seen: Vec<usize> = Vec::new();
        let mut percents: Vec<f64> = Vec::new();

        let outcome = run_batch(
            &policy,
            |index| async move { Ok(run_with(index, "6万円")) },
            |progress| {
                seen.push(progress.completed);
                percents.push(progress.percent());
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.succeeded, 4);
        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert!((percents.last().unwrap() - 100.0).abs() < f64::EPSILON);
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_call_is_dropped() {
        let policy = BatchPolicy::new(2)
            .unwrap()
            .with_call_timeout(Duration::from_millis(50));

        let outcome = run_batch(
            &policy,
            |index| async move {
                if index == 0 {
                    // Never resolves within the timeout.
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok(run_with(index, "9万円"))
            },
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.runs.len(), 1);
        assert_eq!(outcome.runs[0].request_index, 1);
        assert_eq!(outcome.failed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_are_ordered_by_completion_within_a_wave() {
        let policy = BatchPolicy::new(2).unwrap();

        let outcome = run_batch(
            &policy,
            |index| async move {
                if index == 0 {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Ok(run_with(index, "5万円"))
            },
            |_| {},
        )
        .await
        .unwrap();

        // Request 1 finishes first, so it leads the run sequence.
        let order: Vec<usize> = outcome.runs.iter().map(|r| r.request_index).collect();
        assert_eq!(order, vec![1, 0]);
    }

    #[tokio::test]
    async fn test_usage_is_fed_once_per_successful_run() {
        let policy = BatchPolicy::new(3).unwrap();
        let outcome = run_batch(
            &policy,
            |index| async move {
                if index == 2 {
                    Err(chirashi_core::ExtractError::Provider("down".to_string()))
                } else {
                    Ok(run_with(index, "8万円"))
                }
            },
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.usage.total_requests(), 2);
        assert_eq!(outcome.usage.input_tokens(), 200);
        assert_eq!(outcome.usage.output_tokens(), 80);
    }
}
