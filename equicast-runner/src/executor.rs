//! Decaying-concurrency retry executor.
//!
//! Each attempt dispatches every remaining item across a fresh Rayon pool of
//! exactly `worker_count(attempt)` threads. The pool is drained before
//! results are evaluated; failures become the next attempt's input. Between
//! attempts the orchestrating thread sleeps for a jittered backoff, or for
//! the adapter's cooldown when that is longer, with no pool alive. Items that still fail after the final attempt land in the
//! error map and the error log.
//!
//! Item failures never abort a sweep. `run` only returns `Err` for problems
//! with the sweep itself (pool construction, writing the error log).

use crate::adapter::FetchAdapter;
use crate::error::IngestError;
use crate::progress::{SilentProgress, SweepProgress};
use equicast_core::splitter::dedup_preserving_order;
use equicast_core::Identifier;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Outcome of fetching one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Success { location: PathBuf },
    Failure { error: String },
}

impl FetchResult {
    pub fn success(location: impl Into<PathBuf>) -> Self {
        FetchResult::Success {
            location: location.into(),
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        FetchResult::Failure {
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success { .. })
    }
}

/// Lower bound on the worker count as attempts decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinWorkers {
    /// `max_workers / max_attempts`.
    Proportional,
    Fixed(usize),
}

/// Uniformly jittered sleep between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub min: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(5),
            max: Duration::from_secs(10),
        }
    }
}

impl Backoff {
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn delay(&self, rng: &mut impl Rng) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        if hi <= lo {
            return self.min;
        }
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

/// Parameters for one sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_workers: usize,
    pub min_workers: MinWorkers,
    pub decay_rate: f64,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Floor for the decayed worker count; never below 1 or above `max_workers`.
    pub fn min_workers(&self) -> usize {
        let raw = match self.min_workers {
            MinWorkers::Proportional => self.max_workers / self.max_attempts.max(1) as usize,
            MinWorkers::Fixed(n) => n,
        };
        raw.min(self.max_workers).max(1)
    }

    /// `max(floor(max_workers * (1 - decay_rate)^attempt), min_workers)` for a
    /// zero-based attempt.
    pub fn worker_count(&self, attempt: u32) -> usize {
        let factor = (1.0 - self.decay_rate).powi(attempt as i32);
        let decayed = (self.max_workers as f64 * factor).floor() as usize;
        decayed.max(self.min_workers())
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_attempts == 0 {
            return Err(IngestError::InvalidArgument(
                "max attempts must be at least 1".into(),
            ));
        }
        if self.max_workers == 0 {
            return Err(IngestError::InvalidArgument(
                "max workers must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.decay_rate) {
            return Err(IngestError::InvalidArgument(format!(
                "decay rate must be in [0, 1), got {}",
                self.decay_rate
            )));
        }
        if self.backoff.max < self.backoff.min {
            return Err(IngestError::InvalidArgument(
                "backoff max must not be below backoff min".into(),
            ));
        }
        Ok(())
    }
}

/// Final state of a sweep.
#[derive(Debug, Clone)]
pub struct SweepReport<I: Identifier> {
    /// Last result per item.
    pub results: HashMap<I, FetchResult>,
    /// Items still failing after the final attempt, with their last error.
    pub errors: HashMap<I, String>,
    /// Attempts actually run.
    pub attempts: u32,
    /// Written only when `errors` is non-empty.
    pub error_log: Option<PathBuf>,
}

impl<I: Identifier> SweepReport<I> {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.is_success()).count()
    }

    /// Error map entries ordered by identifier text.
    pub fn sorted_errors(&self) -> Vec<(&I, &str)> {
        let mut entries: Vec<(&I, &str)> = self
            .errors
            .iter()
            .map(|(id, msg)| (id, msg.as_str()))
            .collect();
        entries.sort_by_key(|(id, _)| id.to_string());
        entries
    }
}

pub struct RetryExecutor {
    policy: RetryPolicy,
    error_log_path: PathBuf,
    progress: Box<dyn SweepProgress>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, error_log_path: impl Into<PathBuf>) -> Self {
        Self {
            policy,
            error_log_path: error_log_path.into(),
            progress: Box::new(SilentProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn SweepProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch every item, retrying failures with decaying concurrency.
    pub fn run<A: FetchAdapter>(
        &self,
        items: Vec<A::Item>,
        adapter: &A,
    ) -> Result<SweepReport<A::Item>, IngestError> {
        self.policy.validate()?;
        // A log left by an earlier run must not outlive this sweep's outcome.
        match fs::remove_file(&self.error_log_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(IngestError::io(self.error_log_path.clone(), e)),
        }

        let mut remaining = dedup_preserving_order(items);
        let mut results: HashMap<A::Item, FetchResult> = HashMap::with_capacity(remaining.len());
        let mut errors: HashMap<A::Item, String> = HashMap::new();
        let mut attempts = 0;
        let mut rng = rand::thread_rng();

        for attempt in 0..self.policy.max_attempts {
            if remaining.is_empty() {
                break;
            }
            attempts = attempt + 1;
            let workers = self.policy.worker_count(attempt);
            info!(
                attempt = attempts,
                max_attempts = self.policy.max_attempts,
                workers,
                items = remaining.len(),
                "starting fetch attempt"
            );

            let outcomes = self.dispatch(attempts, workers, &remaining, adapter)?;

            let mut failed = Vec::new();
            let mut failures = Vec::new();
            for (id, result) in outcomes {
                if let FetchResult::Failure { error } = &result {
                    failed.push(id.clone());
                    failures.push((id.clone(), error.clone()));
                }
                results.insert(id, result);
            }
            self.progress
                .on_attempt_complete(attempts, remaining.len() - failed.len(), failed.len());

            if failed.is_empty() {
                info!(attempt = attempts, "all items fetched");
                break;
            }

            if attempts == self.policy.max_attempts {
                errors.extend(failures);
                break;
            }

            let delay = self.policy.backoff.delay(&mut rng);
            let cooldown = adapter.cooldown();
            warn!(
                attempt = attempts,
                failed = failed.len(),
                delay_ms = delay.as_millis() as u64,
                cooldown_ms = cooldown.as_millis() as u64,
                "retrying failed items"
            );
            remaining = failed;
            std::thread::sleep(delay.max(cooldown));
        }

        let mut report = SweepReport {
            results,
            errors,
            attempts,
            error_log: None,
        };

        if !report.errors.is_empty() {
            write_error_log(&self.error_log_path, &report)?;
            error!(
                failed = report.errors.len(),
                path = %self.error_log_path.display(),
                "some items failed after all attempts"
            );
            report.error_log = Some(self.error_log_path.clone());
        }

        Ok(report)
    }

    /// One attempt: a pool of exactly `workers` threads, blocking until drained.
    fn dispatch<A: FetchAdapter>(
        &self,
        attempt: u32,
        workers: usize,
        remaining: &[A::Item],
        adapter: &A,
    ) -> Result<Vec<(A::Item, FetchResult)>, IngestError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fetch-{i}"))
            .build()
            .map_err(|e| IngestError::WorkerPool(e.to_string()))?;

        self.progress.on_attempt_start(
            attempt,
            self.policy.max_attempts,
            workers,
            remaining.len(),
        );

        let progress = self.progress.as_ref();
        let outcomes: Vec<(A::Item, FetchResult)> = pool.install(|| {
            remaining
                .par_iter()
                .map(|id| {
                    let result = guard(|| adapter.fetch(id));
                    progress.on_item_complete(&id.to_string(), result.is_success());
                    (id.clone(), result)
                })
                .collect()
        });
        drop(pool);
        Ok(outcomes)
    }
}

/// Run `f`, turning a panic into a `Failure`.
pub(crate) fn guard(f: impl FnOnce() -> FetchResult) -> FetchResult {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        FetchResult::failure(format!("panicked: {}", panic_message(payload.as_ref())))
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn write_error_log<I: Identifier>(path: &Path, report: &SweepReport<I>) -> Result<(), IngestError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| IngestError::io(parent, e))?;
        }
    }
    let mut content = String::new();
    for (id, message) in report.sorted_errors() {
        content.push_str(&format!("{id}: {message}\n"));
    }
    fs::write(path, content).map_err(|e| IngestError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn policy(max_workers: usize, max_attempts: u32, min_workers: MinWorkers) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            max_workers,
            min_workers,
            decay_rate: 0.2,
            backoff: Backoff::none(),
        }
    }

    #[test]
    fn fx_worker_counts_decay_to_proportional_floor() {
        let p = policy(20, 5, MinWorkers::Proportional);
        let counts: Vec<usize> = (0..5).map(|a| p.worker_count(a)).collect();
        // 20, 16, 12.8, 10.24, 8.19 -> floor, min 4
        assert_eq!(counts, vec![20, 16, 12, 10, 8]);
    }

    #[test]
    fn stock_worker_counts_stop_at_fixed_floor() {
        let p = policy(80, 12, MinWorkers::Fixed(10));
        assert_eq!(p.worker_count(0), 80);
        assert_eq!(p.worker_count(1), 64);
        assert_eq!(p.worker_count(11), 10);
    }

    #[test]
    fn worker_count_is_never_zero() {
        let p = policy(1, 5, MinWorkers::Proportional);
        assert_eq!(p.min_workers(), 1);
        assert!((0..5).all(|a| p.worker_count(a) == 1));
    }

    #[test]
    fn fixed_floor_never_exceeds_max_workers() {
        let p = policy(4, 5, MinWorkers::Fixed(10));
        assert_eq!(p.worker_count(3), 4);
    }

    #[test]
    fn validate_rejects_bad_policies() {
        assert!(policy(0, 5, MinWorkers::Proportional).validate().is_err());
        assert!(policy(4, 0, MinWorkers::Proportional).validate().is_err());
        let mut p = policy(4, 5, MinWorkers::Proportional);
        p.decay_rate = 1.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn backoff_stays_in_range() {
        let backoff = Backoff::default();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let d = backoff.delay(&mut rng);
            assert!(d >= Duration::from_secs(5) && d <= Duration::from_secs(10));
        }
        assert_eq!(Backoff::none().delay(&mut rng), Duration::ZERO);
    }

    #[test]
    fn guard_converts_panics() {
        let result = guard(|| panic!("boom"));
        assert_eq!(result, FetchResult::failure("panicked: boom"));
    }
}
