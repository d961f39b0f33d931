//! Stress tests for refstore.
//!
//! These helpers hammer a shared store from several threads and check that
//! reference counts add up afterwards.

use crate::fixtures::scenarios::{scenario_key, scenario_value};
use refstore_core::{RefStore, StoreResult, TransactionalEngine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Commits retried after a conflict.
    pub retries: usize,
    /// References added whose matching release failed.
    pub leaked_references: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, retries: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            retries,
            leaked_references: 0,
            duration,
            ops_per_second,
        }
    }

    /// Sets the number of leaked references.
    #[must_use]
    pub fn with_leaked_references(mut self, leaked: usize) -> Self {
        self.leaked_references = leaked;
        self
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Conflict retries: {}", self.retries);
        if self.leaked_references > 0 {
            println!("Leaked references: {}", self.leaked_references);
        }
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct keys the threads contend on.
    pub key_count: usize,
    /// Maximum attempts per operation before it counts as failed.
    pub max_attempts: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            key_count: 8,
            max_attempts: 1_000,
        }
    }
}

/// Runs `op` until it succeeds or fails with a non-retryable error.
///
/// Gives up after `max_attempts` conflicts and returns the last error.
/// `retries` is incremented once per conflict.
pub fn retry_on_conflict<T, F>(max_attempts: usize, retries: &AtomicUsize, mut op: F) -> StoreResult<T>
where
    F: FnMut() -> StoreResult<T>,
{
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                retries.fetch_add(1, Ordering::Relaxed);
                attempt += 1;
                thread::yield_now();
            }
            result => return result,
        }
    }
}

/// Saves the same values from every thread concurrently.
///
/// Each thread saves `operations` times, cycling through `key_count` keys.
/// On success every key holds exactly as many references as saves issued
/// for it.
pub fn stress_concurrent_saves<E>(store: Arc<RefStore<E>>, config: &StressConfig) -> StressTestResult
where
    E: TransactionalEngine + 'static,
{
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let retries = Arc::new(AtomicUsize::new(0));
    let key_count = config.key_count.max(1);

    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let retries = Arc::clone(&retries);
            let operations = config.operations;
            let max_attempts = config.max_attempts;

            thread::spawn(move || {
                for i in 0..operations {
                    let index = (t + i) % key_count;
                    let key = scenario_key(index);
                    let value = scenario_value(index);
                    match retry_on_conflict(max_attempts, &retries, || store.save(&key, &value)) {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        retries.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Result of one increment and release pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChurnStep {
    /// Both halves succeeded.
    Balanced,
    /// The increment failed and no release was attempted.
    IncrementFailed,
    /// The increment succeeded but the release failed.
    Leaked,
}

/// Runs `increment`, then `release` if the increment succeeded.
pub fn churn_once<I, R>(increment: I, release: R) -> ChurnStep
where
    I: FnOnce() -> StoreResult<()>,
    R: FnOnce() -> StoreResult<()>,
{
    if increment().is_err() {
        return ChurnStep::IncrementFailed;
    }
    match release() {
        Ok(()) => ChurnStep::Balanced,
        Err(_) => ChurnStep::Leaked,
    }
}

/// Adds and releases references concurrently on entries that already exist.
///
/// Every thread alternates increment and delete on the same keys. Each half
/// counts as its own operation. The counts end where they started exactly
/// when `leaked_references` is zero. Callers seed each key with at least one
/// reference beforehand so releases never remove an entry.
pub fn stress_reference_churn<E>(store: Arc<RefStore<E>>, config: &StressConfig) -> StressTestResult
where
    E: TransactionalEngine + 'static,
{
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let retries = Arc::new(AtomicUsize::new(0));
    let leaked = Arc::new(AtomicUsize::new(0));
    let key_count = config.key_count.max(1);

    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let retries = Arc::clone(&retries);
            let leaked = Arc::clone(&leaked);
            let operations = config.operations;
            let max_attempts = config.max_attempts;

            thread::spawn(move || {
                for i in 0..operations {
                    let key = scenario_key((t + i) % key_count);
                    let step = churn_once(
                        || {
                            retry_on_conflict(max_attempts, &retries, || {
                                store.increment_reference(&key).map(|_| ())
                            })
                        },
                        || {
                            retry_on_conflict(max_attempts, &retries, || {
                                store.delete(&key).map(|_| ())
                            })
                        },
                    );
                    match step {
                        ChurnStep::Balanced => {
                            successful.fetch_add(2, Ordering::Relaxed);
                        }
                        ChurnStep::IncrementFailed => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                        ChurnStep::Leaked => {
                            successful.fetch_add(1, Ordering::Relaxed);
                            failed.fetch_add(1, Ordering::Relaxed);
                            leaked.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        retries.load(Ordering::Relaxed),
        start.elapsed(),
    )
    .with_leaked_references(leaked.load(Ordering::Relaxed))
}
