//! Bounded worker pool with a single-consumer completion channel.
//!
//! `workers` rayon tasks pull items from a shared [`WorkQueue`]; a task that
//! finishes one item claims the next immediately, so at most `workers`
//! fetches are in flight and there is no barrier between waves. Results are
//! sent over an mpsc channel and handed to `on_result` on the calling thread,
//! in arrival order.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

use crate::error::FetchError;
use crate::fetch::Fetcher;
use crate::record::{FetchResult, RunStats, WorkItem};
use crate::shutdown::ShutdownFlag;
use crate::work_queue::WorkQueue;

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
    shutdown: ShutdownFlag,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Build a pool of `workers` threads (at least one).
    pub fn new(
        workers: usize,
        shutdown: ShutdownFlag,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fetch-{i}"))
            .build()?;
        Ok(Self {
            pool,
            workers,
            shutdown,
        })
    }

    pub fn shutdown(&self) -> &ShutdownFlag {
        &self.shutdown
    }

    /// Run every item through `fetcher`, calling `on_result` once per
    /// dispatched item as results arrive.
    ///
    /// Once the shutdown flag is set no further items are admitted;
    /// in-flight items still complete and are delivered.
    pub fn run<F: Fetcher>(
        &self,
        items: Vec<WorkItem<F::Input>>,
        fetcher: &F,
        mut on_result: impl FnMut(FetchResult),
    ) -> RunStats {
        let mut stats = RunStats {
            total: items.len(),
            ..Default::default()
        };
        if items.is_empty() {
            return stats;
        }

        let workers = self.workers.min(items.len());
        let queue = WorkQueue::new(items);
        let shutdown = &self.shutdown;
        let (tx, rx) = mpsc::channel::<FetchResult>();

        log::debug!("Dispatching {} items on {workers} workers", queue.total());

        std::thread::scope(|s| {
            let queue = &queue;
            s.spawn(move || {
                self.pool.scope(|ps| {
                    for _ in 0..workers {
                        let tx = tx.clone();
                        ps.spawn(move |_| {
                            while !shutdown.is_requested() {
                                let Some(item) = queue.next() else { break };
                                if tx.send(guarded_fetch(fetcher, item)).is_err() {
                                    break;
                                }
                            }
                        });
                    }
                });
                // last sender drops here, closing the channel
            });

            for result in rx {
                stats.record(&result);
                on_result(result);
            }
        });

        if stats.interrupted() {
            log::warn!(
                "Admission stopped: {}/{} items dispatched",
                stats.dispatched,
                stats.total
            );
        }
        stats
    }
}

/// Invoke the fetcher, converting panics and foreign ids into an internal
/// failure for this item.
fn guarded_fetch<F: Fetcher>(fetcher: &F, item: &WorkItem<F::Input>) -> FetchResult {
    match panic::catch_unwind(AssertUnwindSafe(|| fetcher.fetch(item))) {
        Ok(result) if result.id == item.id => result,
        Ok(result) => FetchResult::failure(
            item.id.clone(),
            FetchError::Internal(format!("fetcher returned result for id {}", result.id)),
        ),
        Err(payload) => FetchResult::failure(
            item.id.clone(),
            FetchError::Internal(format!("fetcher panicked: {}", panic_message(&*payload))),
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps `input` ms, tracks peak concurrency, panics on id "boom".
    struct SleepFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SleepFetcher {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl Fetcher for SleepFetcher {
        type Input = u64;

        fn input(&self, _record: &Record) -> u64 {
            0
        }

        fn fetch(&self, item: &WorkItem<u64>) -> FetchResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(item.input));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if item.id == "boom" {
                panic!("defect for {}", item.id);
            }
            FetchResult::success(item.id.clone())
        }
    }

    fn items(plan: &[(&str, u64)]) -> Vec<WorkItem<u64>> {
        plan.iter()
            .map(|(id, ms)| WorkItem {
                id: id.to_string(),
                input: *ms,
            })
            .collect()
    }

    #[test]
    fn empty_input_returns_zero_stats() {
        let pool = WorkerPool::new(2, ShutdownFlag::new()).unwrap();
        let stats = pool.run(Vec::new(), &SleepFetcher::new(), |_| panic!("no results"));
        assert_eq!(stats, RunStats::default());
    }

    #[test]
    fn completion_order_and_bound() {
        let pool = WorkerPool::new(2, ShutdownFlag::new()).unwrap();
        let fetcher = SleepFetcher::new();
        let mut order = Vec::new();
        let stats = pool.run(
            items(&[("slow", 150), ("fast", 10), ("a", 20), ("b", 20), ("c", 20)]),
            &fetcher,
            |r| order.push(r.id),
        );
        assert_eq!(stats.total, 5);
        assert_eq!(stats.dispatched, 5);
        assert_eq!(stats.succeeded, 5);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
        // "slow" was submitted first but finishes last
        assert_eq!(order.last().map(String::as_str), Some("slow"));
        order.sort();
        assert_eq!(order, vec!["a", "b", "c", "fast", "slow"]);
    }

    #[test]
    fn panic_becomes_internal_failure() {
        let pool = WorkerPool::new(2, ShutdownFlag::new()).unwrap();
        let mut results = Vec::new();
        let stats = pool.run(
            items(&[("1", 5), ("boom", 5), ("3", 5)]),
            &SleepFetcher::new(),
            |r| results.push(r),
        );
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        let failed = results.iter().find(|r| r.id == "boom").unwrap();
        assert!(matches!(failed.error, Some(FetchError::Internal(ref m)) if m.contains("defect for boom")));
    }

    #[test]
    fn shutdown_stops_admission() {
        let shutdown = ShutdownFlag::new();
        let pool = WorkerPool::new(1, shutdown.clone()).unwrap();
        let stats = pool.run(
            items(&[("1", 50), ("2", 50), ("3", 50), ("4", 50)]),
            &SleepFetcher::new(),
            |_| shutdown.request(),
        );
        assert!(stats.dispatched >= 1 && stats.dispatched < 4);
        assert_eq!(stats.succeeded + stats.failed, stats.dispatched);
        assert!(stats.interrupted());
    }
}
