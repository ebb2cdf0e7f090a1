//! Bounded scatter/gather executor

use crossbeam_channel::unbounded;
use std::thread;

/// Fixed-size pool that runs one batch at a time
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` on every item using at most `workers` threads
    ///
    /// Blocks until the whole batch has finished and returns results in input
    /// order, whatever order they completed in. A panicking job propagates once
    /// all workers have joined.
    pub fn scatter_gather<T, R, F>(&self, items: Vec<T>, job: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let count = items.len();
        if count == 0 {
            return Vec::new();
        }

        let (job_tx, job_rx) = unbounded();
        for item in items.into_iter().enumerate() {
            let _ = job_tx.send(item);
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded();
        let job = &job;

        thread::scope(|scope| {
            for _ in 0..self.workers.min(count) {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (index, item) in job_rx.iter() {
                        let _ = result_tx.send((index, job(item)));
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<R>> = (0..count).map(|_| None).collect();
        for (index, result) in result_rx.iter() {
            slots[index] = Some(result);
        }
        slots.into_iter().flatten().collect()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_empty_batch() {
        let pool = WorkerPool::new(4);
        let results: Vec<usize> = pool.scatter_gather(Vec::<usize>::new(), |x| x);
        assert!(results.is_empty());
    }

    #[test]
    fn test_results_in_input_order() {
        let pool = WorkerPool::new(4);
        let items: Vec<u64> = (0..12).collect();

        // Later items finish first
        let results = pool.scatter_gather(items, |i| {
            thread::sleep(Duration::from_millis((12 - i) * 5));
            i * 10
        });

        assert_eq!(results, (0..12).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(2);
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        pool.scatter_gather((0..8).collect::<Vec<_>>(), |_| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            running.fetch_sub(1, Ordering::SeqCst);
        });

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_uses_multiple_threads() {
        let pool = WorkerPool::new(3);
        let threads = Mutex::new(HashSet::new());

        pool.scatter_gather((0..9).collect::<Vec<_>>(), |_| {
            threads.lock().unwrap().insert(thread::current().id());
            thread::sleep(Duration::from_millis(20));
        });

        assert!(threads.lock().unwrap().len() > 1);
    }

    #[test]
    fn test_zero_workers_clamped() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.workers(), 1);
        assert_eq!(pool.scatter_gather(vec![1, 2, 3], |x| x + 1), vec![2, 3, 4]);
    }
}
