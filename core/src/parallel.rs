//! Fixed-size worker pool over a shared FIFO queue.
//!
//! Workers return nothing to the caller: they write into pre-sized, disjointly
//! indexed outputs or send on a channel the caller owns. A stalled worker stalls
//! the whole stage; there is no cancellation.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::error::Result;

/// FIFO of work items shared by all workers of one stage.
pub struct WorkQueue<T> {
    receiver: Receiver<T>,
}

impl<T> WorkQueue<T> {
    /// Enqueues every item up front; the queue is closed once drained.
    pub fn new<I: IntoIterator<Item = T>>(items: I) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        for item in items {
            // The receiver is alive, so sending cannot fail.
            let _ = sender.send(item);
        }
        Self { receiver }
    }

    /// Next item, or `None` once the queue is exhausted.
    pub fn pop(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}

/// Runs `task` on `workers` threads and blocks until all of them return.
/// `task` receives the worker's index in `0..workers`.
pub fn parallel<F>(task: F, workers: usize)
where
    F: Fn(usize) + Sync,
{
    let workers = workers.max(1);
    let task = &task;
    std::thread::scope(|scope| {
        for worker in 0..workers {
            scope.spawn(move || task(worker));
        }
    });
}

/// Like `parallel`, for fallible tasks. Returns the first error any worker hit;
/// the other workers still run to completion.
pub fn parallel_check<F>(task: F, workers: usize) -> Result<()>
where
    F: Fn(usize) -> Result<()> + Sync,
{
    let first_error = Mutex::new(None);
    parallel(
        |worker| {
            if let Err(err) = task(worker) {
                let mut slot = first_error.lock();
                if slot.is_none() {
                    *slot = Some(err);
                }
            }
        },
        workers,
    );
    match first_error.into_inner() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Runs fallible `task` on every queued item and sends each worker's output on a
/// fresh channel, returning what the workers produced once all have joined.
pub fn parallel_collect<T, R, F>(queue: &WorkQueue<T>, workers: usize, task: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(&WorkQueue<T>, &Sender<R>) -> Result<()> + Sync,
{
    let (sender, receiver) = crossbeam_channel::unbounded();
    parallel_check(|_| task(queue, &sender), workers)?;
    drop(sender);
    Ok(receiver.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    #[test]
    fn every_item_is_processed_once() {
        let queue = WorkQueue::new(0..1000usize);
        let slots: Vec<AtomicU32> = (0..1000).map(|_| AtomicU32::new(0)).collect();
        parallel(
            |_| {
                while let Some(i) = queue.pop() {
                    slots[i].fetch_add(1, Ordering::Relaxed);
                }
            },
            4,
        );
        assert!(slots.iter().all(|s| s.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn zero_workers_runs_one() {
        let runs = AtomicUsize::new(0);
        parallel(|_| { runs.fetch_add(1, Ordering::Relaxed); }, 0);
        assert_eq!(runs.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn check_reports_worker_error() {
        let result = parallel_check(
            |worker| {
                if worker == 2 {
                    Err(IndexError::corruption("worker 2"))
                } else {
                    Ok(())
                }
            },
            3,
        );
        assert!(matches!(result, Err(IndexError::Corruption(msg)) if msg == "worker 2"));
    }

    #[test]
    fn collect_gathers_per_worker_output() {
        let queue = WorkQueue::new(1..=100u64);
        let partials = parallel_collect(&queue, 4, |queue, out| {
            let mut sum = 0;
            while let Some(n) = queue.pop() {
                sum += n;
            }
            let _ = out.send(sum);
            Ok(())
        })
        .unwrap();
        assert_eq!(partials.len(), 4);
        assert_eq!(partials.iter().sum::<u64>(), 5050);
    }
}
