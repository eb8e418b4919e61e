use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// Provides multithreading dispatch primitives and a thread count for the collision pipeline to use.
///
/// The pipeline does not need a load balancing parallel-for. All it needs is a way to jumpstart some threads;
/// work distribution happens through [`JobCounter`] inside the worker bodies.
pub trait ThreadDispatcher: Send + Sync {
    /// Gets the number of workers available in the thread dispatcher.
    fn thread_count(&self) -> usize;

    /// Runs `worker_body` on up to `maximum_worker_count` workers and returns once all of them finished.
    /// The worker index is passed to the body.
    fn dispatch_workers<F>(&self, worker_body: F, maximum_worker_count: usize)
    where
        F: Fn(usize) + Sync;
}

/// Dispatcher that spawns scoped threads for every dispatch.
///
/// Worker 0 runs on the calling thread.
#[derive(Clone, Copy, Debug)]
pub struct ScopedThreadDispatcher {
    thread_count: usize,
}

impl ScopedThreadDispatcher {
    pub fn new(thread_count: usize) -> Self {
        Self {
            thread_count: thread_count.max(1),
        }
    }
}

impl ThreadDispatcher for ScopedThreadDispatcher {
    fn thread_count(&self) -> usize {
        self.thread_count
    }

    fn dispatch_workers<F>(&self, worker_body: F, maximum_worker_count: usize)
    where
        F: Fn(usize) + Sync,
    {
        let worker_count = self.thread_count.min(maximum_worker_count).max(1);
        if worker_count == 1 {
            worker_body(0);
            return;
        }
        let body = &worker_body;
        let scope_result = crossbeam_utils::thread::scope(|scope| {
            for worker_index in 1..worker_count {
                scope.spawn(move |_| body(worker_index));
            }
            body(0);
        });
        if let Err(panic) = scope_result {
            std::panic::resume_unwind(panic);
        }
    }
}

/// Shared counter that workers use to claim job indices.
#[derive(Debug, Default)]
pub struct JobCounter {
    next: CachePadded<AtomicUsize>,
}

impl JobCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the next job index, or `None` once `job_count` jobs were handed out.
    #[inline]
    pub fn claim(&self, job_count: usize) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        (index < job_count).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn all_jobs_run_exactly_once() {
        let dispatcher = ScopedThreadDispatcher::new(4);
        let counter = JobCounter::new();
        let visited = Mutex::new(vec![0u32; 100]);
        dispatcher.dispatch_workers(
            |_| {
                while let Some(job) = counter.claim(100) {
                    visited.lock().unwrap()[job] += 1;
                }
            },
            usize::MAX,
        );
        assert!(visited.into_inner().unwrap().iter().all(|&count| count == 1));
    }

    #[test]
    fn single_worker_runs_inline() {
        let dispatcher = ScopedThreadDispatcher::new(0);
        assert_eq!(dispatcher.thread_count(), 1);
        let caller = std::thread::current().id();
        dispatcher.dispatch_workers(
            |index| {
                assert_eq!(index, 0);
                assert_eq!(std::thread::current().id(), caller);
            },
            8,
        );
    }
}
