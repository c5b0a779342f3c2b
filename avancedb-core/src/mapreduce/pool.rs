//! The map/reduce worker pool: a fixed number of worker threads, each
//! owning one persistent `ScriptRuntime`, created lazily on first use and
//! never shared across threads. Task submission enqueues onto a bounded
//! FIFO (`crossbeam_channel`); closures run to completion, there is no
//! cancellation.
//!
//! The pool is an explicit value the caller constructs and threads
//! through, rather than a process-wide singleton — a test can build a
//! single-worker pool with an inline `ScriptRuntime` instead of reaching
//! for a shared global.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};

use crate::error::{AvanceError, Result};
use crate::runtime::ScriptRuntime;
use crate::{log_debug, log_trace};

type Job = Box<dyn FnOnce(&mut dyn ScriptRuntime) + Send + 'static>;

/// A fixed pool of worker threads, each lazily owning one `ScriptRuntime`.
pub struct MapReduceThreadPool {
    sender: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl MapReduceThreadPool {
    /// `runtime_factory` is called once per worker thread, the first time
    /// that worker is asked to run a job — never on the caller's thread,
    /// and never more than once per worker, since runtimes are thread-affine.
    pub fn new<F>(worker_threads: usize, queue_depth: usize, runtime_factory: F) -> Self
    where
        F: Fn() -> Box<dyn ScriptRuntime> + Send + Sync + 'static,
    {
        let worker_threads = worker_threads.max(1);
        let (sender, receiver) = bounded::<Job>(queue_depth.max(1));
        let factory = std::sync::Arc::new(runtime_factory);

        let workers = (0..worker_threads)
            .map(|id| {
                let receiver = receiver.clone();
                let factory = std::sync::Arc::clone(&factory);
                thread::Builder::new()
                    .name(format!("mapreduce-worker-{id}"))
                    .spawn(move || {
                        let mut runtime: Option<Box<dyn ScriptRuntime>> = None;
                        while let Ok(job) = receiver.recv() {
                            let rt = runtime.get_or_insert_with(|| {
                                log_debug!("worker {id} creating its script runtime");
                                factory()
                            });
                            job(rt.as_mut());
                        }
                        log_trace!("worker {id} shutting down");
                    })
                    .expect("failed to spawn map/reduce worker thread")
            })
            .collect();

        MapReduceThreadPool { sender, workers }
    }

    /// Enqueues `job`; blocks only if the bounded queue is momentarily
    /// full (the queue is sized to absorb the executor's fan-out, so this
    /// is not expected to be a long wait).
    pub fn post(&self, job: impl FnOnce(&mut dyn ScriptRuntime) + Send + 'static) -> Result<()> {
        self.sender
            .send(Box::new(job))
            .map_err(|_| AvanceError::ResourceExhausted("map/reduce worker pool has shut down".into()))
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for MapReduceThreadPool {
    fn drop(&mut self) {
        // Dropping `sender` (there is only ever the one, owned here) closes
        // the channel; each worker's `recv()` then returns `Err` and the
        // loop exits, so every worker thread is joinable.
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::NativeClosureRuntime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn posted_jobs_run_and_reuse_a_runtime_per_worker() {
        let pool = MapReduceThreadPool::new(2, 16, || Box::new(NativeClosureRuntime::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        let wg = crossbeam::sync::WaitGroup::new();

        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            let wg = wg.clone();
            pool.post(move |_rt| {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(wg);
            })
            .unwrap();
        }
        wg.wait();

        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(pool.worker_count(), 2);
    }
}
