//! In-process job executor
//!
//! Producers on any thread `push` boxed jobs; a consumer running `start`
//! drains and executes them, waiting on an [`Event`] when the queue is
//! empty. `stop` lets the consumer exit once the queue is drained.
//!
//! ```ignore
//! let exec = Arc::new(Executor::new());
//! let worker = Arc::clone(&exec).spawn_worker()?;
//! exec.push(|| println!("hello from the executor"));
//! exec.stop();
//! worker.join().unwrap();
//! ```

use crate::config;
use crate::event::{Event, PlatformEvent};
use crossbeam_queue::SegQueue;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use weft_core::kdebug;
use weft_core::spinlock::SpinLock;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker thread counter for names
static WORKER_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Job pipe with a single-call consumer loop
pub struct Executor {
    /// Submitted jobs, FIFO per producer
    jobs: SegQueue<Job>,

    /// Submitted but not yet completed
    pending: SpinLock<usize>,

    /// Cleared by `stop`; the consumer exits after its next drain
    running: AtomicBool,

    /// Wakes an idle consumer
    event: PlatformEvent,

    /// Upper bound on one idle wait
    park_timeout: Duration,
}

impl Executor {
    /// Create an executor with the configured park timeout
    /// (`WEFT_PARK_TIMEOUT_MS`).
    pub fn new() -> Self {
        Self::with_park_timeout(config::global().park_timeout)
    }

    pub fn with_park_timeout(park_timeout: Duration) -> Self {
        Self {
            jobs: SegQueue::new(),
            pending: SpinLock::new(0),
            running: AtomicBool::new(true),
            event: PlatformEvent::new(),
            park_timeout,
        }
    }

    /// Submit a job. Never fails; callable from any thread.
    pub fn push<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Count before the job is visible so a fast consumer can never
        // decrement first.
        self.pending.with(|pending| {
            *pending += 1;
            self.jobs.push(Box::new(job));
        });
        self.event.notify_one();
    }

    /// Run jobs on the calling thread until `stop` is called.
    ///
    /// Every job queued before the loop sees the stop flag is executed.
    /// A panicking job unwinds out of `start`.
    pub fn start(&self) {
        let debug = config::global().debug_logging;
        if debug {
            kdebug!("executor started");
        }

        loop {
            while let Some(job) = self.jobs.pop() {
                job();
                self.pending.with(|pending| *pending -= 1);
            }

            if !self.running.load(Ordering::Acquire) {
                break;
            }

            self.event.wait(Some(self.park_timeout));
        }

        if debug {
            kdebug!("executor stopped");
        }
    }

    /// Ask the consumer loop to exit after draining.
    ///
    /// A job already running is not interrupted.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.event.notify_all();
    }

    /// Jobs submitted but not yet completed
    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run `start` on a new OS thread named `weft-executor-N`.
    pub fn spawn_worker(self: Arc<Self>) -> io::Result<JoinHandle<()>> {
        let seq = WORKER_SEQ.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("weft-executor-{}", seq))
            .spawn(move || self.start())
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("pending", &self.pending())
            .field("running", &self.is_running())
            .field("park_timeout", &self.park_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Instant;

    #[test]
    fn test_push_stop_start_runs_job() {
        let exec = Executor::with_park_timeout(Duration::from_millis(10));
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        exec.push(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(exec.pending(), 1);

        exec.stop();
        assert!(!exec.is_running());
        exec.start();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(exec.pending(), 0);
    }

    #[test]
    fn test_many_producers_one_consumer() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 25;

        let exec = Arc::new(Executor::with_park_timeout(Duration::from_millis(10)));
        let counts: Arc<Vec<AtomicU32>> =
            Arc::new((0..PRODUCERS * PER_PRODUCER).map(|_| AtomicU32::new(0)).collect());

        let worker = Arc::clone(&exec).spawn_worker().unwrap();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let exec = Arc::clone(&exec);
                let counts = Arc::clone(&counts);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        let counts = Arc::clone(&counts);
                        let slot = p * PER_PRODUCER + i;
                        exec.push(move || {
                            counts[slot].fetch_add(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(10);
        while exec.pending() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        exec.stop();
        worker.join().unwrap();

        assert_eq!(exec.pending(), 0);
        assert!(counts.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn test_per_producer_order() {
        let exec = Executor::with_park_timeout(Duration::from_millis(10));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..10 {
            let seen = Arc::clone(&seen);
            exec.push(move || seen.lock().unwrap().push(i));
        }
        exec.stop();
        exec.start();
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_stop_wakes_idle_worker() {
        // Long park timeout: only the notify can end the wait quickly
        let exec = Arc::new(Executor::with_park_timeout(Duration::from_secs(30)));
        let worker = Arc::clone(&exec).spawn_worker().unwrap();

        while exec.event.waiter_count() == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        let start = Instant::now();
        exec.stop();
        worker.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_worker_thread_name() {
        let exec = Arc::new(Executor::with_park_timeout(Duration::from_millis(10)));
        let name = Arc::new(std::sync::Mutex::new(String::new()));

        let n = Arc::clone(&name);
        exec.push(move || {
            *n.lock().unwrap() = thread::current().name().unwrap_or_default().to_string();
        });
        exec.stop();
        Arc::clone(&exec).spawn_worker().unwrap().join().unwrap();

        assert!(name.lock().unwrap().starts_with("weft-executor-"));
    }
}
