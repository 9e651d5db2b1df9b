//! Basic weft example
//!
//! Runs a few fibers round-robin on the main thread, recycles one with
//! `reset`, then pushes jobs at an executor worker.
//!
//! # Environment Variables
//!
//! - `WEFT_FLUSH_EPRINT=1` - Flush debug output immediately (useful for crash debugging)
//! - `WEFT_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `WEFT_DEBUG=1` - Log every resume and yield

use weft::{config, resume, yield_now, Executor, Fiber, FiberStatus};
use weft::{kdebug, kinfo};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// WEFT_LOG_LEVEL=debug WEFT_FLUSH_EPRINT=1 cargo run -p weft-basic
fn main() {
    println!("=== weft Basic Example ===\n");

    config::global().print();
    println!();

    run_fibers();
    run_executor();

    println!("\n=== Example Complete ===");
}

fn run_fibers() {
    kinfo!("Creating fibers...");

    let steps = Rc::new(Cell::new(0usize));
    let mut fibers: Vec<Fiber> = (1..=3)
        .map(|i| {
            let s = Rc::clone(&steps);
            let fiber = Fiber::new(move || {
                kdebug!("[fiber {}] Started", i);
                for j in 0..3 {
                    kdebug!("[fiber {}] Iteration {}", i, j);
                    s.set(s.get() + 1);
                    yield_now();
                }
                kdebug!("[fiber {}] Finished", i);
            });
            println!("Created fiber {} (ID={})", i, fiber.id());
            fiber
        })
        .collect();

    // Round-robin until every fiber has ended
    while fibers.iter().any(|f| f.status() != FiberStatus::Ended) {
        for fiber in fibers.iter_mut().filter(|f| f.status().is_resumable()) {
            resume(fiber);
        }
    }
    kinfo!("{} fiber steps completed", steps.get());

    // Recycle the first fiber's stack for new work
    let fiber = &mut fibers[0];
    let s = Rc::clone(&steps);
    fiber.reset(move || s.set(s.get() + 100), 0);
    resume(fiber);
    println!(
        "Reused fiber {} ({} byte stack), steps now {}",
        fiber.id(),
        fiber.stack_size(),
        steps.get()
    );
}

fn run_executor() {
    const JOBS: usize = 16;

    let exec = Arc::new(Executor::new());
    let completed = Arc::new(AtomicUsize::new(0));
    let worker = match Arc::clone(&exec).spawn_worker() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("cannot spawn executor worker: {}", e);
            return;
        }
    };

    for i in 0..JOBS {
        let c = Arc::clone(&completed);
        exec.push(move || {
            kdebug!("[job {}] Running", i);
            c.fetch_add(1, Ordering::SeqCst);
        });
    }
    println!("\nPushed {} jobs, waiting...\n", JOBS);

    let start = Instant::now();
    let timeout = Duration::from_secs(10);
    while exec.pending() > 0 {
        if start.elapsed() > timeout {
            println!("WARNING: Timeout!");
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    exec.stop();
    if worker.join().is_err() {
        eprintln!("executor worker panicked");
    }
    kinfo!("{} job(s) completed", completed.load(Ordering::SeqCst));
}
