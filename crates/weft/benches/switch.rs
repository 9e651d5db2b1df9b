use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use weft::{resume, yield_now, Executor, Fiber};

fn bench_resume_yield(c: &mut Criterion) {
    let mut fiber = Fiber::with_stack_size(64 * 1024, || loop {
        yield_now();
    });

    // One iteration = resume into the fiber and yield back out
    c.bench_function("resume_yield_round_trip", |b| {
        b.iter(|| {
            resume(black_box(&mut fiber));
        });
    });
}

fn bench_fiber_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("fiber_lifecycle");

    group.bench_function("create_run_drop", |b| {
        b.iter(|| {
            let mut fiber = Fiber::with_stack_size(64 * 1024, || {});
            resume(&mut fiber);
            black_box(fiber.status())
        });
    });

    let mut pooled = Fiber::uninit(64 * 1024);
    group.bench_function("reset_run", |b| {
        b.iter(|| {
            pooled.reset(|| {}, 0);
            resume(&mut pooled);
        });
    });

    group.finish();
}

fn bench_executor(c: &mut Criterion) {
    let mut group = c.benchmark_group("executor");

    for jobs in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(jobs as u64));
        group.bench_with_input(BenchmarkId::new("push_drain", jobs), &jobs, |b, &jobs| {
            b.iter(|| {
                let exec = Arc::new(Executor::new());
                let worker = Arc::clone(&exec).spawn_worker().unwrap();
                for i in 0..jobs {
                    exec.push(move || {
                        black_box(i);
                    });
                }
                exec.stop();
                worker.join().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resume_yield, bench_fiber_lifecycle, bench_executor);
criterion_main!(benches);
