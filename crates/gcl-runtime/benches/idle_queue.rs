use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use gcl_runtime::{Env, EventLoop};

fn bench_idle_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("runtime_idle_queue");
    let n = 10_000usize;

    group.bench_function("queue_then_run", |b| {
        b.iter_batched(
            || {
                let event_loop = EventLoop::new();
                let counter = Rc::new(Cell::new(0usize));
                for _ in 0..n {
                    let counter = Rc::clone(&counter);
                    event_loop
                        .queue_idle(move || counter.set(counter.get() + 1))
                        .expect("queue idle task");
                }
                (event_loop, counter)
            },
            |(event_loop, counter)| {
                event_loop.run();
                black_box(counter.get());
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_collect_with_finalizers(c: &mut Criterion) {
    let mut group = c.benchmark_group("runtime_finalizers");
    let n = 10_000usize;

    group.bench_function("collect_and_dispatch", |b| {
        b.iter_batched(
            || {
                let env = Env::new();
                let counter = Rc::new(Cell::new(0usize));
                env.scoped(|env| {
                    for _ in 0..n {
                        let obj = env.create_object().expect("create object");
                        let counter = Rc::clone(&counter);
                        env.add_finalizer(&obj, move |_| counter.set(counter.get() + 1))
                            .expect("add finalizer");
                    }
                })
                .expect("handle scope");
                (env, counter)
            },
            |(env, counter)| {
                env.collect_garbage().expect("collect");
                black_box(counter.get());
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(idle_queue, bench_idle_queue, bench_collect_with_finalizers);
criterion_main!(idle_queue);
