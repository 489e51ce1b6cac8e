use corokit_pool::{Task, ThreadPool};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const TASKS: usize = 1_000;

fn push_join(pool: &ThreadPool) {
    let tasks: Vec<_> = (0..TASKS)
        .map(|i| Task::new(move || black_box(i).wrapping_mul(31)))
        .collect();
    for task in &tasks {
        pool.push(task).expect("push");
    }
    for task in &tasks {
        black_box(task.join().expect("join"));
    }
}

fn push_detach(pool: &ThreadPool) {
    for i in 0..TASKS {
        let task = Task::new(move || black_box(i));
        pool.push(&task).expect("push");
        task.detach().expect("detach");
    }
    while pool.queued_count() > 0 || pool.active_count() > 0 {
        std::thread::yield_now();
    }
}

fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool");
    for threads in [1usize, 4, 16] {
        let pool = ThreadPool::new(threads).expect("pool");
        group.bench_with_input(BenchmarkId::new("push_join", threads), &pool, |b, pool| {
            b.iter(|| push_join(pool))
        });
        group.bench_with_input(BenchmarkId::new("push_detach", threads), &pool, |b, pool| {
            b.iter(|| push_detach(pool))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pool);
criterion_main!(benches);
