//! Stress test - many pool tasks
//!
//! Pushes tasks through a `ThreadPool` in waves that fit the queue, joins
//! them, then repeats with detached tasks.
//!
//! Usage: pool-stress [tasks] [threads]

use corokit::{kprint, PoolConfig, PoolError, Task, ThreadPool};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn work(i: u64) -> u64 {
    // A little arithmetic so tasks are not free.
    (0..64).fold(i, |acc, k| acc.wrapping_mul(6364136223846793005).wrapping_add(k))
}

fn main() {
    kprint::init();
    println!("=== corokit Pool Stress Test ===\n");

    let mut args = std::env::args().skip(1);
    let num_tasks: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(100_000);
    let config = PoolConfig::from_env();
    let config = match args.next().and_then(|s| s.parse().ok()) {
        Some(threads) => config.max_threads(threads),
        None => config,
    };
    let wave = config.max_tasks as u64;

    println!("Tasks:   {}", num_tasks);
    println!("Threads: {}", config.max_threads);
    println!("Queue:   {}\n", config.max_tasks);

    let pool = match ThreadPool::with_config(config) {
        Ok(pool) => pool,
        Err(e) => {
            println!("Cannot create pool: {}", e);
            std::process::exit(1);
        }
    };

    // Joined tasks
    let start = Instant::now();
    let mut checksum = 0u64;
    let mut next = 0u64;
    while next < num_tasks {
        let end = (next + wave).min(num_tasks);
        let tasks: Vec<_> = (next..end).map(|i| Task::new(move || work(i))).collect();
        for task in &tasks {
            if let Err(e) = pool.push(task) {
                println!("Push failed: {}", e);
                std::process::exit(1);
            }
        }
        for task in &tasks {
            match task.join() {
                Ok(v) => checksum ^= v,
                Err(e) => println!("Join failed: {}", e),
            }
        }
        print!("\rJoined: {}/{}", end, num_tasks);
        next = end;
    }
    let joined_time = start.elapsed();
    println!("\nThreads spawned: {}", pool.thread_count());

    // Detached tasks
    let done = Arc::new(AtomicU64::new(0));
    let start = Instant::now();
    let mut pushed = 0u64;
    while pushed < num_tasks {
        let done = done.clone();
        let task = Task::new(move || {
            std::hint::black_box(work(pushed));
            done.fetch_add(1, Ordering::Relaxed);
        });
        match pool.push(&task) {
            Ok(()) => {
                let _ = task.detach();
                pushed += 1;
            }
            Err(PoolError::TooManyTasks) => std::thread::yield_now(),
            Err(e) => {
                println!("Push failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    while done.load(Ordering::Relaxed) < num_tasks {
        std::thread::sleep(Duration::from_millis(1));
    }
    let detached_time = start.elapsed();

    let mut pool = pool;
    loop {
        match pool.shutdown() {
            Ok(()) => break,
            Err(rejected) => {
                pool = rejected.into_inner();
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }

    let rate = |d: Duration| num_tasks as f64 / d.as_secs_f64();
    println!("\n=== Results ===");
    println!("Checksum:        {:#018x}", checksum);
    println!("Joined time:     {:?} ({:.0} tasks/sec)", joined_time, rate(joined_time));
    println!("Detached time:   {:?} ({:.0} tasks/sec)", detached_time, rate(detached_time));
}
