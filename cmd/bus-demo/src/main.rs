//! Bus example
//!
//! Producers and consumers on bounded channels, a broadcast, and a close
//! that wakes a blocked receiver.

use corokit::{block_on, kprint, spawn, yield_now, Bus, BusError, SchedulerConfig};
use std::cell::Cell;
use std::rc::Rc;

fn main() {
    kprint::init();
    println!("=== corokit Bus Example ===\n");

    let producers: u32 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(3);
    let per_producer: u32 = 5;

    let result = block_on(SchedulerConfig::from_env(), async move {
        let bus = Rc::new(Bus::new());
        let work = bus.open(2).expect("open work channel");
        println!("Opened channel {} with capacity 2\n", work);

        // Producers block whenever the channel is full.
        for p in 0..producers {
            let bus = bus.clone();
            spawn(async move {
                for i in 0..per_producer {
                    let value = p * 100 + i;
                    match bus.send(work, value).await {
                        Ok(()) => println!("[Producer {}] Sent: {}", p, value),
                        Err(e) => println!("[Producer {}] Failed to send {}: {}", p, value, e),
                    }
                }
                println!("[Producer {}] Done!", p);
            })
            .expect("spawn producer");
        }

        let received = Rc::new(Cell::new(0u32));
        let total = producers * per_producer;
        {
            let bus = bus.clone();
            let received = received.clone();
            spawn(async move {
                let mut batch = [0u32; 4];
                while received.get() < total {
                    match bus.recv_v(work, &mut batch).await {
                        Ok(n) => {
                            println!("[Consumer] Received batch: {:?}", &batch[..n]);
                            received.set(received.get() + n as u32);
                        }
                        Err(e) => {
                            println!("[Consumer] Error: {}", e);
                            break;
                        }
                    }
                }
            })
            .expect("spawn consumer");
        }

        while received.get() < total {
            yield_now().await;
        }
        println!("\nReceived {} values\n", received.get());

        // Broadcast goes to every open channel or to none.
        let a = bus.open(1).expect("open a");
        let b = bus.open(1).expect("open b");
        bus.try_broadcast(7).expect("broadcast");
        println!(
            "Broadcast 7: work={:?} a={:?} b={:?}",
            bus.try_recv(work),
            bus.try_recv(a),
            bus.try_recv(b)
        );

        // Closing a channel wakes whoever is blocked on it.
        let waiter = bus.clone();
        spawn(async move {
            match waiter.recv(a).await {
                Err(BusError::NoChannel) => println!("[Waiter] Woken by close"),
                other => println!("[Waiter] Unexpected: {:?}", other),
            }
        })
        .expect("spawn waiter");
        yield_now().await;
        bus.close(a).expect("close a");
        yield_now().await;

        let reopened = bus.open(3).expect("reopen");
        println!("Reopened handle: {} (freed handles are reused)", reopened);
        bus.channel_count()
    });

    match result {
        Ok(open) => println!("\nChannels still open: {}", open),
        Err(e) => println!("\nScheduler error: {}", e),
    }
    println!("\n=== Example Complete ===");
}
