//! Producer-consumer demo built on a counting semaphore: one task signals
//! once per item produced, the other blocks in `wait` until one is ready.

#![no_std]
#![no_main]
#![allow(static_mut_refs)]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use preemptrs::config::STACK_SMALL_WORDS;
use preemptrs::sem::Semaphore;
use preemptrs::{kernel_init, kernel_start, task_create, task_delay};

static PRODUCED: AtomicU32 = AtomicU32::new(0);
static CONSUMED: AtomicU32 = AtomicU32::new(0);

static SEM: Semaphore = Semaphore::new();

fn producer_task(_arg: *mut ()) -> ! {
    loop {
        let n = PRODUCED.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = SEM.signal();
        preemptrs::info!("[P] produced #{}", n);
        let _ = task_delay(200);
    }
}

fn consumer_task(_arg: *mut ()) -> ! {
    loop {
        let _ = SEM.wait(preemptrs::WAIT_FOREVER);
        let n = CONSUMED.fetch_add(1, Ordering::Relaxed) + 1;
        preemptrs::info!("[C] consumed #{}", n);
        for _ in 0..10_000 {
            cortex_m::asm::nop();
        }
    }
}

#[entry]
fn main() -> ! {
    preemptrs::info!("producer-consumer demo");

    kernel_init().expect("kernel init failed");
    SEM.create(0, u32::MAX, "pc_sem").expect("sem create failed");

    task_create(
        "producer",
        producer_task,
        core::ptr::null_mut(),
        15,
        STACK_SMALL_WORDS,
    )
    .expect("producer task create failed");
    task_create(
        "consumer",
        consumer_task,
        core::ptr::null_mut(),
        10,
        STACK_SMALL_WORDS,
    )
    .expect("consumer task create failed");

    preemptrs::info!("starting kernel");
    kernel_start().expect("kernel start failed");

    loop {
        cortex_m::asm::wfi();
    }
}
