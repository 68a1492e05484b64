//! Priority inversion demo: three tasks, High(5) Med(10) Low(15), share a
//! mutex between High and Low. With inheritance disabled, Med could run
//! indefinitely while Low holds the mutex High is waiting on; with it,
//! Low gets boosted to High's priority for as long as it holds the lock.

#![no_std]
#![no_main]
#![allow(static_mut_refs)]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use preemptrs::config::STACK_SMALL_WORDS;
use preemptrs::mutex::Mutex;
use preemptrs::{kernel_init, kernel_start, task_create, task_delay};

static HIGH_RUNS: AtomicU32 = AtomicU32::new(0);
static LOW_RUNS: AtomicU32 = AtomicU32::new(0);

static MTX: Mutex = Mutex::new();

fn high_task(_arg: *mut ()) -> ! {
    let _ = task_delay(50);

    loop {
        let n = HIGH_RUNS.fetch_add(1, Ordering::Relaxed) + 1;

        let _ = MTX.lock(preemptrs::WAIT_FOREVER);
        preemptrs::info!("[HIGH] acquired #{}", n);

        for _ in 0..1_000 {
            cortex_m::asm::nop();
        }

        let _ = MTX.unlock();
        let _ = task_delay(100);
    }
}

fn med_task(_arg: *mut ()) -> ! {
    loop {
        for _ in 0..50_000 {
            cortex_m::asm::nop();
        }
        let _ = task_delay(10);
    }
}

fn low_task(_arg: *mut ()) -> ! {
    loop {
        let n = LOW_RUNS.fetch_add(1, Ordering::Relaxed) + 1;

        let _ = MTX.lock(preemptrs::WAIT_FOREVER);
        preemptrs::info!("[LOW] holding #{}", n);

        for _ in 0..100_000 {
            cortex_m::asm::nop();
        }

        let _ = MTX.unlock();
        let _ = task_delay(200);
    }
}

#[entry]
fn main() -> ! {
    preemptrs::info!("priority inversion demo: H(5) M(10) L(15)");

    kernel_init().expect("kernel init failed");
    MTX.create("pi_mutex").expect("mutex create failed");

    task_create("low", low_task, core::ptr::null_mut(), 15, STACK_SMALL_WORDS)
        .expect("low task create failed");
    task_create("med", med_task, core::ptr::null_mut(), 10, STACK_SMALL_WORDS)
        .expect("med task create failed");
    task_create("high", high_task, core::ptr::null_mut(), 5, STACK_SMALL_WORDS)
        .expect("high task create failed");

    preemptrs::info!("starting kernel");
    kernel_start().expect("kernel start failed");

    loop {
        cortex_m::asm::wfi();
    }
}
