//! Tick-driven time management: delay conveniences and the tick handler.
//!
//! The actual delayed-task bookkeeping (the wrap-safe two-list design)
//! lives on `kernel::SchedState`; this module is the thin layer that
//! drives it once per tick and wakes whatever comes due.

use super::config::CFG_TICK_RATE_HZ;
use super::critical::critical_section;
use super::error::OsResult;
use super::kernel;
use super::sched;
use super::task::{self, ready_link};
use super::types::{OsTick, TaskState, WakeReason};

pub use task::task_delay as delay_ticks;

/// Convenience delay specified in wall-clock units rather than raw
/// ticks.
pub fn delay_hmsm(hours: u16, minutes: u8, seconds: u8, milliseconds: u16) -> OsResult<()> {
    let total_ms = (hours as u64) * 3_600_000
        + (minutes as u64) * 60_000
        + (seconds as u64) * 1_000
        + (milliseconds as u64);
    let ticks = (total_ms * CFG_TICK_RATE_HZ as u64 / 1000) as OsTick;
    task::task_delay(ticks)
}

/// Current system tick count.
#[inline]
pub fn tick_get() -> OsTick {
    kernel::tick_get()
}

/// Drives one system tick: advances the counter, wakes every task whose
/// delay or pend timeout has just expired, and rotates same-priority
/// ready tasks whose time quantum ran out. Called from `SysTick`.
pub fn tick_handler() {
    if !kernel::is_running() {
        return;
    }

    kernel::KERNEL.int_enter();
    let new_now = kernel::KERNEL.tick_increment();
    let wrapped = new_now == 0;

    critical_section(|cs| {
        let sched = kernel::sched_mut(cs);
        if wrapped {
            sched.handle_tick_wrap();
        }

        while let Some(tcb) = sched.pop_due(new_now) {
            let prio = unsafe {
                let t = &mut *tcb.as_ptr();
                // A task pending on a sync object with a timeout is
                // linked on both the delayed list and that object's
                // wait list; splice it out of the latter too.
                if let (Some(obj), Some(unlink)) = (t.waiting_on, t.unlink_waiter) {
                    unlink(obj, tcb);
                    t.waiting_on = None;
                    t.unlink_waiter = None;
                }
                t.wake_reason = WakeReason::Timeout;
                t.state = TaskState::Ready;
                t.effective_priority
            };
            unsafe { sched.ready_queue(prio).insert_tail(tcb, ready_link) };
            sched.prio_table().insert(prio);
        }

        sched::tick_round_robin(cs);
    });

    kernel::int_exit();
}

#[no_mangle]
pub extern "C" fn SysTick() {
    tick_handler();
}
