//! The scheduling point and the per-tick round-robin rotation.
//!
//! Neither function here decides whether a task *should* run; that's
//! already been decided by whoever called `task_delay`, posted a
//! semaphore, etc. and updated the ready queues and priority bitmap.
//! This module only asks "given current readiness, who is that, and do
//! we need to ask the port layer for a context switch".

use core::ptr::NonNull;

use super::critical::{critical_section, is_isr_context, CriticalSection};
use super::kernel;
use super::task::{ready_link, OsTcb};
use super::types::{OsPrio, TaskState};

/// The main scheduling point. Call after any operation that may have
/// changed task readiness: task create, delay/timeout expiry, a
/// semaphore/mutex post, a resume. No-op before `kernel_start`, from ISR
/// context (the ISR epilogue calls `kernel::int_exit` instead), or while
/// the scheduler is locked.
pub fn reschedule() {
    if !kernel::is_running() || is_isr_context() || kernel::sched_lock_nesting() > 0 {
        return;
    }

    critical_section(|cs| {
        let sched = kernel::sched_mut(cs);
        let prio = sched.prio_table().highest();
        let Some(head) = sched.ready_queue(prio).head() else {
            return;
        };

        unsafe {
            let cur = kernel::CPU_STATE.tcb_cur;
            if cur == head.as_ptr() {
                return;
            }
            let now = kernel::tick_get();
            if let Some(cur_nn) = NonNull::new(cur) {
                if (*cur_nn.as_ptr()).state == TaskState::Running {
                    (*cur_nn.as_ptr()).state = TaskState::Ready;
                }
                (*cur_nn.as_ptr()).total_runtime = (*cur_nn.as_ptr())
                    .total_runtime
                    .wrapping_add(now.wrapping_sub((*cur_nn.as_ptr()).last_dispatch_tick));
            }
            (*head.as_ptr()).state = TaskState::Running;
            (*head.as_ptr()).run_count += 1;
            (*head.as_ptr()).last_dispatch_tick = now;
            kernel::CPU_STATE.prio_high_rdy = prio;
            kernel::CPU_STATE.tcb_high_rdy = head.as_ptr();
            crate::trace!("reschedule: switching to {} prio={}", (*head.as_ptr()).name(), prio);
            crate::port::ctx_sw();
        }
    });
}

/// Counts down the current task's time quantum and, once it runs out,
/// rotates it to the tail of its priority's ready queue so the next
/// same-priority task gets a turn. Called once per tick, from inside
/// the tick handler's critical section.
pub(crate) fn tick_round_robin(cs: &CriticalSection) {
    let Some(cur) = (unsafe { kernel::current_tcb() }) else {
        return;
    };

    let cur_ref = unsafe { &mut *cur.as_ptr() };
    if cur_ref.time_quantum == 0 {
        return;
    }
    if cur_ref.time_quantum_remaining > 0 {
        cur_ref.time_quantum_remaining -= 1;
    }
    if cur_ref.time_quantum_remaining != 0 {
        return;
    }
    cur_ref.time_quantum_remaining = cur_ref.time_quantum;

    let prio = cur_ref.effective_priority;
    let sched = kernel::sched_mut(cs);
    let q = sched.ready_queue(prio);
    if q.head() != q.tail() {
        unsafe { q.move_to_tail(cur, ready_link) };
    }
}

/// Moves a newly-woken task onto its ready queue. Used by the
/// semaphore/mutex/queue `post` paths and by the tick handler's timeout
/// wakeup.
///
/// # Safety
/// `tcb` must not already be linked into a ready queue.
pub(crate) unsafe fn add_ready(cs: &CriticalSection, tcb: NonNull<OsTcb>) {
    let sched = kernel::sched_mut(cs);
    let prio = unsafe { (*tcb.as_ptr()).effective_priority };
    unsafe { sched.ready_queue(prio).insert_tail(tcb, ready_link) };
    sched.prio_table().insert(prio);
}

/// Changes `tcb`'s effective priority, keeping its ready-queue
/// membership (if any) consistent. Used for priority inheritance: a
/// mutex owner's effective priority is boosted to the highest waiter's
/// and restored on unlock, whether or not the owner happens to be
/// sitting on a ready queue at the time.
///
/// # Safety
/// `tcb` must point to a live, currently-scheduled task.
pub(crate) unsafe fn set_effective_priority(cs: &CriticalSection, tcb: NonNull<OsTcb>, new_prio: OsPrio) {
    let old_prio = unsafe { (*tcb.as_ptr()).effective_priority };
    if old_prio == new_prio {
        return;
    }

    crate::debug!(
        "priority change: {} {} -> {}",
        unsafe { (*tcb.as_ptr()).name() },
        old_prio,
        new_prio
    );

    let state = unsafe { (*tcb.as_ptr()).state };
    if state == TaskState::Ready || state == TaskState::Running {
        let sched = kernel::sched_mut(cs);
        unsafe { sched.ready_queue(old_prio).remove(tcb, ready_link) };
        if sched.ready_queue(old_prio).is_empty() {
            sched.prio_table().remove(old_prio);
        }
        unsafe { (*tcb.as_ptr()).effective_priority = new_prio };
        unsafe { sched.ready_queue(new_prio).insert_tail(tcb, ready_link) };
        sched.prio_table().insert(new_prio);
    } else {
        unsafe { (*tcb.as_ptr()).effective_priority = new_prio };
    }
}
