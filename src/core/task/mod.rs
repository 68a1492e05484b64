//! Task lifecycle: create, delete, delay, yield, suspend/resume.
//!
//! Every operation here either runs entirely inside one critical section
//! or brackets pool allocation (which takes no lock of its own) with one.
//! None of it decides *who* runs next; that's `sched::reschedule`'s job,
//! called at the tail of every state-changing call below.

pub(crate) mod tcb;

pub use tcb::OsTcb;
pub(crate) use tcb::{delay_link, ready_link, wait_link, wake_tick_of};

use core::ptr::NonNull;

use super::config::CFG_PRIO_IDLE;
use super::critical::{critical_section, is_isr_context, CriticalSection};
use super::error::{OsError, OsResult};
use super::kernel;
use super::resources;
use super::sched;
use super::types::{OsPrio, OsTick, TaskState, WaitKind, WakeReason};

/// Task entry point: receives the argument passed to `task_create` and
/// never returns.
pub type OsTaskFn = fn(*mut ()) -> !;

/// Allocates a TCB and a stack from the pools and leaves the task ready
/// to be placed on a ready queue. Touches no scheduler list itself, so
/// it's safe to call either from inside an existing critical section
/// (idle task creation) or standalone (ordinary task creation, which
/// opens its own further down).
fn init_tcb_and_stack(
    name: &str,
    task_fn: OsTaskFn,
    arg: *mut (),
    prio: OsPrio,
    stk_size_words: usize,
    time_quantum: OsTick,
) -> OsResult<NonNull<OsTcb>> {
    let tcb = match resources::alloc_tcb() {
        Ok(tcb) => tcb,
        Err(_) => {
            crate::warn!("task_create: TCB pool exhausted");
            return Err(OsError::TaskCreateFailed);
        }
    };

    let (stk_base, stk_size) = match resources::alloc_stack(stk_size_words) {
        Ok(v) => v,
        Err(e) => {
            crate::warn!("task_create: stack pool exhausted, requested {} words", stk_size_words);
            unsafe {
                let _ = resources::free_tcb(tcb);
            }
            return Err(e);
        }
    };

    let stk_ptr = unsafe { crate::port::task_stk_init(task_fn, arg, stk_base, stk_size) };

    unsafe {
        let t = &mut *tcb.as_ptr();
        t.name.set(name);
        t.base_priority = prio;
        t.effective_priority = prio;
        t.state = TaskState::Ready;
        t.stk_ptr = stk_ptr;
        t.stk_base = stk_base;
        t.stk_size = stk_size;
        t.time_quantum = time_quantum;
        t.time_quantum_remaining = time_quantum;
        t.entry_addr = task_fn as usize as u32;
        t.entry_arg = arg;
    }

    Ok(tcb)
}

/// Creates the idle task. Called once, by `kernel_init`, from inside the
/// critical section it already holds — there is no second lock to take
/// here.
pub(crate) fn create_idle_task(cs: &CriticalSection) -> OsResult<()> {
    let tcb = init_tcb_and_stack(
        "idle",
        super::kernel::idle_task_body,
        core::ptr::null_mut(),
        CFG_PRIO_IDLE,
        super::config::STACK_SMALL_WORDS,
        0,
    )?;

    let sched = kernel::sched_mut(cs);
    unsafe { sched.ready_queue(CFG_PRIO_IDLE).insert_tail(tcb, ready_link) };
    sched.prio_table().insert(CFG_PRIO_IDLE);
    Ok(())
}

/// Create an application task and make it ready to run. Safe to call
/// before `kernel_start`; once the kernel is running, a task created at
/// a higher priority than the caller preempts immediately.
pub fn task_create(
    name: &str,
    task_fn: OsTaskFn,
    arg: *mut (),
    prio: OsPrio,
    stk_size_words: usize,
) -> OsResult<NonNull<OsTcb>> {
    if is_isr_context() {
        return Err(OsError::CalledFromIsr);
    }
    if prio >= CFG_PRIO_IDLE {
        return Err(OsError::PrioInvalid);
    }

    let tcb = init_tcb_and_stack(
        name,
        task_fn,
        arg,
        prio,
        stk_size_words,
        super::config::CFG_TIME_QUANTA_DEFAULT,
    )?;

    critical_section(|cs| {
        let sched = kernel::sched_mut(cs);
        unsafe { sched.ready_queue(prio).insert_tail(tcb, ready_link) };
        sched.prio_table().insert(prio);
    });

    crate::info!("task_create: {} prio={}", name, prio);

    if kernel::is_running() {
        sched::reschedule();
    }
    Ok(tcb)
}

/// Returns the handle of the currently running task, or `None` before
/// `kernel_start`.
pub fn task_get_current() -> Option<NonNull<OsTcb>> {
    unsafe { kernel::current_tcb() }
}

/// Splices `target` out of whatever it's linked into: its ready queue,
/// or the object/delay lists it's blocked on. Leaves `target.state`
/// untouched; the caller sets the final state.
unsafe fn unlink_everywhere(sched: &mut kernel::SchedState, target: NonNull<OsTcb>) {
    let prio = unsafe { (*target.as_ptr()).effective_priority };
    let state = unsafe { (*target.as_ptr()).state };

    match state {
        TaskState::Ready | TaskState::Running => {
            unsafe { sched.ready_queue(prio).remove(target, ready_link) };
            if sched.ready_queue(prio).is_empty() {
                sched.prio_table().remove(prio);
            }
        }
        TaskState::Blocked => {
            let (waiting_on, unlink) =
                unsafe { ((*target.as_ptr()).waiting_on, (*target.as_ptr()).unlink_waiter) };
            if let (Some(obj), Some(unlink)) = (waiting_on, unlink) {
                unsafe { unlink(obj, target) };
            }
            if unsafe { (*target.as_ptr()).delay_link.is_linked() } {
                unsafe { sched.delay_remove(target) };
            }
        }
        TaskState::Suspended | TaskState::Deleted => {}
    }
}

/// Delete a task, or the calling task itself when `target` is `None`. A
/// task that deletes itself keeps running until the next reschedule;
/// its TCB and stack are only freed once it's no longer the one
/// executing, by the idle task's cleanup pass.
pub fn task_delete(target: Option<NonNull<OsTcb>>) -> OsResult<()> {
    if !kernel::is_running() {
        return Err(OsError::OsNotRunning);
    }
    if is_isr_context() {
        return Err(OsError::CalledFromIsr);
    }

    critical_section(|cs| {
        let target = match target {
            Some(p) => p,
            None => unsafe { kernel::current_tcb() }.ok_or(OsError::Null)?,
        };

        let prio = unsafe { (*target.as_ptr()).effective_priority };
        if prio == CFG_PRIO_IDLE {
            return Err(OsError::TaskDelIdle);
        }

        let is_current = unsafe { kernel::current_tcb() } == Some(target);
        crate::info!("task_delete: {}", unsafe { (*target.as_ptr()).name() });
        let sched = kernel::sched_mut(cs);
        unsafe { unlink_everywhere(sched, target) };
        unsafe { (*target.as_ptr()).state = TaskState::Deleted };

        if is_current {
            unsafe { sched.pending_cleanup.insert_tail(target, ready_link) };
        } else {
            unsafe {
                let stk_base = (*target.as_ptr()).stk_base;
                let stk_size = (*target.as_ptr()).stk_size;
                let _ = resources::free_stack(stk_base, stk_size);
                let _ = resources::free_tcb(target);
            }
        }

        Ok(())
    })?;

    sched::reschedule();
    Ok(())
}

/// Block the calling task for `ticks` system ticks. A delay of zero is
/// a plain yield.
pub fn task_delay(ticks: OsTick) -> OsResult<()> {
    if !kernel::is_running() {
        return Err(OsError::OsNotRunning);
    }
    if is_isr_context() {
        return Err(OsError::CalledFromIsr);
    }
    if ticks == 0 {
        return task_yield();
    }

    critical_section(|cs| {
        let Some(cur) = (unsafe { kernel::current_tcb() }) else {
            return;
        };
        let prio = unsafe { (*cur.as_ptr()).effective_priority };
        let sched = kernel::sched_mut(cs);

        unsafe { sched.ready_queue(prio).remove(cur, ready_link) };
        if sched.ready_queue(prio).is_empty() {
            sched.prio_table().remove(prio);
        }

        unsafe {
            (*cur.as_ptr()).state = TaskState::Blocked;
            (*cur.as_ptr()).wait_kind = WaitKind::None;
            (*cur.as_ptr()).wake_reason = WakeReason::None;
        }

        let now = kernel::tick_get();
        unsafe { sched.delay_insert(cur, now, ticks) };
    });

    sched::reschedule();
    Ok(())
}

/// Give up the remainder of the current time quantum to any other
/// ready task at the same priority.
pub fn task_yield() -> OsResult<()> {
    if !kernel::is_running() {
        return Err(OsError::OsNotRunning);
    }
    if is_isr_context() {
        return Err(OsError::CalledFromIsr);
    }

    critical_section(|cs| {
        let Some(cur) = (unsafe { kernel::current_tcb() }) else {
            return;
        };
        let prio = unsafe { (*cur.as_ptr()).effective_priority };
        let sched = kernel::sched_mut(cs);
        let q = sched.ready_queue(prio);
        if q.head() != q.tail() {
            unsafe { q.move_to_tail(cur, ready_link) };
        }
    });

    sched::reschedule();
    Ok(())
}

/// Suspend a task (or the caller, when `target` is `None`). Nests: a
/// task suspended twice needs two matching `task_resume` calls before
/// it becomes ready again. Only supported for a task currently on a
/// ready queue — one already blocked on a sync object would need its
/// wait condition and suspend count tracked independently, which this
/// kernel does not do.
pub fn task_suspend(target: Option<NonNull<OsTcb>>) -> OsResult<()> {
    if !kernel::is_running() {
        return Err(OsError::OsNotRunning);
    }
    if is_isr_context() {
        return Err(OsError::CalledFromIsr);
    }

    critical_section(|cs| {
        let target = match target {
            Some(p) => p,
            None => unsafe { kernel::current_tcb() }.ok_or(OsError::Null)?,
        };

        let prio = unsafe { (*target.as_ptr()).effective_priority };
        if prio == CFG_PRIO_IDLE {
            return Err(OsError::TaskDelIdle);
        }

        let state = unsafe { (*target.as_ptr()).state };
        if state == TaskState::Blocked {
            return Err(OsError::TaskBlockedUnsupported);
        }

        let t = unsafe { &mut *target.as_ptr() };
        t.suspend_count = t.suspend_count.saturating_add(1);
        if t.suspend_count == 1 && (state == TaskState::Ready || state == TaskState::Running) {
            let sched = kernel::sched_mut(cs);
            unsafe { sched.ready_queue(prio).remove(target, ready_link) };
            if sched.ready_queue(prio).is_empty() {
                sched.prio_table().remove(prio);
            }
            t.state = TaskState::Suspended;
        }
        Ok(())
    })?;

    sched::reschedule();
    Ok(())
}

/// Resume a suspended task. Returns `TaskNotSuspended` if the suspend
/// count is already zero.
pub fn task_resume(target: NonNull<OsTcb>) -> OsResult<()> {
    if !kernel::is_running() {
        return Err(OsError::OsNotRunning);
    }
    if is_isr_context() {
        return Err(OsError::CalledFromIsr);
    }

    critical_section(|cs| {
        let t = unsafe { &mut *target.as_ptr() };
        if t.suspend_count == 0 {
            return Err(OsError::TaskNotSuspended);
        }
        t.suspend_count -= 1;
        if t.suspend_count == 0 {
            t.state = TaskState::Ready;
            let prio = t.effective_priority;
            let sched = kernel::sched_mut(cs);
            unsafe { sched.ready_queue(prio).insert_tail(target, ready_link) };
            sched.prio_table().insert(prio);
        }
        Ok(())
    })?;

    sched::reschedule();
    Ok(())
}
