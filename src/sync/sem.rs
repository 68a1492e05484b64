//! Counting semaphore.
//!
//! Waiters queue in strict FIFO order (no priority-sorted insertion:
//! that would need an O(n) scan on every pend, and nothing in this
//! kernel's invariants requires priority ordering among waiters of the
//! same object). `post` hands the token directly to the head of the
//! wait list rather than incrementing the count and letting the woken
//! task re-check — the woken task never has to race anyone else for
//! the unit it was just given.

use core::ptr::NonNull;

use crate::config::WAIT_FOREVER;
use crate::critical::{critical_section, is_isr_context, CriticalSection};
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::list::List;
use crate::sched;
use crate::task::{self, OsTcb};
use crate::types::{OsObjType, OsSemCtr, OsTick, TaskState, WaitKind, WakeReason};

pub struct OsSem {
    obj_type: OsObjType,
    wait_list: List<OsTcb>,
    count: OsSemCtr,
    max_count: OsSemCtr,
    name: &'static str,
}

impl OsSem {
    pub const fn new() -> Self {
        OsSem {
            obj_type: OsObjType::None,
            wait_list: List::new(),
            count: 0,
            max_count: OsSemCtr::MAX,
            name: "",
        }
    }

    /// Initialize/create the semaphore with an initial and maximum count.
    pub fn create(&mut self, initial: OsSemCtr, max: OsSemCtr, name: &'static str) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CalledFromIsr);
        }
        if max == 0 || initial > max {
            return Err(OsError::InvalidSize);
        }
        critical_section(|_cs| {
            self.obj_type = OsObjType::Sem;
            self.wait_list.init();
            self.count = initial;
            self.max_count = max;
            self.name = name;
        });
        Ok(())
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wait on the semaphore. `timeout` is ticks to wait, `0` for a
    /// non-blocking attempt, or `WAIT_FOREVER` to block indefinitely.
    pub fn pend(&mut self, timeout: OsTick) -> OsResult<OsSemCtr> {
        if is_isr_context() {
            return Err(OsError::CalledFromIsr);
        }
        if !kernel::is_running() {
            return Err(OsError::OsNotRunning);
        }
        if self.obj_type != OsObjType::Sem {
            return Err(OsError::ObjType);
        }

        let blocked = critical_section(|cs| -> OsResult<Option<NonNull<OsTcb>>> {
            if self.count > 0 {
                self.count -= 1;
                return Ok(None);
            }
            if timeout == 0 {
                return Err(OsError::Timeout);
            }
            if kernel::sched_lock_nesting() > 0 {
                return Err(OsError::SchedLocked);
            }

            let cur = unsafe { kernel::current_tcb() }.ok_or(OsError::Null)?;
            let prio = unsafe { (*cur.as_ptr()).effective_priority };
            let sched_state = kernel::sched_mut(cs);

            unsafe { sched_state.ready_queue(prio).remove(cur, task::ready_link) };
            if sched_state.ready_queue(prio).is_empty() {
                sched_state.prio_table().remove(prio);
            }

            unsafe {
                let t = &mut *cur.as_ptr();
                t.state = TaskState::Blocked;
                t.wait_kind = WaitKind::Semaphore;
                t.wake_reason = WakeReason::None;
                t.waiting_on = Some(NonNull::new_unchecked(self as *mut OsSem as *mut ()));
                t.unlink_waiter = Some(unlink_waiter);
            }
            unsafe { self.wait_list.insert_tail(cur, task::wait_link) };

            if timeout != WAIT_FOREVER {
                let now = kernel::tick_get();
                unsafe { sched_state.delay_insert(cur, now, timeout) };
            }

            crate::debug!("sem '{}': {} blocked", self.name, unsafe { (*cur.as_ptr()).name() });
            Ok(Some(cur))
        })?;

        let Some(cur) = blocked else {
            return Ok(self.count);
        };

        sched::reschedule();

        match unsafe { (*cur.as_ptr()).wake_reason } {
            WakeReason::DataAvailable => Ok(self.count),
            WakeReason::Timeout => Err(OsError::Timeout),
            WakeReason::Signal | WakeReason::None => Err(OsError::Null),
        }
    }

    /// Non-blocking `pend`.
    #[inline]
    pub fn try_pend(&mut self) -> OsResult<OsSemCtr> {
        self.pend(0)
    }

    /// Signal the semaphore. Hands off directly to the longest-waiting
    /// task if one exists; otherwise increments the count up to
    /// `max_count`. Safe to call from ISR context.
    pub fn post(&mut self) -> OsResult<OsSemCtr> {
        if self.obj_type != OsObjType::Sem {
            return Err(OsError::ObjType);
        }

        let result = critical_section(|cs| -> OsResult<OsSemCtr> {
            if let Some(waiter) = self.wait_list.head() {
                self.wake_one(cs, waiter);
                Ok(self.count)
            } else {
                if self.count >= self.max_count {
                    return Err(OsError::Overflow);
                }
                self.count += 1;
                Ok(self.count)
            }
        });

        sched::reschedule();
        result
    }

    fn wake_one(&mut self, cs: &CriticalSection, waiter: NonNull<OsTcb>) {
        crate::debug!("sem '{}': waking {}", self.name, unsafe { (*waiter.as_ptr()).name() });
        unsafe { self.wait_list.remove(waiter, task::wait_link) };
        let sched_state = kernel::sched_mut(cs);
        if unsafe { (*waiter.as_ptr()).delay_link.is_linked() } {
            unsafe { sched_state.delay_remove(waiter) };
        }
        unsafe {
            let t = &mut *waiter.as_ptr();
            t.waiting_on = None;
            t.unlink_waiter = None;
            t.wait_kind = WaitKind::None;
            t.wake_reason = WakeReason::DataAvailable;
            t.state = TaskState::Ready;
        }
        unsafe { sched::add_ready(cs, waiter) };
    }

    #[inline(always)]
    pub fn count(&self) -> OsSemCtr {
        self.count
    }

    pub fn set(&mut self, count: OsSemCtr) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CalledFromIsr);
        }
        if count > self.max_count {
            return Err(OsError::InvalidSize);
        }
        critical_section(|_cs| {
            self.count = count;
        });
        Ok(())
    }

    #[inline]
    pub fn has_waiting_tasks(&self) -> bool {
        !self.wait_list.is_empty()
    }

    /// Releases every waiter with `WakeReason::Signal` and marks the
    /// semaphore unusable. The caller is responsible for returning the
    /// control block to its pool afterwards.
    pub fn delete(&mut self) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CalledFromIsr);
        }

        critical_section(|cs| {
            while let Some(waiter) = self.wait_list.head() {
                unsafe { self.wait_list.remove(waiter, task::wait_link) };
                let sched_state = kernel::sched_mut(cs);
                if unsafe { (*waiter.as_ptr()).delay_link.is_linked() } {
                    unsafe { sched_state.delay_remove(waiter) };
                }
                unsafe {
                    let t = &mut *waiter.as_ptr();
                    t.waiting_on = None;
                    t.unlink_waiter = None;
                    t.wait_kind = WaitKind::None;
                    t.wake_reason = WakeReason::Signal;
                    t.state = TaskState::Ready;
                }
                unsafe { sched::add_ready(cs, waiter) };
            }
            self.obj_type = OsObjType::None;
        });

        sched::reschedule();
        Ok(())
    }
}

impl Default for OsSem {
    fn default() -> Self {
        Self::new()
    }
}

/// # Safety
/// `obj` must point to a live `OsSem` and `tcb` must be a member of its
/// wait list.
unsafe fn unlink_waiter(obj: NonNull<()>, tcb: NonNull<OsTcb>) {
    let sem = obj.cast::<OsSem>();
    unsafe { (*sem.as_ptr()).wait_list.remove(tcb, task::wait_link) };
}

// ============ Free-function facade ============
//
// Pool-backed handles, mirroring `task_create`/`task_delete`: each call
// combines a pool allocation with the object's own `create`/`delete`.
// Prefer these from application code reaching for a dynamically-sized
// set of semaphores; use `Semaphore` directly for one embedded in a
// `static`.

pub fn sem_create(initial: OsSemCtr, max: OsSemCtr, name: &'static str) -> OsResult<NonNull<OsSem>> {
    let sem = crate::resources::alloc_sem()?;
    if let Err(e) = unsafe { (*sem.as_ptr()).create(initial, max, name) } {
        unsafe {
            let _ = crate::resources::free_sem(sem);
        }
        return Err(e);
    }
    Ok(sem)
}

/// # Safety
/// `h` must have come from `sem_create` and not already be deleted.
pub unsafe fn sem_delete(h: NonNull<OsSem>) -> OsResult<()> {
    unsafe {
        (*h.as_ptr()).delete()?;
        crate::resources::free_sem(h)
    }
}

/// # Safety
/// `h` must be a live handle from `sem_create`.
pub unsafe fn sem_wait(h: NonNull<OsSem>, timeout: OsTick) -> OsResult<OsSemCtr> {
    unsafe { (*h.as_ptr()).pend(timeout) }
}

/// # Safety
/// `h` must be a live handle from `sem_create`.
pub unsafe fn sem_try_wait(h: NonNull<OsSem>) -> OsResult<OsSemCtr> {
    unsafe { (*h.as_ptr()).try_pend() }
}

/// # Safety
/// `h` must be a live handle from `sem_create`.
pub unsafe fn sem_post(h: NonNull<OsSem>) -> OsResult<OsSemCtr> {
    unsafe { (*h.as_ptr()).post() }
}

/// # Safety
/// `h` must be a live handle from `sem_create`.
pub unsafe fn sem_get_count(h: NonNull<OsSem>) -> OsSemCtr {
    unsafe { (*h.as_ptr()).count() }
}

/// # Safety
/// `h` must be a live handle from `sem_create`.
pub unsafe fn sem_has_waiting_tasks(h: NonNull<OsSem>) -> bool {
    unsafe { (*h.as_ptr()).has_waiting_tasks() }
}

// ============ Safe wrapper ============

use core::cell::UnsafeCell;

/// Static-friendly handle: create once with `Semaphore::new`, `create`
/// it during `kernel_init`, then `wait`/`signal` from any task.
pub struct Semaphore {
    inner: UnsafeCell<OsSem>,
}

unsafe impl Sync for Semaphore {}
unsafe impl Send for Semaphore {}

impl Semaphore {
    pub const fn new() -> Self {
        Semaphore {
            inner: UnsafeCell::new(OsSem::new()),
        }
    }

    pub fn create(&self, initial: OsSemCtr, max: OsSemCtr, name: &'static str) -> OsResult<()> {
        unsafe { (*self.inner.get()).create(initial, max, name) }
    }

    pub fn wait(&self, timeout: OsTick) -> OsResult<OsSemCtr> {
        unsafe { (*self.inner.get()).pend(timeout) }
    }

    pub fn try_wait(&self) -> OsResult<OsSemCtr> {
        unsafe { (*self.inner.get()).try_pend() }
    }

    pub fn signal(&self) -> OsResult<OsSemCtr> {
        unsafe { (*self.inner.get()).post() }
    }

    #[inline]
    pub fn count(&self) -> OsSemCtr {
        unsafe { (*self.inner.get()).count() }
    }

    #[inline]
    pub fn has_waiting_tasks(&self) -> bool {
        unsafe { (*self.inner.get()).has_waiting_tasks() }
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}
