//! Mutex with priority inheritance.
//!
//! Non-recursive: relocking from the owning task returns
//! `OsError::Recursive` rather than nesting, since nothing in this
//! kernel needs recursive locking and tracking a nesting counter on top
//! of ownership is one more piece of state to get wrong. A contended
//! lock boosts the owner's effective priority to the highest waiter's,
//! so a low-priority owner can't be preempted indefinitely by
//! medium-priority tasks while a high-priority task waits on it.

use core::ptr::NonNull;

use crate::config::WAIT_FOREVER;
use crate::critical::{critical_section, is_isr_context};
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::list::List;
use crate::sched;
use crate::task::{self, OsTcb};
use crate::types::{OsObjType, OsPrio, OsTick, TaskState, WaitKind, WakeReason};

pub struct OsMutex {
    obj_type: OsObjType,
    wait_list: List<OsTcb>,
    owner: Option<NonNull<OsTcb>>,
    name: &'static str,
}

impl OsMutex {
    pub const fn new() -> Self {
        OsMutex {
            obj_type: OsObjType::None,
            wait_list: List::new(),
            owner: None,
            name: "",
        }
    }

    pub fn create(&mut self, name: &'static str) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CalledFromIsr);
        }
        critical_section(|_cs| {
            self.obj_type = OsObjType::Mutex;
            self.wait_list.init();
            self.owner = None;
            self.name = name;
        });
        Ok(())
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.owner.is_some()
    }

    /// Acquire the mutex. `timeout` is ticks to wait, `0` for a
    /// non-blocking attempt, or `WAIT_FOREVER` to block indefinitely.
    /// Boosts the current owner's effective priority if the caller's
    /// base priority is higher.
    pub fn pend(&mut self, timeout: OsTick) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CalledFromIsr);
        }
        if !kernel::is_running() {
            return Err(OsError::OsNotRunning);
        }
        if self.obj_type != OsObjType::Mutex {
            return Err(OsError::ObjType);
        }

        let blocked = critical_section(|cs| -> OsResult<Option<NonNull<OsTcb>>> {
            let cur = unsafe { kernel::current_tcb() }.ok_or(OsError::Null)?;

            if let Some(owner) = self.owner {
                if owner == cur {
                    return Err(OsError::Recursive);
                }
            } else {
                self.owner = Some(cur);
                return Ok(None);
            }

            if timeout == 0 {
                return Err(OsError::Timeout);
            }
            if kernel::sched_lock_nesting() > 0 {
                return Err(OsError::SchedLocked);
            }

            let cur_prio = unsafe { (*cur.as_ptr()).base_priority };
            let owner = self.owner.unwrap();
            let owner_eff = unsafe { (*owner.as_ptr()).effective_priority };
            if cur_prio < owner_eff {
                crate::info!(
                    "mutex '{}': boosting owner {} for waiter {}",
                    self.name,
                    unsafe { (*owner.as_ptr()).name() },
                    unsafe { (*cur.as_ptr()).name() }
                );
                unsafe { sched::set_effective_priority(cs, owner, cur_prio) };
            }

            let prio = unsafe { (*cur.as_ptr()).effective_priority };
            let sched_state = kernel::sched_mut(cs);
            unsafe { sched_state.ready_queue(prio).remove(cur, task::ready_link) };
            if sched_state.ready_queue(prio).is_empty() {
                sched_state.prio_table().remove(prio);
            }

            unsafe {
                let t = &mut *cur.as_ptr();
                t.state = TaskState::Blocked;
                t.wait_kind = WaitKind::Mutex;
                t.wake_reason = WakeReason::None;
                t.waiting_on = Some(NonNull::new_unchecked(self as *mut OsMutex as *mut ()));
                t.unlink_waiter = Some(unlink_waiter);
            }
            unsafe { self.wait_list.insert_tail(cur, task::wait_link) };

            if timeout != WAIT_FOREVER {
                let now = kernel::tick_get();
                unsafe { sched_state.delay_insert(cur, now, timeout) };
            }

            crate::debug!("mutex '{}': {} blocked", self.name, unsafe { (*cur.as_ptr()).name() });
            Ok(Some(cur))
        })?;

        let Some(cur) = blocked else {
            return Ok(());
        };

        sched::reschedule();

        match unsafe { (*cur.as_ptr()).wake_reason } {
            WakeReason::DataAvailable => Ok(()),
            WakeReason::Timeout => Err(OsError::Timeout),
            WakeReason::Signal | WakeReason::None => Err(OsError::Null),
        }
    }

    /// Release the mutex. Restores the caller's base priority if it had
    /// been boosted, then hands ownership directly to the longest-waiting
    /// task, if any.
    pub fn post(&mut self) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CalledFromIsr);
        }
        if self.obj_type != OsObjType::Mutex {
            return Err(OsError::ObjType);
        }

        critical_section(|cs| -> OsResult<()> {
            let cur = unsafe { kernel::current_tcb() }.ok_or(OsError::Null)?;
            if self.owner != Some(cur) {
                return Err(OsError::NotOwner);
            }

            let base = unsafe { (*cur.as_ptr()).base_priority };
            let eff = unsafe { (*cur.as_ptr()).effective_priority };
            if eff != base {
                unsafe { sched::set_effective_priority(cs, cur, base) };
            }

            if let Some(waiter) = self.wait_list.head() {
                crate::debug!("mutex '{}': handing off to {}", self.name, unsafe { (*waiter.as_ptr()).name() });
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
                self.owner = Some(waiter);
                unsafe { sched::add_ready(cs, waiter) };
            } else {
                self.owner = None;
            }

            Ok(())
        })?;

        sched::reschedule();
        Ok(())
    }

    /// Non-blocking `pend`.
    #[inline]
    pub fn try_pend(&mut self) -> OsResult<()> {
        self.pend(0)
    }

    /// Handle of the current owner, if locked.
    #[inline]
    pub fn owner(&self) -> Option<NonNull<OsTcb>> {
        self.owner
    }

    /// Effective priority of the current owner, if locked.
    pub fn owner_priority(&self) -> Option<OsPrio> {
        self.owner
            .map(|ptr| unsafe { (*ptr.as_ptr()).effective_priority })
    }

    #[inline]
    pub fn has_waiting_tasks(&self) -> bool {
        !self.wait_list.is_empty()
    }

    /// Releases every waiter with `WakeReason::Signal`, restores the
    /// owner's priority if boosted, and marks the mutex unusable. The
    /// caller is responsible for returning the control block to its pool
    /// afterwards.
    pub fn delete(&mut self) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CalledFromIsr);
        }

        critical_section(|cs| {
            if let Some(owner) = self.owner {
                let base = unsafe { (*owner.as_ptr()).base_priority };
                let eff = unsafe { (*owner.as_ptr()).effective_priority };
                if eff != base {
                    unsafe { sched::set_effective_priority(cs, owner, base) };
                }
            }

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
            self.owner = None;
            self.obj_type = OsObjType::None;
        });

        sched::reschedule();
        Ok(())
    }
}

impl Default for OsMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// # Safety
/// `obj` must point to a live `OsMutex` and `tcb` must be a member of
/// its wait list.
unsafe fn unlink_waiter(obj: NonNull<()>, tcb: NonNull<OsTcb>) {
    let mutex = obj.cast::<OsMutex>();
    unsafe { (*mutex.as_ptr()).wait_list.remove(tcb, task::wait_link) };
}

// ============ Free-function facade ============
//
// Pool-backed handles, mirroring `task_create`/`task_delete`. See
// `sem_create` for the rationale.

pub fn mutex_create(name: &'static str) -> OsResult<NonNull<OsMutex>> {
    let mtx = crate::resources::alloc_mutex()?;
    if let Err(e) = unsafe { (*mtx.as_ptr()).create(name) } {
        unsafe {
            let _ = crate::resources::free_mutex(mtx);
        }
        return Err(e);
    }
    Ok(mtx)
}

/// # Safety
/// `h` must have come from `mutex_create` and not already be deleted.
pub unsafe fn mutex_delete(h: NonNull<OsMutex>) -> OsResult<()> {
    unsafe {
        (*h.as_ptr()).delete()?;
        crate::resources::free_mutex(h)
    }
}

/// # Safety
/// `h` must be a live handle from `mutex_create`.
pub unsafe fn mutex_lock(h: NonNull<OsMutex>, timeout: OsTick) -> OsResult<()> {
    unsafe { (*h.as_ptr()).pend(timeout) }
}

/// # Safety
/// `h` must be a live handle from `mutex_create`.
pub unsafe fn mutex_try_lock(h: NonNull<OsMutex>) -> OsResult<()> {
    unsafe { (*h.as_ptr()).try_pend() }
}

/// # Safety
/// `h` must be a live handle from `mutex_create`.
pub unsafe fn mutex_unlock(h: NonNull<OsMutex>) -> OsResult<()> {
    unsafe { (*h.as_ptr()).post() }
}

/// # Safety
/// `h` must be a live handle from `mutex_create`.
pub unsafe fn mutex_get_owner(h: NonNull<OsMutex>) -> Option<NonNull<OsTcb>> {
    unsafe { (*h.as_ptr()).owner() }
}

/// # Safety
/// `h` must be a live handle from `mutex_create`.
pub unsafe fn mutex_is_locked(h: NonNull<OsMutex>) -> bool {
    unsafe { (*h.as_ptr()).is_locked() }
}

/// # Safety
/// `h` must be a live handle from `mutex_create`.
pub unsafe fn mutex_has_waiting_tasks(h: NonNull<OsMutex>) -> bool {
    unsafe { (*h.as_ptr()).has_waiting_tasks() }
}

// ============ Safe wrapper ============

use core::cell::UnsafeCell;

pub struct Mutex {
    inner: UnsafeCell<OsMutex>,
}

unsafe impl Sync for Mutex {}
unsafe impl Send for Mutex {}

impl Mutex {
    pub const fn new() -> Self {
        Mutex {
            inner: UnsafeCell::new(OsMutex::new()),
        }
    }

    pub fn create(&self, name: &'static str) -> OsResult<()> {
        unsafe { (*self.inner.get()).create(name) }
    }

    pub fn lock(&self, timeout: OsTick) -> OsResult<()> {
        unsafe { (*self.inner.get()).pend(timeout) }
    }

    pub fn try_lock(&self) -> OsResult<()> {
        unsafe { (*self.inner.get()).try_pend() }
    }

    pub fn unlock(&self) -> OsResult<()> {
        unsafe { (*self.inner.get()).post() }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        unsafe { (*self.inner.get()).is_locked() }
    }

    #[inline]
    pub fn owner(&self) -> Option<NonNull<OsTcb>> {
        unsafe { (*self.inner.get()).owner() }
    }

    #[inline]
    pub fn has_waiting_tasks(&self) -> bool {
        unsafe { (*self.inner.get()).has_waiting_tasks() }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
