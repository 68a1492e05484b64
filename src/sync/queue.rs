//! Fixed-capacity message queue.
//!
//! Backed by a pool-allocated [`CircularBuffer`](crate::circbuf::CircularBuffer).
//! Senders and receivers block on two independent FIFO lists (a task is
//! never on both at once, so they share the TCB's single `wait_link`
//! field same as every other synchronization object). Unlike the
//! semaphore/mutex hand-off, a woken sender or receiver re-attempts its
//! operation against the buffer itself rather than having the waker
//! transfer bytes on its behalf — simpler, and the buffer is the only
//! state that needs to agree.

use core::ptr::NonNull;

use crate::circbuf::CircularBuffer;
use crate::config::WAIT_FOREVER;
use crate::critical::{critical_section, is_isr_context};
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::list::List;
use crate::resources;
use crate::sched;
use crate::task::{self, OsTcb};
use crate::timeutil::ticks_until;
use crate::types::{OsObjType, OsTick, TaskState, WaitKind, WakeReason};

pub struct OsQueue {
    obj_type: OsObjType,
    buffer: CircularBuffer,
    buf_base: *mut u8,
    buf_bytes: usize,
    waiting_senders: List<OsTcb>,
    waiting_receivers: List<OsTcb>,
    name: &'static str,
}

impl OsQueue {
    pub const fn new() -> Self {
        OsQueue {
            obj_type: OsObjType::None,
            buffer: CircularBuffer::empty(),
            buf_base: core::ptr::null_mut(),
            buf_bytes: 0,
            waiting_senders: List::new(),
            waiting_receivers: List::new(),
            name: "",
        }
    }

    /// Reserve backing storage for `capacity` items of `element_size`
    /// bytes each and initialize the queue. `capacity` is rounded up to
    /// a power of two by the circular buffer.
    pub fn create(&mut self, capacity: usize, element_size: usize, name: &'static str) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CalledFromIsr);
        }
        let rounded = capacity.next_power_of_two();
        let (base, bytes) = resources::alloc_buffer(rounded * element_size)?;

        critical_section(|_cs| -> OsResult<()> {
            self.buffer.init(base, rounded, element_size)?;
            self.buf_base = base;
            self.buf_bytes = bytes;
            self.waiting_senders.init();
            self.waiting_receivers.init();
            self.obj_type = OsObjType::Queue;
            self.name = name;
            Ok(())
        })
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    #[inline]
    pub fn messages_waiting(&self) -> usize {
        self.buffer.size()
    }

    /// Copy `element_size` bytes from `item` into the queue, blocking up
    /// to `timeout` ticks if full (`0` = non-blocking, `WAIT_FOREVER` =
    /// block indefinitely).
    ///
    /// # Safety
    /// `item` must point to at least the queue's `element_size` readable
    /// bytes.
    pub unsafe fn send(&mut self, item: *const u8, timeout: OsTick) -> OsResult<()> {
        self.transfer(timeout, WaitKind::QueueSend, |q| unsafe { q.buffer.put(item) })
    }

    /// Copy the oldest queued item's bytes into `out`, blocking up to
    /// `timeout` ticks if empty.
    ///
    /// # Safety
    /// `out` must point to at least the queue's `element_size` writable
    /// bytes.
    pub unsafe fn receive(&mut self, out: *mut u8, timeout: OsTick) -> OsResult<()> {
        self.transfer(timeout, WaitKind::QueueReceive, |q| unsafe { q.buffer.get(out) })
    }

    /// Non-blocking `send`.
    ///
    /// # Safety
    /// Same requirement as `send`.
    #[inline]
    pub unsafe fn send_immediate(&mut self, item: *const u8) -> OsResult<()> {
        unsafe { self.send(item, 0) }
    }

    /// Non-blocking `receive`.
    ///
    /// # Safety
    /// Same requirement as `receive`.
    #[inline]
    pub unsafe fn receive_immediate(&mut self, out: *mut u8) -> OsResult<()> {
        unsafe { self.receive(out, 0) }
    }

    /// Releases every waiter (on both lists) with `WakeReason::Signal`,
    /// marks the queue unusable, and returns its buffer to the pool. The
    /// caller is still responsible for returning the control block itself
    /// to its pool afterwards.
    pub fn delete(&mut self) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CalledFromIsr);
        }

        critical_section(|cs| {
            for kind in [WaitKind::QueueSend, WaitKind::QueueReceive] {
                let list = self.list_for_mut(kind);
                while let Some(waiter) = list.head() {
                    unsafe { list.remove(waiter, task::wait_link) };
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
            }
            self.obj_type = OsObjType::None;
        });

        sched::reschedule();

        let base = self.buffer.deinit();
        let bytes = self.buf_bytes;
        self.buf_base = core::ptr::null_mut();
        self.buf_bytes = 0;
        unsafe { resources::free_buffer(base, bytes) }
    }

    fn transfer(
        &mut self,
        timeout: OsTick,
        kind: WaitKind,
        mut attempt: impl FnMut(&mut Self) -> OsResult<()>,
    ) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CalledFromIsr);
        }
        if !kernel::is_running() {
            return Err(OsError::OsNotRunning);
        }
        if self.obj_type != OsObjType::Queue {
            return Err(OsError::ObjType);
        }

        let deadline = (timeout != WAIT_FOREVER).then(|| kernel::tick_get().wrapping_add(timeout));
        let mut remaining = timeout;

        loop {
            let blocked = critical_section(|cs| -> OsResult<Option<NonNull<OsTcb>>> {
                match attempt(self) {
                    Ok(()) => {
                        self.wake_opposite(cs, kind);
                        return Ok(None);
                    }
                    Err(e @ (OsError::Full | OsError::Empty)) => {
                        if remaining == 0 {
                            return Err(e);
                        }
                    }
                    Err(e) => return Err(e),
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
                    t.wait_kind = kind;
                    t.wake_reason = WakeReason::None;
                    t.waiting_on = Some(NonNull::new_unchecked(self as *mut OsQueue as *mut ()));
                    t.unlink_waiter = Some(unlink_waiter);
                }
                self.list_for_mut(kind).insert_tail(cur, task::wait_link);

                if remaining != WAIT_FOREVER {
                    let now = kernel::tick_get();
                    unsafe { sched_state.delay_insert(cur, now, remaining) };
                }

                crate::debug!("queue '{}': {} blocked", self.name, unsafe { (*cur.as_ptr()).name() });
                Ok(Some(cur))
            })?;

            let Some(cur) = blocked else {
                return Ok(());
            };

            sched::reschedule();

            match unsafe { (*cur.as_ptr()).wake_reason } {
                WakeReason::DataAvailable => {
                    if let Some(d) = deadline {
                        remaining = ticks_until(d, kernel::tick_get());
                    }
                    continue;
                }
                WakeReason::Timeout => return Err(OsError::Timeout),
                WakeReason::Signal | WakeReason::None => return Err(OsError::Null),
            }
        }
    }

    fn list_for_mut(&mut self, kind: WaitKind) -> &mut List<OsTcb> {
        match kind {
            WaitKind::QueueSend => &mut self.waiting_senders,
            _ => &mut self.waiting_receivers,
        }
    }

    /// After a successful `send`, wake one blocked receiver (if any); after
    /// a successful `receive`, wake one blocked sender. The woken task
    /// re-attempts its own operation once scheduled again.
    fn wake_opposite(&mut self, cs: &crate::critical::CriticalSection, kind: WaitKind) {
        let opposite = match kind {
            WaitKind::QueueSend => &mut self.waiting_receivers,
            _ => &mut self.waiting_senders,
        };
        let Some(waiter) = opposite.head() else {
            return;
        };
        crate::debug!("queue '{}': waking {}", self.name, unsafe { (*waiter.as_ptr()).name() });
        unsafe { opposite.remove(waiter, task::wait_link) };
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
}

impl Default for OsQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// # Safety
/// `obj` must point to a live `OsQueue` and `tcb` must be a member of
/// one of its wait lists.
unsafe fn unlink_waiter(obj: NonNull<()>, tcb: NonNull<OsTcb>) {
    let q = obj.cast::<OsQueue>();
    unsafe {
        let q = &mut *q.as_ptr();
        if (*tcb.as_ptr()).wait_kind == WaitKind::QueueSend {
            q.waiting_senders.remove(tcb, task::wait_link);
        } else {
            q.waiting_receivers.remove(tcb, task::wait_link);
        }
    }
}

// ============ Free-function facade ============
//
// Pool-backed handles, mirroring `task_create`/`task_delete`. See
// `sem_create` for the rationale.

pub fn queue_create(length: usize, item_size: usize, name: &'static str) -> OsResult<NonNull<OsQueue>> {
    let q = resources::alloc_queue()?;
    if let Err(e) = unsafe { (*q.as_ptr()).create(length, item_size, name) } {
        unsafe {
            let _ = resources::free_queue(q);
        }
        return Err(e);
    }
    Ok(q)
}

/// # Safety
/// `h` must have come from `queue_create` and not already be deleted.
pub unsafe fn queue_delete(h: NonNull<OsQueue>) -> OsResult<()> {
    unsafe {
        (*h.as_ptr()).delete()?;
        resources::free_queue(h)
    }
}

/// # Safety
/// `h` must be a live handle from `queue_create`; `item` must point to
/// at least the queue's `element_size` readable bytes.
pub unsafe fn queue_send(h: NonNull<OsQueue>, item: *const u8, timeout: OsTick) -> OsResult<()> {
    unsafe { (*h.as_ptr()).send(item, timeout) }
}

/// # Safety
/// `h` must be a live handle from `queue_create`; `out` must point to
/// at least the queue's `element_size` writable bytes.
pub unsafe fn queue_receive(h: NonNull<OsQueue>, out: *mut u8, timeout: OsTick) -> OsResult<()> {
    unsafe { (*h.as_ptr()).receive(out, timeout) }
}

/// # Safety
/// Same requirement as `queue_send`.
pub unsafe fn queue_send_immediate(h: NonNull<OsQueue>, item: *const u8) -> OsResult<()> {
    unsafe { (*h.as_ptr()).send_immediate(item) }
}

/// # Safety
/// Same requirement as `queue_receive`.
pub unsafe fn queue_receive_immediate(h: NonNull<OsQueue>, out: *mut u8) -> OsResult<()> {
    unsafe { (*h.as_ptr()).receive_immediate(out) }
}

/// # Safety
/// `h` must be a live handle from `queue_create`.
pub unsafe fn queue_is_empty(h: NonNull<OsQueue>) -> bool {
    unsafe { (*h.as_ptr()).is_empty() }
}

/// # Safety
/// `h` must be a live handle from `queue_create`.
pub unsafe fn queue_is_full(h: NonNull<OsQueue>) -> bool {
    unsafe { (*h.as_ptr()).is_full() }
}

/// # Safety
/// `h` must be a live handle from `queue_create`.
pub unsafe fn queue_messages_waiting(h: NonNull<OsQueue>) -> usize {
    unsafe { (*h.as_ptr()).messages_waiting() }
}

// ============ Safe wrapper ============

use core::cell::UnsafeCell;
use core::mem::{size_of, MaybeUninit};

/// Static-friendly handle for a queue of `T`. `T` must fit the pool's
/// buffer size classes configured in `config.rs`.
pub struct Queue<T> {
    inner: UnsafeCell<OsQueue>,
    _marker: core::marker::PhantomData<T>,
}

unsafe impl<T> Sync for Queue<T> {}
unsafe impl<T> Send for Queue<T> {}

impl<T: Copy> Queue<T> {
    pub const fn new() -> Self {
        Queue {
            inner: UnsafeCell::new(OsQueue::new()),
            _marker: core::marker::PhantomData,
        }
    }

    pub fn create(&self, capacity: usize, name: &'static str) -> OsResult<()> {
        unsafe { (*self.inner.get()).create(capacity, size_of::<T>(), name) }
    }

    pub fn send(&self, item: T, timeout: OsTick) -> OsResult<()> {
        unsafe { (*self.inner.get()).send(&item as *const T as *const u8, timeout) }
    }

    pub fn receive(&self, timeout: OsTick) -> OsResult<T> {
        let mut out = MaybeUninit::<T>::uninit();
        unsafe {
            (*self.inner.get()).receive(out.as_mut_ptr() as *mut u8, timeout)?;
            Ok(out.assume_init())
        }
    }

    pub fn send_immediate(&self, item: T) -> OsResult<()> {
        unsafe { (*self.inner.get()).send_immediate(&item as *const T as *const u8) }
    }

    pub fn receive_immediate(&self) -> OsResult<T> {
        let mut out = MaybeUninit::<T>::uninit();
        unsafe {
            (*self.inner.get()).receive_immediate(out.as_mut_ptr() as *mut u8)?;
            Ok(out.assume_init())
        }
    }

    #[inline]
    pub fn messages_waiting(&self) -> usize {
        unsafe { (*self.inner.get()).messages_waiting() }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        unsafe { (*self.inner.get()).is_empty() }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        unsafe { (*self.inner.get()).is_full() }
    }
}

impl<T: Copy> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
