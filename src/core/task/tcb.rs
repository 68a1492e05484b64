//! Task Control Block

use core::ptr::NonNull;

use crate::list::ListNode;
use crate::types::{OsPrio, OsStkElement, OsTick, TaskState, WaitKind, WakeReason};

/// Longest task name stored, excluding the trailing NUL.
pub const TASK_NAME_MAX: usize = 15;

/// Fixed-capacity task name: copied in and truncated at creation rather
/// than borrowed, so a TCB's identity never depends on a caller's
/// string outliving it. Stored as `TASK_NAME_MAX` bytes plus a trailing
/// NUL, mirroring the fixed-length name the reference implementation
/// keeps inline in the TCB.
#[derive(Clone, Copy)]
pub struct TaskName {
    bytes: [u8; TASK_NAME_MAX + 1],
}

impl TaskName {
    pub const fn empty() -> Self {
        Self {
            bytes: [0; TASK_NAME_MAX + 1],
        }
    }

    /// Copies `name` in, truncated to `TASK_NAME_MAX` bytes at the
    /// nearest char boundary, and NUL-terminated.
    pub fn set(&mut self, name: &str) {
        let mut end = name.len().min(TASK_NAME_MAX);
        while end > 0 && !name.is_char_boundary(end) {
            end -= 1;
        }
        self.bytes = [0; TASK_NAME_MAX + 1];
        self.bytes[..end].copy_from_slice(&name.as_bytes()[..end]);
    }

    pub fn as_str(&self) -> &str {
        let len = self.bytes.iter().position(|&b| b == 0).unwrap_or(TASK_NAME_MAX);
        core::str::from_utf8(&self.bytes[..len]).unwrap_or("")
    }
}

impl Default for TaskName {
    fn default() -> Self {
        Self::empty()
    }
}

/// Task Control Block. Lives in the TCB pool; once allocated it never
/// moves, which is what lets `ready_link`/`delay_link`/`wait_link` hold
/// raw pointers back into it safely.
#[repr(C)]
pub struct OsTcb {
    // ============ Stack ============
    pub stk_ptr: *mut OsStkElement,
    pub stk_base: *mut OsStkElement,
    pub stk_size: usize,

    // ============ Identity ============
    pub name: TaskName,

    // ============ Priority ============
    pub base_priority: OsPrio,
    pub effective_priority: OsPrio,

    // ============ State ============
    pub state: TaskState,

    // ============ List memberships ============
    pub ready_link: ListNode<OsTcb>,
    pub delay_link: ListNode<OsTcb>,
    pub wait_link: ListNode<OsTcb>,

    // ============ Timing ============
    /// Absolute tick at which an armed delay/timeout fires. Meaningless
    /// unless the task is on a delayed list.
    pub wake_tick: OsTick,
    /// Which of the scheduler's two physical delayed lists `delay_link`
    /// currently threads through. Needed because removal has to operate
    /// on the same `List` instance the node was inserted into, and the
    /// two lists swap which one is "near-term" on every tick wraparound.
    pub delay_in_list_a: bool,
    /// Remaining round-robin quantum, reloaded from `time_quantum`.
    pub time_quantum: OsTick,
    pub time_quantum_remaining: OsTick,

    // ============ Wait context ============
    pub waiting_on: Option<NonNull<()>>,
    pub wait_kind: WaitKind,
    pub wake_reason: WakeReason,
    /// Splices this TCB out of whichever object's wait list `waiting_on`
    /// points at. Set by the pend call that blocked the task, invoked by
    /// whichever path resolves the wait first: the object's own `post`,
    /// the tick handler on timeout, or a forced `task_delete`.
    pub unlink_waiter: Option<UnlinkWaiterFn>,

    // ============ Suspension ============
    pub suspend_count: u8,

    // ============ Task entry point ============
    pub entry_addr: u32,
    pub entry_arg: *mut (),

    // ============ Bookkeeping ============
    /// Number of times this task has been dispatched onto the CPU.
    pub run_count: u32,
    /// Ticks accumulated while this task was the running task, updated
    /// whenever the scheduler switches away from it.
    pub total_runtime: OsTick,
    /// Tick at which this task was last dispatched; used to compute the
    /// `total_runtime` delta on the next switch-away.
    pub last_dispatch_tick: OsTick,
}

impl OsTcb {
    pub const fn new() -> Self {
        OsTcb {
            stk_ptr: core::ptr::null_mut(),
            stk_base: core::ptr::null_mut(),
            stk_size: 0,

            name: TaskName::empty(),

            base_priority: 0,
            effective_priority: 0,

            state: TaskState::Deleted,

            ready_link: ListNode::new(),
            delay_link: ListNode::new(),
            wait_link: ListNode::new(),

            wake_tick: 0,
            delay_in_list_a: false,
            time_quantum: 0,
            time_quantum_remaining: 0,

            waiting_on: None,
            wait_kind: WaitKind::None,
            wake_reason: WakeReason::None,
            unlink_waiter: None,

            suspend_count: 0,

            entry_addr: 0,
            entry_arg: core::ptr::null_mut(),

            run_count: 0,
            total_runtime: 0,
            last_dispatch_tick: 0,
        }
    }

    pub fn init(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == TaskState::Ready
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.state == TaskState::Blocked
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.state == TaskState::Suspended
    }
}

impl Default for OsTcb {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for OsTcb {}
unsafe impl Sync for OsTcb {}

/// # Safety
/// `obj` must point to the live synchronization object `tcb` is waiting
/// on, and `tcb` must be a member of that object's wait list.
pub type UnlinkWaiterFn = unsafe fn(NonNull<()>, NonNull<OsTcb>);

// ============ Link field accessors ============
//
// Plain function pointers, passed to `List<OsTcb>` operations so that one
// generic list implementation can manage ready queues, delayed lists, and
// wait lists through three independent fields of the same TCB.

/// # Safety
/// `tcb` must point to a live `OsTcb`.
pub unsafe fn ready_link(tcb: NonNull<OsTcb>) -> *mut ListNode<OsTcb> {
    unsafe { &raw mut (*tcb.as_ptr()).ready_link }
}

/// # Safety
/// `tcb` must point to a live `OsTcb`.
pub unsafe fn delay_link(tcb: NonNull<OsTcb>) -> *mut ListNode<OsTcb> {
    unsafe { &raw mut (*tcb.as_ptr()).delay_link }
}

/// # Safety
/// `tcb` must point to a live `OsTcb`.
pub unsafe fn wait_link(tcb: NonNull<OsTcb>) -> *mut ListNode<OsTcb> {
    unsafe { &raw mut (*tcb.as_ptr()).wait_link }
}

/// # Safety
/// `tcb` must point to a live `OsTcb`.
pub unsafe fn wake_tick_of(tcb: NonNull<OsTcb>) -> OsTick {
    unsafe { (*tcb.as_ptr()).wake_tick }
}
