//! Global kernel state and initialization.
//!
//! Everything here is process-wide singleton state: the atomic run
//! flags, the scheduler's ready/delayed lists, and the CPU context-switch
//! handshake the port layer reads. `kernel_init`/`kernel_start` are the
//! only two calls an application makes directly into this module.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use super::config::{CFG_PRIO_IDLE, CFG_PRIO_LEVELS, CFG_TICK_RATE_HZ};
use super::critical::{critical_section, CriticalSection};
use super::cs_cell::CsCell;
use super::error::{OsError, OsResult};
use super::list::List;
use super::prio::PrioTable;
use super::resources;
use super::task::tcb;
use super::task::OsTcb;
use super::types::{OsPrio, OsTick, TaskState};

// ============ Kernel flags ============

pub struct KernelFlags {
    initialized: AtomicBool,
    running: AtomicBool,
    int_nesting: AtomicU8,
    sched_lock_nesting: AtomicU8,
    tick_counter: AtomicU32,
}

impl KernelFlags {
    const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
            int_nesting: AtomicU8::new(0),
            sched_lock_nesting: AtomicU8::new(0),
            tick_counter: AtomicU32::new(0),
        }
    }

    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn tick_get(&self) -> OsTick {
        self.tick_counter.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn int_nesting(&self) -> u8 {
        self.int_nesting.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn sched_lock_nesting(&self) -> u8 {
        self.sched_lock_nesting.load(Ordering::SeqCst)
    }

    /// Wrapping increment; returns the new tick count so the caller can
    /// detect the one wraparound case it needs to react to.
    #[inline(always)]
    pub(crate) fn tick_increment(&self) -> OsTick {
        self.tick_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    #[inline(always)]
    pub(crate) fn int_enter(&self) {
        if self.is_running() {
            self.int_nesting.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    pub(crate) fn int_exit(&self) -> u8 {
        let nesting = self.int_nesting.load(Ordering::Relaxed);
        if nesting == 0 {
            return 0;
        }
        self.int_nesting.store(nesting - 1, Ordering::Relaxed);
        nesting - 1
    }

    pub(crate) fn try_sched_lock(&self) -> u8 {
        let nesting = self.sched_lock_nesting.load(Ordering::SeqCst).saturating_add(1);
        self.sched_lock_nesting.store(nesting, Ordering::SeqCst);
        nesting
    }

    pub(crate) fn try_sched_unlock(&self) -> OsResult<u8> {
        let nesting = self.sched_lock_nesting.load(Ordering::SeqCst);
        if nesting == 0 {
            return Err(OsError::SchedNotLocked);
        }
        let remaining = nesting - 1;
        self.sched_lock_nesting.store(remaining, Ordering::SeqCst);
        Ok(remaining)
    }
}

pub(crate) static KERNEL: KernelFlags = KernelFlags::new();

// ============ Scheduler state ============

pub struct SchedState {
    pub(crate) prio_tbl: PrioTable,
    pub(crate) ready_queues: [List<OsTcb>; CFG_PRIO_LEVELS],
    /// Deleted-while-running tasks whose TCB/stack can't be freed until
    /// something else is scheduled in their place. Threaded through
    /// `ready_link`, which is otherwise unused once a task is Deleted.
    pub(crate) pending_cleanup: List<OsTcb>,
    delay_list_a: List<OsTcb>,
    delay_list_b: List<OsTcb>,
    /// Which of the two physical delayed lists currently holds near-term
    /// wakeups. Flips every time the tick counter wraps past `u32::MAX`.
    role_a_is_near: bool,
}

impl SchedState {
    const fn new() -> Self {
        Self {
            prio_tbl: PrioTable::new(),
            ready_queues: [const { List::new() }; CFG_PRIO_LEVELS],
            pending_cleanup: List::new(),
            delay_list_a: List::new(),
            delay_list_b: List::new(),
            role_a_is_near: true,
        }
    }

    #[inline]
    fn near_list(&mut self) -> &mut List<OsTcb> {
        if self.role_a_is_near {
            &mut self.delay_list_a
        } else {
            &mut self.delay_list_b
        }
    }

    #[inline]
    fn list_for(&mut self, in_a: bool) -> &mut List<OsTcb> {
        if in_a {
            &mut self.delay_list_a
        } else {
            &mut self.delay_list_b
        }
    }

    /// Insert `tcb` so it wakes at `now.wrapping_add(delay)`. Picks
    /// whichever physical list currently plays the role the deadline
    /// belongs to and records that choice on the TCB so removal can find
    /// it again regardless of any wraparound role flip in between.
    pub(crate) unsafe fn delay_insert(&mut self, tcb: NonNull<OsTcb>, now: OsTick, delay: OsTick) {
        let wake = now.wrapping_add(delay);
        let wraps = wake < now;
        let target_is_a = if wraps { !self.role_a_is_near } else { self.role_a_is_near };

        unsafe {
            (*tcb.as_ptr()).wake_tick = wake;
            (*tcb.as_ptr()).delay_in_list_a = target_is_a;
        }
        let key = |n: NonNull<OsTcb>| unsafe { tcb::wake_tick_of(n) };
        unsafe { self.list_for(target_is_a).insert_sorted(tcb, tcb::delay_link, key) };
    }

    /// # Safety
    /// `tcb` must currently be linked via `delay_link`.
    pub(crate) unsafe fn delay_remove(&mut self, tcb: NonNull<OsTcb>) {
        let in_a = unsafe { (*tcb.as_ptr()).delay_in_list_a };
        unsafe { self.list_for(in_a).remove(tcb, tcb::delay_link) };
    }

    /// Flip which physical delayed list plays the near-term role. Called
    /// exactly once per tick-counter wraparound, before any `pop_due`
    /// calls for that tick.
    pub(crate) fn handle_tick_wrap(&mut self) {
        self.role_a_is_near = !self.role_a_is_near;
    }

    /// Pop and return the next task whose deadline is at or before `now`,
    /// already unlinked from the delayed list. The caller is responsible
    /// for moving it onto a ready queue.
    pub(crate) fn pop_due(&mut self, now: OsTick) -> Option<NonNull<OsTcb>> {
        let list = self.near_list();
        let head = list.head()?;
        if !unsafe { super::timeutil::time_lte(tcb::wake_tick_of(head), now) } {
            return None;
        }
        unsafe { list.remove(head, tcb::delay_link) };
        Some(head)
    }

    #[inline(always)]
    pub fn prio_table(&mut self) -> &mut PrioTable {
        &mut self.prio_tbl
    }

    #[inline(always)]
    pub fn ready_queue(&mut self, prio: OsPrio) -> &mut List<OsTcb> {
        &mut self.ready_queues[prio as usize]
    }
}

pub(crate) static SCHED: CsCell<SchedState> = CsCell::new(SchedState::new());

// ============ CPU / context-switch handshake ============

/// State the port layer's context-switch code reads and writes directly.
/// Kept `repr(C)` and free of any Rust-level invariants beyond "these are
/// either null or point at a live TCB", since the assembly trampoline
/// touches it without going through accessor methods.
#[repr(C)]
pub struct CpuState {
    pub tcb_cur: *mut OsTcb,
    pub tcb_high_rdy: *mut OsTcb,
    pub prio_cur: OsPrio,
    pub prio_high_rdy: OsPrio,
    pub except_stk_base: u32,
}

impl CpuState {
    pub const fn new() -> Self {
        Self {
            tcb_cur: core::ptr::null_mut(),
            tcb_high_rdy: core::ptr::null_mut(),
            prio_cur: 0,
            prio_high_rdy: 0,
            except_stk_base: 0,
        }
    }
}

#[no_mangle]
#[used]
pub static mut CPU_STATE: CpuState = CpuState::new();

#[inline(always)]
pub(crate) unsafe fn current_tcb() -> Option<NonNull<OsTcb>> {
    unsafe { NonNull::new(CPU_STATE.tcb_cur) }
}

// ============ Idle task ============

pub(crate) fn idle_task_body(_: *mut ()) -> ! {
    loop {
        critical_section(|cs| reap_pending_cleanup(cs));
        crate::port::idle_wait();
    }
}

/// Frees the TCB/stack of every task that deleted itself while running.
/// Only the idle task calls this; every other task deletion frees
/// immediately since nothing is executing on the victim's stack.
fn reap_pending_cleanup(cs: &CriticalSection) {
    let sched = SCHED.get(cs);
    while let Some(tcb) = sched.pending_cleanup.head() {
        unsafe {
            sched.pending_cleanup.remove(tcb, tcb::ready_link);
            let stk_base = (*tcb.as_ptr()).stk_base;
            let stk_size = (*tcb.as_ptr()).stk_size;
            let _ = resources::free_stack(stk_base, stk_size);
            let _ = resources::free_tcb(tcb);
        }
    }
}

// ============ Public API ============

/// Initialize the kernel: wires up the memory pools, the priority table,
/// the ready/delayed lists, and creates the idle task. Must be called
/// exactly once, before `kernel_start` and before any task/object
/// creation.
pub fn kernel_init() -> OsResult<()> {
    if KERNEL.is_initialized() {
        return Err(OsError::OsRunning);
    }

    unsafe { resources::init_all_pools() };

    critical_section(|cs| {
        let sched = SCHED.get(cs);
        sched.prio_tbl.init();
        for q in sched.ready_queues.iter_mut() {
            q.init();
        }
        sched.pending_cleanup.init();
        sched.delay_list_a.init();
        sched.delay_list_b.init();
        sched.role_a_is_near = true;

        super::task::create_idle_task(cs)?;

        KERNEL.initialized.store(true, Ordering::SeqCst);
        crate::info!("kernel_init: pools and idle task ready");
        Ok(())
    })
}

/// Start multitasking: picks the highest-priority ready task (normally
/// the one application task created so far, never the idle task alone)
/// and hands control to the port layer. Does not return on success.
pub fn kernel_start() -> OsResult<()> {
    if !KERNEL.is_initialized() {
        return Err(OsError::OsNotInit);
    }
    if KERNEL.is_running() {
        return Err(OsError::OsRunning);
    }

    let ready = critical_section(|cs| {
        let sched = SCHED.get(cs);
        let prio = sched.prio_tbl.highest();
        sched.ready_queues[prio as usize].head().map(|tcb| (prio, tcb))
    });

    let (prio, tcb) = ready.ok_or_else(|| {
        crate::warn!("kernel_start: no application task to dispatch");
        OsError::OsNoAppTask
    })?;
    if prio == CFG_PRIO_IDLE {
        crate::warn!("kernel_start: only the idle task is ready");
        return Err(OsError::OsNoAppTask);
    }

    crate::info!("kernel_start: dispatching {} prio={}", unsafe { (*tcb.as_ptr()).name() }, prio);

    unsafe {
        CPU_STATE.prio_cur = prio;
        CPU_STATE.prio_high_rdy = prio;
        CPU_STATE.tcb_cur = tcb.as_ptr();
        CPU_STATE.tcb_high_rdy = tcb.as_ptr();
        (*tcb.as_ptr()).state = TaskState::Running;
        (*tcb.as_ptr()).run_count += 1;
        (*tcb.as_ptr()).last_dispatch_tick = KERNEL.tick_get();
    }

    KERNEL.running.store(true, Ordering::SeqCst);
    crate::port::cpu_systick_init(crate::port::CPU_CLOCK_HZ / CFG_TICK_RATE_HZ);

    unsafe { crate::port::start_high_rdy() }
}

/// Called at the end of every ISR. Switches context if handling the
/// interrupt made a higher-priority task ready.
pub fn int_exit() {
    if !KERNEL.is_running() {
        return;
    }

    let _cs = CriticalSection::enter();
    if KERNEL.int_nesting() == 0 {
        return;
    }
    let remaining = KERNEL.int_exit();
    if remaining != 0 || KERNEL.sched_lock_nesting() != 0 {
        return;
    }

    unsafe {
        let sched = SCHED.get_unchecked();
        let prio = sched.prio_tbl.highest();
        if let Some(head) = sched.ready_queues[prio as usize].head() {
            if prio < CPU_STATE.prio_cur {
                CPU_STATE.prio_high_rdy = prio;
                CPU_STATE.tcb_high_rdy = head.as_ptr();
                crate::trace!("int_exit: switching to {} prio={}", (*head.as_ptr()).name(), prio);
                crate::port::int_ctx_sw();
            }
        }
    }
}

pub fn sched_lock() -> OsResult<()> {
    if !KERNEL.is_running() {
        return Err(OsError::OsNotRunning);
    }
    if KERNEL.int_nesting() > 0 {
        return Err(OsError::CalledFromIsr);
    }
    critical_section(|_cs| {
        KERNEL.try_sched_lock();
    });
    Ok(())
}

pub fn sched_unlock() -> OsResult<()> {
    if !KERNEL.is_running() {
        return Err(OsError::OsNotRunning);
    }
    if KERNEL.int_nesting() > 0 {
        return Err(OsError::CalledFromIsr);
    }
    critical_section(|_cs| KERNEL.try_sched_unlock())?;
    if KERNEL.sched_lock_nesting() == 0 {
        super::sched::reschedule();
    }
    Ok(())
}

// ============ Internal accessors used by sibling modules ============

#[inline(always)]
pub(crate) fn is_running() -> bool {
    KERNEL.is_running()
}

#[inline(always)]
pub(crate) fn int_nesting() -> u8 {
    KERNEL.int_nesting()
}

#[inline(always)]
pub(crate) fn sched_lock_nesting() -> u8 {
    KERNEL.sched_lock_nesting()
}

#[inline(always)]
pub(crate) fn tick_get() -> OsTick {
    KERNEL.tick_get()
}

#[inline(always)]
pub(crate) fn sched_mut(cs: &CriticalSection) -> &mut SchedState {
    SCHED.get(cs)
}

// ============ Test support ============
//
// `kernel_start` never returns on success (it tail-calls the port
// layer's dispatch, which on real hardware never hands control back),
// so host tests can't call it directly. These helpers replicate the
// bookkeeping it and the port layer's context-switch handshake would
// have performed, without the diverging call. Kept in this module
// because `KERNEL.running` is a private field - every test anywhere in
// the crate that needs a "running" kernel has to go through here, which
// is also why every such test lives in the one function below rather
// than being spread across independent `#[test]` fns: `kernel_init` is
// a true once-per-process singleton with no reset, and cargo runs
// `#[test]` fns in parallel by default.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub(crate) fn force_start(tcb: NonNull<OsTcb>, prio: OsPrio) {
        unsafe {
            CPU_STATE.prio_cur = prio;
            CPU_STATE.prio_high_rdy = prio;
            CPU_STATE.tcb_cur = tcb.as_ptr();
            CPU_STATE.tcb_high_rdy = tcb.as_ptr();
            (*tcb.as_ptr()).state = TaskState::Running;
            (*tcb.as_ptr()).run_count += 1;
            (*tcb.as_ptr()).last_dispatch_tick = KERNEL.tick_get();
        }
        KERNEL.running.store(true, Ordering::SeqCst);
    }

    /// Simulates the port layer's context-switch handshake completing:
    /// copies `tcb_high_rdy`/`prio_high_rdy`, the fields `reschedule`
    /// leaves for it to pick up, into `tcb_cur`/`prio_cur`.
    pub(crate) fn apply_switch() {
        unsafe {
            CPU_STATE.tcb_cur = CPU_STATE.tcb_high_rdy;
            CPU_STATE.prio_cur = CPU_STATE.prio_high_rdy;
        }
    }

    /// Forces `tcb` to be the task any `current_tcb()` call resolves to,
    /// without touching its ready-queue membership or state - for tests
    /// that need a specific task to appear "currently executing" right
    /// before making a blocking call as it.
    pub(crate) fn set_current(tcb: NonNull<OsTcb>) {
        unsafe { CPU_STATE.tcb_cur = tcb.as_ptr() };
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::core::config::STACK_SMALL_WORDS;
    use crate::core::task::{task_create, task_delete};
    use crate::resources::{self, PoolKind};
    use crate::sync::mutex::OsMutex;
    use crate::sync::queue::OsQueue;
    use crate::sync::sem::OsSem;
    use crate::types::{WaitKind, WakeReason};

    fn dummy_task(_: *mut ()) -> ! {
        loop {}
    }

    /// Every `kernel_init`/`kernel_start`-dependent scenario in the
    /// crate, run back to back in one test. See the module doc above
    /// for why: `kernel_init` can only succeed once per process, and
    /// the host `critical-section` `Impl` doesn't provide real
    /// cross-thread exclusion, so two independent tests both calling it
    /// would race under cargo's default parallel test runner.
    #[test]
    fn kernel_scenarios() {
        kernel_init().expect("first kernel_init call must succeed");
        assert_eq!(kernel_init(), Err(OsError::OsRunning));

        // Parked at a low priority (6) so it never outranks the scenario
        // tasks below and skews which one `reschedule` picks as head.
        let ctrl = task_create("ctrl", dummy_task, core::ptr::null_mut(), 6, STACK_SMALL_WORDS)
            .expect("ctrl task create failed");
        force_start(ctrl, 6);
        assert!(is_running());

        // ---- Scenario: priority-driven preemption on a semaphore post ----
        {
            let a = task_create("a", dummy_task, core::ptr::null_mut(), 3, STACK_SMALL_WORDS).unwrap();
            let b = task_create("b", dummy_task, core::ptr::null_mut(), 1, STACK_SMALL_WORDS).unwrap();

            let mut sem = OsSem::new();
            sem.create(0, 1, "sem_preempt").unwrap();

            force_start(a, 3); // a is "running"

            set_current(b);
            let blocked = sem.pend(crate::config::WAIT_FOREVER);
            assert_eq!(blocked, Err(OsError::Null), "host can't truly suspend b's call; see module docs");
            assert!(unsafe { (*b.as_ptr()).is_blocked() });
            assert_eq!(unsafe { (*b.as_ptr()).wait_kind }, WaitKind::Semaphore);
            assert!(sem.has_waiting_tasks());

            apply_switch();
            assert_eq!(unsafe { current_tcb() }, Some(a));

            let posted = sem.post();
            assert!(posted.is_ok());

            assert_eq!(unsafe { CPU_STATE.tcb_high_rdy }, b.as_ptr(), "b has higher priority, should preempt a");
            apply_switch();
            assert_eq!(unsafe { current_tcb() }, Some(b));
            assert_eq!(unsafe { (*b.as_ptr()).wake_reason }, WakeReason::DataAvailable);
            assert!(unsafe { (*a.as_ptr()).is_ready() }, "a demoted to ready, not deleted from its queue");
            assert_eq!(unsafe { (*b.as_ptr()).run_count }, 1, "reschedule dispatched b for the first time");
            assert_eq!(
                critical_section(|cs| sched_mut(cs).ready_queue(3).head()),
                Some(a),
                "a stays linked on its own ready queue across the switch"
            );

            set_current(ctrl);
            task_delete(Some(a)).unwrap();
            task_delete(Some(b)).unwrap();
        }

        // ---- Scenario: FIFO round robin within one priority level ----
        {
            let x = task_create("x", dummy_task, core::ptr::null_mut(), 4, STACK_SMALL_WORDS).unwrap();
            let y = task_create("y", dummy_task, core::ptr::null_mut(), 4, STACK_SMALL_WORDS).unwrap();
            let z = task_create("z", dummy_task, core::ptr::null_mut(), 4, STACK_SMALL_WORDS).unwrap();

            assert_eq!(critical_section(|cs| sched_mut(cs).ready_queue(4).head()), Some(x));

            set_current(x);
            crate::core::task::task_yield().unwrap();
            assert_eq!(critical_section(|cs| sched_mut(cs).ready_queue(4).head()), Some(y));

            set_current(y);
            crate::core::task::task_yield().unwrap();
            assert_eq!(critical_section(|cs| sched_mut(cs).ready_queue(4).head()), Some(z));

            set_current(z);
            crate::core::task::task_yield().unwrap();
            assert_eq!(
                critical_section(|cs| sched_mut(cs).ready_queue(4).head()),
                Some(x),
                "three yields among three equal-priority tasks restores creation order"
            );

            set_current(ctrl);
            task_delete(Some(x)).unwrap();
            task_delete(Some(y)).unwrap();
            task_delete(Some(z)).unwrap();
        }

        // ---- Scenario: timeout expiry unblocks and unlinks the waiter ----
        {
            let t = task_create("t", dummy_task, core::ptr::null_mut(), 2, STACK_SMALL_WORDS).unwrap();
            let mut sem = OsSem::new();
            sem.create(0, 1, "sem_timeout").unwrap();

            set_current(t);
            let res = sem.pend(10);
            assert_eq!(res, Err(OsError::Null), "premature host return; state mutations below are still real");
            assert!(unsafe { (*t.as_ptr()).is_blocked() });
            assert!(sem.has_waiting_tasks());

            for _ in 0..9 {
                crate::core::time::tick_handler();
                assert!(unsafe { (*t.as_ptr()).is_blocked() }, "timeout hasn't reached its deadline yet");
            }
            crate::core::time::tick_handler();

            assert_eq!(unsafe { (*t.as_ptr()).state }, TaskState::Ready);
            assert_eq!(unsafe { (*t.as_ptr()).wake_reason }, WakeReason::Timeout);
            assert!(!sem.has_waiting_tasks(), "tick_handler unlinks the waiter via its stored callback");

            set_current(ctrl);
            task_delete(Some(t)).unwrap();
        }

        // ---- Scenario: mutex priority inheritance ----
        {
            let low = task_create("low", dummy_task, core::ptr::null_mut(), 6, STACK_SMALL_WORDS).unwrap();
            let high = task_create("high", dummy_task, core::ptr::null_mut(), 0, STACK_SMALL_WORDS).unwrap();

            let mut mtx = OsMutex::new();
            mtx.create("mtx_pi").unwrap();

            set_current(low);
            mtx.pend(crate::config::WAIT_FOREVER).unwrap();
            assert_eq!(mtx.owner(), Some(low));
            assert_eq!(unsafe { (*low.as_ptr()).effective_priority }, 6);

            set_current(high);
            let res = mtx.pend(crate::config::WAIT_FOREVER);
            assert_eq!(res, Err(OsError::Null), "premature host return; boost below already happened");
            assert_eq!(
                unsafe { (*low.as_ptr()).effective_priority },
                0,
                "low's effective priority boosted to high's base priority"
            );
            assert!(unsafe { (*high.as_ptr()).is_blocked() });

            set_current(low);
            mtx.post().unwrap();
            assert_eq!(
                unsafe { (*low.as_ptr()).effective_priority },
                6,
                "low's priority restored to its own base on unlock"
            );
            assert_eq!(mtx.owner(), Some(high), "ownership handed directly to the waiter");
            assert_eq!(
                unsafe { (*high.as_ptr()).state },
                TaskState::Running,
                "reschedule promotes high straight to running since it's now the highest-priority ready task"
            );

            set_current(ctrl);
            mtx.delete().unwrap();
            task_delete(Some(low)).unwrap();
            task_delete(Some(high)).unwrap();
        }

        // ---- Scenario: queue wraparound via the non-blocking facade ----
        {
            let mut q = OsQueue::new();
            q.create(4, core::mem::size_of::<u32>(), "q_wrap").unwrap();

            for v in [1u32, 2, 3, 4] {
                unsafe { q.send_immediate(&v as *const u32 as *const u8).unwrap() };
            }
            assert!(q.is_full());
            assert_eq!(
                unsafe { q.send_immediate(&5u32 as *const u32 as *const u8) },
                Err(OsError::Full)
            );

            let mut out = 0u32;
            unsafe { q.receive_immediate(&mut out as *mut u32 as *mut u8).unwrap() };
            assert_eq!(out, 1);

            unsafe { q.send_immediate(&5u32 as *const u32 as *const u8).unwrap() };
            assert!(q.is_full(), "wrapped write fills the slot freed by the earlier read");

            let mut seen = vec![];
            while !q.is_empty() {
                let mut v = 0u32;
                unsafe { q.receive_immediate(&mut v as *mut u32 as *mut u8).unwrap() };
                seen.push(v);
            }
            assert_eq!(seen, vec![2, 3, 4, 5]);
            assert_eq!(
                unsafe { q.receive_immediate(&mut out as *mut u32 as *mut u8) },
                Err(OsError::Empty)
            );

            q.delete().unwrap();
        }

        // ---- Scenario: TCB pool exhaustion and recovery ----
        {
            let before = resources::pool_get_stats(PoolKind::Tcb);
            assert_eq!(before.used, 2, "only idle and ctrl should be alive at this point");

            let mut spawned = vec![];
            for i in 0..(before.free) {
                let h = task_create(
                    "fill",
                    dummy_task,
                    core::ptr::null_mut(),
                    6,
                    STACK_SMALL_WORDS,
                )
                .unwrap_or_else(|e| panic!("task {i} should still fit: {e:?}"));
                spawned.push(h);
            }
            assert_eq!(resources::pool_get_stats(PoolKind::Tcb).free, 0);

            assert_eq!(
                task_create("overflow", dummy_task, core::ptr::null_mut(), 6, STACK_SMALL_WORDS),
                Err(OsError::TaskCreateFailed)
            );

            let freed = spawned.pop().unwrap();
            set_current(ctrl);
            task_delete(Some(freed)).unwrap();
            assert_eq!(resources::pool_get_stats(PoolKind::Tcb).free, 1);

            let recreated =
                task_create("recreated", dummy_task, core::ptr::null_mut(), 6, STACK_SMALL_WORDS)
                    .expect("a freed slot must be reusable");
            spawned.push(recreated);

            for h in spawned {
                task_delete(Some(h)).unwrap();
            }
        }

        let final_stats = resources::pool_get_stats(PoolKind::Tcb);
        assert_eq!(final_stats.used, 2, "only idle and ctrl remain after every scenario cleans up");
    }
}
