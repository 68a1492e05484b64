//! Port layer: the CPU-specific operations the kernel core treats as an
//! external collaborator (interrupt masking aside, which goes through
//! the `critical-section` crate directly).

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
pub use cortex_m4::*;

/// Recording test double used off-target (host unit tests, `cargo test`).
/// Rather than silently no-op, it counts every call so tests can assert
/// the kernel core drove the port the way it was supposed to, and hands
/// back a plausible top-of-stack pointer so task creation exercises the
/// real pool/TCB path without real register-frame layout.
#[cfg(not(target_arch = "arm"))]
pub mod stub {
    use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use crate::task::OsTaskFn;
    use crate::types::OsStkElement;

    pub const CPU_CLOCK_HZ: u32 = 16_000_000;

    pub static CTX_SW_COUNT: AtomicUsize = AtomicUsize::new(0);
    pub static INT_CTX_SW_COUNT: AtomicUsize = AtomicUsize::new(0);
    pub static IDLE_WAIT_COUNT: AtomicUsize = AtomicUsize::new(0);
    pub static SYSTICK_RELOAD: AtomicU32 = AtomicU32::new(0);

    /// Reset every counter; call between independent test cases.
    pub fn reset_counters() {
        CTX_SW_COUNT.store(0, Ordering::SeqCst);
        INT_CTX_SW_COUNT.store(0, Ordering::SeqCst);
        IDLE_WAIT_COUNT.store(0, Ordering::SeqCst);
        SYSTICK_RELOAD.store(0, Ordering::SeqCst);
    }

    /// # Safety
    /// Only meaningful once `kernel_start` is actually wired to a real
    /// dispatcher; the host build never calls this for real.
    pub unsafe fn start_high_rdy() -> ! {
        panic!("start_high_rdy has no real target to dispatch to off-device");
    }

    pub fn ctx_sw() {
        CTX_SW_COUNT.fetch_add(1, Ordering::SeqCst);
    }

    pub fn int_ctx_sw() {
        INT_CTX_SW_COUNT.fetch_add(1, Ordering::SeqCst);
    }

    pub fn idle_wait() {
        IDLE_WAIT_COUNT.fetch_add(1, Ordering::SeqCst);
    }

    /// # Safety
    /// `stk_base..stk_base+stk_size` must be a valid, exclusively-owned
    /// stack region.
    pub unsafe fn task_stk_init(
        _task_fn: OsTaskFn,
        _arg: *mut (),
        stk_base: *mut OsStkElement,
        stk_size: usize,
    ) -> *mut OsStkElement {
        unsafe { stk_base.add(stk_size - 1) }
    }

    pub fn cpu_systick_init(reload: u32) {
        SYSTICK_RELOAD.store(reload, Ordering::SeqCst);
    }
}

#[cfg(not(target_arch = "arm"))]
pub use stub::*;
