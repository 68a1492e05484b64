//! A small preemptive real-time kernel for single-core microcontrollers.
//!
//! Provides:
//! - Fixed-priority preemptive scheduling with round-robin among equal
//!   priorities
//! - Synchronization primitives (semaphores, mutexes, message queues),
//!   all pool-backed with no allocation after `kernel_init`
//! - Tick-based delays and timeouts
//! - Context switching for ARM Cortex-M

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

/// Host-only stand-in: there is no interrupt controller to mask off
/// target, so this just tracks whether a section is active. Host tests
/// run single-threaded and cooperatively (nothing preempts a task except
/// another task's own blocking call), so a flag is all correctness here
/// needs.
#[cfg(not(target_arch = "arm"))]
mod cs_impl {
    use core::sync::atomic::{AtomicBool, Ordering};
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct HostCriticalSection;
    set_impl!(HostCriticalSection);

    static ACTIVE: AtomicBool = AtomicBool::new(false);

    unsafe impl Impl for HostCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = ACTIVE.swap(true, Ordering::SeqCst);
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if !was_active {
                ACTIVE.store(false, Ordering::SeqCst);
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod sync;
pub mod port;

// ============ Re-exports ============

pub use core::circbuf;
pub use core::config;
pub use core::config::*;
pub use core::critical;
pub use core::error;
pub use core::error::{OsError, OsResult};
pub use core::kernel;
pub use core::kernel::{kernel_init, kernel_start};
pub use core::list;
pub use core::pool;
pub use core::prio;
pub use core::types;
pub use core::types::*;
pub use core::task;
pub use core::task::{
    task_create, task_delay, task_delete, task_get_current, task_resume, task_suspend,
    task_yield,
};
pub use core::sched;
pub use core::time;
pub use core::timeutil;
pub(crate) use core::resources;

#[cfg(feature = "sem")]
pub use sync::sem;
#[cfg(feature = "mutex")]
pub use sync::mutex;
#[cfg(feature = "queue")]
pub use sync::queue;

#[cfg(feature = "pac")]
pub use stm32_metapac as pac;
