//! Static backing storage for every pool the kernel draws from.
//!
//! Nothing here is reachable from application code; `alloc_*`/`free_*`
//! functions are the only interface, and they are the sole place that
//! turns a pool's zeroed byte slot into a live Rust value.

use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

use super::config::*;
use super::error::{OsError, OsResult};
use super::pool::Pool;
use super::task::OsTcb;
use super::types::OsStkElement;
use crate::sync::mutex::OsMutex;
use crate::sync::queue::OsQueue;
use crate::sync::sem::OsSem;

const TCB_BYTES: usize = core::mem::size_of::<OsTcb>();
const SEM_BYTES: usize = core::mem::size_of::<OsSem>();
const MUTEX_BYTES: usize = core::mem::size_of::<OsMutex>();
const QUEUE_BYTES: usize = core::mem::size_of::<OsQueue>();

static mut TCB_STORAGE: [MaybeUninit<[u8; TCB_BYTES]>; MAX_TASKS] =
    [const { MaybeUninit::uninit() }; MAX_TASKS];
static TCB_POOL: Pool<TCB_BYTES, MAX_TASKS> = Pool::empty();

static mut SEM_STORAGE: [MaybeUninit<[u8; SEM_BYTES]>; MAX_SEMAPHORES] =
    [const { MaybeUninit::uninit() }; MAX_SEMAPHORES];
static SEM_POOL: Pool<SEM_BYTES, MAX_SEMAPHORES> = Pool::empty();

static mut MUTEX_STORAGE: [MaybeUninit<[u8; MUTEX_BYTES]>; MAX_MUTEXES] =
    [const { MaybeUninit::uninit() }; MAX_MUTEXES];
static MUTEX_POOL: Pool<MUTEX_BYTES, MAX_MUTEXES> = Pool::empty();

static mut QUEUE_STORAGE: [MaybeUninit<[u8; QUEUE_BYTES]>; MAX_QUEUES] =
    [const { MaybeUninit::uninit() }; MAX_QUEUES];
static QUEUE_POOL: Pool<QUEUE_BYTES, MAX_QUEUES> = Pool::empty();

const STACK_SMALL_BYTES: usize = STACK_SMALL_WORDS * 4;
const STACK_DEFAULT_BYTES: usize = STACK_DEFAULT_WORDS * 4;
const STACK_LARGE_BYTES: usize = STACK_LARGE_WORDS * 4;

static mut STACK_SMALL_STORAGE: [MaybeUninit<[u8; STACK_SMALL_BYTES]>; STACK_SMALL_COUNT] =
    [const { MaybeUninit::uninit() }; STACK_SMALL_COUNT];
static STACK_SMALL_POOL: Pool<STACK_SMALL_BYTES, STACK_SMALL_COUNT> = Pool::empty();

static mut STACK_DEFAULT_STORAGE: [MaybeUninit<[u8; STACK_DEFAULT_BYTES]>; STACK_DEFAULT_COUNT] =
    [const { MaybeUninit::uninit() }; STACK_DEFAULT_COUNT];
static STACK_DEFAULT_POOL: Pool<STACK_DEFAULT_BYTES, STACK_DEFAULT_COUNT> = Pool::empty();

static mut STACK_LARGE_STORAGE: [MaybeUninit<[u8; STACK_LARGE_BYTES]>; STACK_LARGE_COUNT] =
    [const { MaybeUninit::uninit() }; STACK_LARGE_COUNT];
static STACK_LARGE_POOL: Pool<STACK_LARGE_BYTES, STACK_LARGE_COUNT> = Pool::empty();

static mut BUFFER_SMALL_STORAGE: [MaybeUninit<[u8; BUFFER_SMALL_BYTES]>; BUFFER_SMALL_COUNT] =
    [const { MaybeUninit::uninit() }; BUFFER_SMALL_COUNT];
static BUFFER_SMALL_POOL: Pool<BUFFER_SMALL_BYTES, BUFFER_SMALL_COUNT> = Pool::empty();

static mut BUFFER_MEDIUM_STORAGE: [MaybeUninit<[u8; BUFFER_MEDIUM_BYTES]>; BUFFER_MEDIUM_COUNT] =
    [const { MaybeUninit::uninit() }; BUFFER_MEDIUM_COUNT];
static BUFFER_MEDIUM_POOL: Pool<BUFFER_MEDIUM_BYTES, BUFFER_MEDIUM_COUNT> = Pool::empty();

static mut BUFFER_LARGE_STORAGE: [MaybeUninit<[u8; BUFFER_LARGE_BYTES]>; BUFFER_LARGE_COUNT] =
    [const { MaybeUninit::uninit() }; BUFFER_LARGE_COUNT];
static BUFFER_LARGE_POOL: Pool<BUFFER_LARGE_BYTES, BUFFER_LARGE_COUNT> = Pool::empty();

/// Must be called exactly once, from `kernel_init`, before any `alloc_*`
/// call. Not thread-safe by itself; the caller is already inside the
/// kernel's one-time initialization critical section.
#[allow(static_mut_refs)]
pub(crate) unsafe fn init_all_pools() {
    unsafe {
        cast_mut(&TCB_POOL).init(&mut TCB_STORAGE);
        cast_mut(&SEM_POOL).init(&mut SEM_STORAGE);
        cast_mut(&MUTEX_POOL).init(&mut MUTEX_STORAGE);
        cast_mut(&QUEUE_POOL).init(&mut QUEUE_STORAGE);
        cast_mut(&STACK_SMALL_POOL).init(&mut STACK_SMALL_STORAGE);
        cast_mut(&STACK_DEFAULT_POOL).init(&mut STACK_DEFAULT_STORAGE);
        cast_mut(&STACK_LARGE_POOL).init(&mut STACK_LARGE_STORAGE);
        cast_mut(&BUFFER_SMALL_POOL).init(&mut BUFFER_SMALL_STORAGE);
        cast_mut(&BUFFER_MEDIUM_POOL).init(&mut BUFFER_MEDIUM_STORAGE);
        cast_mut(&BUFFER_LARGE_POOL).init(&mut BUFFER_LARGE_STORAGE);
    }
}

/// All pools below are only ever touched from inside kernel critical
/// sections; this helper is the single place that asserts that and casts
/// away the `static` immutability.
#[allow(clippy::mut_from_ref)]
unsafe fn cast_mut<const B: usize, const N: usize>(pool: &Pool<B, N>) -> &mut Pool<B, N> {
    unsafe { &mut *(pool as *const Pool<B, N> as *mut Pool<B, N>) }
}

pub fn alloc_tcb() -> OsResult<NonNull<OsTcb>> {
    unsafe {
        let raw = cast_mut(&TCB_POOL).alloc()? as *mut OsTcb;
        ptr::write(raw, OsTcb::new());
        Ok(NonNull::new_unchecked(raw))
    }
}

/// # Safety
/// `tcb` must have come from `alloc_tcb` and not already be freed.
pub unsafe fn free_tcb(tcb: NonNull<OsTcb>) -> OsResult<()> {
    unsafe { cast_mut(&TCB_POOL).free(tcb.as_ptr() as *mut u8) }
}

pub fn alloc_sem() -> OsResult<NonNull<OsSem>> {
    unsafe {
        let raw = cast_mut(&SEM_POOL).alloc()? as *mut OsSem;
        ptr::write(raw, OsSem::new());
        Ok(NonNull::new_unchecked(raw))
    }
}

/// # Safety
/// `sem` must have come from `alloc_sem` and not already be freed.
pub unsafe fn free_sem(sem: NonNull<OsSem>) -> OsResult<()> {
    unsafe { cast_mut(&SEM_POOL).free(sem.as_ptr() as *mut u8) }
}

pub fn alloc_mutex() -> OsResult<NonNull<OsMutex>> {
    unsafe {
        let raw = cast_mut(&MUTEX_POOL).alloc()? as *mut OsMutex;
        ptr::write(raw, OsMutex::new());
        Ok(NonNull::new_unchecked(raw))
    }
}

/// # Safety
/// `mtx` must have come from `alloc_mutex` and not already be freed.
pub unsafe fn free_mutex(mtx: NonNull<OsMutex>) -> OsResult<()> {
    unsafe { cast_mut(&MUTEX_POOL).free(mtx.as_ptr() as *mut u8) }
}

pub fn alloc_queue() -> OsResult<NonNull<OsQueue>> {
    unsafe {
        let raw = cast_mut(&QUEUE_POOL).alloc()? as *mut OsQueue;
        ptr::write(raw, OsQueue::new());
        Ok(NonNull::new_unchecked(raw))
    }
}

/// # Safety
/// `q` must have come from `alloc_queue` and not already be freed.
pub unsafe fn free_queue(q: NonNull<OsQueue>) -> OsResult<()> {
    unsafe { cast_mut(&QUEUE_POOL).free(q.as_ptr() as *mut u8) }
}

/// Reserve the smallest stack size class that satisfies
/// `requested_words`. Returns the base pointer and the actual size
/// granted (which may be larger than requested).
pub fn alloc_stack(requested_words: usize) -> OsResult<(*mut OsStkElement, usize)> {
    if requested_words == 0 {
        return Err(OsError::InvalidSize);
    }
    unsafe {
        if requested_words <= STACK_SMALL_WORDS {
            if let Ok(p) = cast_mut(&STACK_SMALL_POOL).alloc() {
                return Ok((p as *mut OsStkElement, STACK_SMALL_WORDS));
            }
        }
        if requested_words <= STACK_DEFAULT_WORDS {
            if let Ok(p) = cast_mut(&STACK_DEFAULT_POOL).alloc() {
                return Ok((p as *mut OsStkElement, STACK_DEFAULT_WORDS));
            }
        }
        if requested_words <= STACK_LARGE_WORDS {
            if let Ok(p) = cast_mut(&STACK_LARGE_POOL).alloc() {
                return Ok((p as *mut OsStkElement, STACK_LARGE_WORDS));
            }
        }
    }
    Err(OsError::StkSizeInvalid)
}

/// # Safety
/// `(base, words)` must be a pair previously returned by `alloc_stack`
/// and not already freed.
pub unsafe fn free_stack(base: *mut OsStkElement, words: usize) -> OsResult<()> {
    let base = base as *mut u8;
    unsafe {
        if words == STACK_SMALL_WORDS {
            cast_mut(&STACK_SMALL_POOL).free(base)
        } else if words == STACK_DEFAULT_WORDS {
            cast_mut(&STACK_DEFAULT_POOL).free(base)
        } else if words == STACK_LARGE_WORDS {
            cast_mut(&STACK_LARGE_POOL).free(base)
        } else {
            Err(OsError::Null)
        }
    }
}

/// Reserve the smallest queue-buffer size class that holds
/// `requested_bytes`. Returns the base pointer and the actual size
/// granted.
pub fn alloc_buffer(requested_bytes: usize) -> OsResult<(*mut u8, usize)> {
    if requested_bytes == 0 {
        return Err(OsError::InvalidSize);
    }
    unsafe {
        if requested_bytes <= BUFFER_SMALL_BYTES {
            if let Ok(p) = cast_mut(&BUFFER_SMALL_POOL).alloc() {
                return Ok((p, BUFFER_SMALL_BYTES));
            }
        }
        if requested_bytes <= BUFFER_MEDIUM_BYTES {
            if let Ok(p) = cast_mut(&BUFFER_MEDIUM_POOL).alloc() {
                return Ok((p, BUFFER_MEDIUM_BYTES));
            }
        }
        if requested_bytes <= BUFFER_LARGE_BYTES {
            if let Ok(p) = cast_mut(&BUFFER_LARGE_POOL).alloc() {
                return Ok((p, BUFFER_LARGE_BYTES));
            }
        }
    }
    Err(OsError::InvalidSize)
}

/// # Safety
/// `(base, bytes)` must be a pair previously returned by `alloc_buffer`
/// and not already freed.
pub unsafe fn free_buffer(base: *mut u8, bytes: usize) -> OsResult<()> {
    unsafe {
        if bytes == BUFFER_SMALL_BYTES {
            cast_mut(&BUFFER_SMALL_POOL).free(base)
        } else if bytes == BUFFER_MEDIUM_BYTES {
            cast_mut(&BUFFER_MEDIUM_POOL).free(base)
        } else if bytes == BUFFER_LARGE_BYTES {
            cast_mut(&BUFFER_LARGE_POOL).free(base)
        } else {
            Err(OsError::Null)
        }
    }
}

pub use super::pool::PoolStats;

/// Which pool `pool_get_stats` reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Tcb,
    Semaphore,
    Mutex,
    Queue,
    StackSmall,
    StackDefault,
    StackLarge,
    BufferSmall,
    BufferMedium,
    BufferLarge,
}

pub fn pool_get_stats(kind: PoolKind) -> PoolStats {
    unsafe {
        match kind {
            PoolKind::Tcb => cast_mut(&TCB_POOL).stats(),
            PoolKind::Semaphore => cast_mut(&SEM_POOL).stats(),
            PoolKind::Mutex => cast_mut(&MUTEX_POOL).stats(),
            PoolKind::Queue => cast_mut(&QUEUE_POOL).stats(),
            PoolKind::StackSmall => cast_mut(&STACK_SMALL_POOL).stats(),
            PoolKind::StackDefault => cast_mut(&STACK_DEFAULT_POOL).stats(),
            PoolKind::StackLarge => cast_mut(&STACK_LARGE_POOL).stats(),
            PoolKind::BufferSmall => cast_mut(&BUFFER_SMALL_POOL).stats(),
            PoolKind::BufferMedium => cast_mut(&BUFFER_MEDIUM_POOL).stats(),
            PoolKind::BufferLarge => cast_mut(&BUFFER_LARGE_POOL).stats(),
        }
    }
}
