//! Compile-time configuration
//!
//! These constants control the resource limits and timing behavior of the
//! kernel. Every pool is sized at build time; there is no allocation past
//! `kernel_init`.

/// Highest valid priority number (0 is highest priority, `MAX_PRIORITY` is
/// lowest). The idle task always runs at `MAX_PRIORITY`.
pub const MAX_PRIORITY: u8 = 7;

/// Number of distinct priority levels, i.e. `0..=MAX_PRIORITY`.
pub const CFG_PRIO_LEVELS: usize = MAX_PRIORITY as usize + 1;

/// Idle task priority - always the lowest priority level.
pub const CFG_PRIO_IDLE: u8 = MAX_PRIORITY;

/// Maximum number of tasks, including the idle task. Bounds the TCB pool
/// and therefore must fit in a single bitmap word.
pub const MAX_TASKS: usize = 8;

/// Maximum number of queues.
pub const MAX_QUEUES: usize = 4;

/// Maximum number of semaphores.
pub const MAX_SEMAPHORES: usize = 8;

/// Maximum number of mutexes.
pub const MAX_MUTEXES: usize = 4;

/// System tick rate in Hz.
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Default time quantum (in ticks) for round-robin scheduling among
/// same-priority tasks.
pub const CFG_TIME_QUANTA_DEFAULT: u32 = 10;

/// Minimum task stack size, in words.
pub const CFG_STK_SIZE_MIN: usize = 32;

/// Sentinel timeout value meaning "wait forever". Never inserted into a
/// delayed list; release only comes from data availability or object
/// deletion.
pub const WAIT_FOREVER: u32 = u32::MAX;

// ============ Stack size classes (in words of `OsStkElement`) ============

pub const STACK_SMALL_WORDS: usize = 128;
pub const STACK_SMALL_COUNT: usize = 4;

pub const STACK_DEFAULT_WORDS: usize = 256;
pub const STACK_DEFAULT_COUNT: usize = 6;

pub const STACK_LARGE_WORDS: usize = 512;
pub const STACK_LARGE_COUNT: usize = 2;

// ============ Queue buffer size classes (in bytes) ============

pub const BUFFER_SMALL_BYTES: usize = 64;
pub const BUFFER_SMALL_COUNT: usize = 8;

pub const BUFFER_MEDIUM_BYTES: usize = 256;
pub const BUFFER_MEDIUM_COUNT: usize = 4;

pub const BUFFER_LARGE_BYTES: usize = 1024;
pub const BUFFER_LARGE_COUNT: usize = 2;

const _: () = assert!(MAX_TASKS <= 32, "TCB pool bitmap is a single u32");
const _: () = assert!(MAX_QUEUES <= 32, "QCB pool bitmap is a single u32");
const _: () = assert!(MAX_SEMAPHORES <= 32, "SCB pool bitmap is a single u32");
const _: () = assert!(MAX_MUTEXES <= 32, "MCB pool bitmap is a single u32");
const _: () = assert!(STACK_SMALL_COUNT <= 32);
const _: () = assert!(STACK_DEFAULT_COUNT <= 32);
const _: () = assert!(STACK_LARGE_COUNT <= 32);
const _: () = assert!(BUFFER_SMALL_COUNT <= 32);
const _: () = assert!(BUFFER_MEDIUM_COUNT <= 32);
const _: () = assert!(BUFFER_LARGE_COUNT <= 32);
