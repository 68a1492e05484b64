//! Error types
//!
//! Every fallible kernel operation returns a `Result`, never panics on bad
//! caller input.

/// Kernel error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum OsError {
    // ============ OS state errors ============
    /// OS is not running yet (call `kernel_start` first).
    OsNotRunning = 1001,
    /// OS is already running.
    OsRunning = 1002,
    /// `kernel_init` has not been called.
    OsNotInit = 1003,
    /// No application task created before `kernel_start`.
    OsNoAppTask = 1004,

    // ============ Object errors ============
    /// Null argument, deleted object, or invalid handle.
    Null = 2001,
    /// Wrong object type for this handle.
    ObjType = 2002,
    /// Invalid size given at create time.
    InvalidSize = 2003,

    // ============ Blocking-call errors ============
    /// Non-blocking request could not complete immediately (pool/sem/mutex
    /// variant of "would block").
    Full = 3001,
    /// Non-blocking request had nothing available.
    Empty = 3002,
    /// Blocking call's timeout expired before the resource became
    /// available.
    Timeout = 3003,
    /// Semaphore post at max count with no waiters.
    Overflow = 3004,

    // ============ Mutex errors ============
    /// Calling task already owns this mutex (mutexes are non-recursive).
    Recursive = 4001,
    /// Caller does not own the mutex it tried to unlock.
    NotOwner = 4002,

    // ============ ISR-context errors ============
    /// Function cannot be called from interrupt context.
    CalledFromIsr = 5001,

    // ============ Scheduler errors ============
    /// Scheduler is locked.
    SchedLocked = 6001,
    /// Scheduler is not locked (unbalanced unlock).
    SchedNotLocked = 6002,

    // ============ Task errors ============
    /// Priority out of range.
    PrioInvalid = 7001,
    /// Requested stack size too small, or no size class fits.
    StkSizeInvalid = 7002,
    /// Cannot delete/suspend the idle task.
    TaskDelIdle = 7003,
    /// No more TCBs available (pool exhausted).
    TaskCreateFailed = 7004,
    /// Task handle does not refer to a delayed task.
    TaskNotDly = 7005,
    /// Task handle is not currently suspended.
    TaskNotSuspended = 7006,
    /// Operation unsupported while the task is blocked on a
    /// synchronization object (e.g. suspending it would require tracking
    /// a second independent state alongside its wait condition).
    TaskBlockedUnsupported = 7007,
}

/// Result type alias used throughout the kernel.
pub type OsResult<T> = Result<T, OsError>;
