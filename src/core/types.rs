//! Core type aliases and small enums shared across the kernel.

/// Task priority (0 = highest priority).
pub type OsPrio = u8;

/// Tick counter type; wraps at `u32::MAX`.
pub type OsTick = u32;

/// Semaphore counter type.
pub type OsSemCtr = u32;

/// Stack element type (native word size used for saved context frames).
pub type OsStkElement = u32;

/// Task state, matching the lifecycle a task can be observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Ready = 0,
    Running = 1,
    Blocked = 2,
    Suspended = 3,
    Deleted = 4,
}

/// What kind of object a blocked task is waiting on. Used together with
/// `OsTcb::waiting_on` to interpret the raw pointer stashed there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WaitKind {
    None = 0,
    Semaphore = 1,
    Mutex = 2,
    QueueSend = 3,
    QueueReceive = 4,
}

/// Why a blocked task was woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WakeReason {
    /// Not currently blocked / not yet resolved.
    None = 0,
    /// The resource became available (token handed off, ownership
    /// transferred, or a queue slot/item became available).
    DataAvailable = 1,
    /// The armed timeout fired first.
    Timeout = 2,
    /// The object the task was waiting on was destroyed.
    Signal = 3,
}

/// Kernel object type marker, used for a cheap sanity check that a handle
/// still refers to the kind of object its caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OsObjType {
    None = 0,
    Sem = 0x53454D41,   // 'SEMA'
    Mutex = 0x4D555458, // 'MUTX'
    Queue = 0x51554555, // 'QUEU'
}
