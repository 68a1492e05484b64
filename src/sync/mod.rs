//! Synchronization primitives
//!
//! Contains semaphores, mutexes, and message queues, all pool-backed and
//! all waking waiters in strict FIFO order.

#[cfg(feature = "sem")]
pub mod sem;

#[cfg(feature = "mutex")]
pub mod mutex;

#[cfg(feature = "queue")]
pub mod queue;
