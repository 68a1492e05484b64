//! Black-box integration tests: only the public API surface a dependent
//! crate would see, run in a separate process from the crate's own
//! `#[cfg(test)]` unit tests.

#[cfg(test)]
mod config_tests {
    use preemptrs::config::*;

    #[test]
    fn priority_levels_cover_the_whole_range() {
        assert_eq!(CFG_PRIO_LEVELS, MAX_PRIORITY as usize + 1);
        assert_eq!(CFG_PRIO_IDLE, MAX_PRIORITY, "idle always runs at the lowest priority");
    }

    #[test]
    fn pool_sizes_fit_a_single_bitmap_word() {
        assert!(MAX_TASKS <= 32);
        assert!(MAX_SEMAPHORES <= 32);
        assert!(MAX_MUTEXES <= 32);
        assert!(MAX_QUEUES <= 32);
    }

    #[test]
    fn stack_size_classes_are_strictly_increasing() {
        assert!(STACK_SMALL_WORDS < STACK_DEFAULT_WORDS);
        assert!(STACK_DEFAULT_WORDS < STACK_LARGE_WORDS);
        assert!(STACK_SMALL_WORDS >= CFG_STK_SIZE_MIN);
    }

    #[test]
    fn buffer_size_classes_are_strictly_increasing() {
        assert!(BUFFER_SMALL_BYTES < BUFFER_MEDIUM_BYTES);
        assert!(BUFFER_MEDIUM_BYTES < BUFFER_LARGE_BYTES);
    }

    #[test]
    fn wait_forever_is_the_tick_type_sentinel() {
        assert_eq!(WAIT_FOREVER, u32::MAX);
    }
}

#[cfg(test)]
mod error_tests {
    use preemptrs::error::OsError;

    #[test]
    fn variants_compare_by_identity_not_discriminant_range() {
        assert_eq!(OsError::Timeout, OsError::Timeout);
        assert_ne!(OsError::Timeout, OsError::Overflow);
        assert_ne!(OsError::OsNotRunning, OsError::OsNotInit);
    }

    #[test]
    fn every_variant_formats_for_debugging() {
        let all = [
            OsError::OsNotRunning,
            OsError::OsRunning,
            OsError::OsNotInit,
            OsError::OsNoAppTask,
            OsError::Null,
            OsError::ObjType,
            OsError::InvalidSize,
            OsError::Full,
            OsError::Empty,
            OsError::Timeout,
            OsError::Overflow,
            OsError::Recursive,
            OsError::NotOwner,
            OsError::CalledFromIsr,
            OsError::SchedLocked,
            OsError::SchedNotLocked,
            OsError::PrioInvalid,
            OsError::StkSizeInvalid,
            OsError::TaskDelIdle,
            OsError::TaskCreateFailed,
            OsError::TaskNotDly,
            OsError::TaskNotSuspended,
            OsError::TaskBlockedUnsupported,
        ];
        for e in all {
            assert!(!format!("{e:?}").is_empty());
        }
    }
}

#[cfg(test)]
mod types_tests {
    use preemptrs::types::{OsObjType, TaskState, WaitKind, WakeReason};

    #[test]
    fn task_state_variants_are_distinct() {
        assert_eq!(TaskState::Ready, TaskState::Ready);
        assert_ne!(TaskState::Ready, TaskState::Running);
        assert_ne!(TaskState::Blocked, TaskState::Suspended);
        assert_ne!(TaskState::Deleted, TaskState::Ready);
    }

    #[test]
    fn wait_kind_distinguishes_send_from_receive() {
        assert_ne!(WaitKind::QueueSend, WaitKind::QueueReceive);
        assert_ne!(WaitKind::Semaphore, WaitKind::Mutex);
    }

    #[test]
    fn wake_reason_distinguishes_timeout_from_data() {
        assert_ne!(WakeReason::Timeout, WakeReason::DataAvailable);
        assert_ne!(WakeReason::Signal, WakeReason::None);
    }

    #[test]
    fn obj_type_tags_are_distinct_nonzero_values() {
        assert_ne!(OsObjType::Sem, OsObjType::Mutex);
        assert_ne!(OsObjType::Mutex, OsObjType::Queue);
        assert_eq!(OsObjType::None as u32, 0);
    }
}

// `kernel_init` succeeds exactly once per process, and `kernel_start`
// never returns on success (there is no real dispatcher to hand control
// to off-device) and so can't be called from a host test at all. Every
// scenario that only needs `kernel_init` therefore shares this one test
// function, same rationale as the crate's own unit tests; what it
// demonstrates here is that the public API uniformly refuses blocking
// operations before the kernel is actually running, rather than
// pretending to succeed.
#[cfg(test)]
mod smoke_test {
    use preemptrs::config::STACK_SMALL_WORDS;
    use preemptrs::mutex::{mutex_create, mutex_delete, mutex_lock, mutex_unlock};
    use preemptrs::queue::{queue_create, queue_delete, queue_receive_immediate, queue_send_immediate};
    use preemptrs::sem::{sem_create, sem_delete, sem_get_count, sem_post, sem_try_wait};
    use preemptrs::{kernel_init, task_create, task_delete, OsError};

    fn dummy(_: *mut ()) -> ! {
        loop {}
    }

    #[test]
    fn public_facade_before_kernel_start() {
        kernel_init().expect("kernel_init should succeed exactly once");
        assert_eq!(kernel_init(), Err(OsError::OsRunning));

        // task_create itself doesn't require a running kernel: it just
        // populates a ready queue for whenever `kernel_start` picks a
        // task to dispatch.
        let t = task_create("worker", dummy, core::ptr::null_mut(), 5, STACK_SMALL_WORDS)
            .expect("task_create should succeed with free pool slots");
        assert_eq!(task_delete(Some(t)), Err(OsError::OsNotRunning));

        let sem = sem_create(0, 4, "smoke_sem").expect("sem_create should succeed");
        unsafe {
            // `pend` refuses before the kernel is running even for a
            // non-blocking attempt, rather than reporting the count.
            assert_eq!(sem_try_wait(sem), Err(OsError::OsNotRunning));
            // `post` never blocks, so it has no such guard and works
            // the moment the semaphore exists.
            assert_eq!(sem_post(sem), Ok(1));
            assert_eq!(sem_get_count(sem), 1);
            sem_delete(sem).expect("sem_delete should succeed");
        }

        let mtx = mutex_create("smoke_mtx").expect("mutex_create should succeed");
        unsafe {
            assert_eq!(mutex_lock(mtx, 0), Err(OsError::OsNotRunning));
            // `post` has no running-kernel guard of its own; with no
            // current task to resolve, it fails looking one up instead.
            assert_eq!(mutex_unlock(mtx), Err(OsError::Null));
            mutex_delete(mtx).expect("mutex_delete should succeed");
        }

        let q = queue_create(4, core::mem::size_of::<u32>(), "smoke_q").expect("queue_create should succeed");
        unsafe {
            let v: u32 = 42;
            assert_eq!(
                queue_send_immediate(q, &v as *const u32 as *const u8),
                Err(OsError::OsNotRunning)
            );
            let mut out: u32 = 0;
            assert_eq!(
                queue_receive_immediate(q, &mut out as *mut u32 as *mut u8),
                Err(OsError::OsNotRunning)
            );
            queue_delete(q).expect("queue_delete should succeed");
        }
    }
}
