//! Intrusive doubly-linked list
//!
//! A zero-allocation membership primitive reused, unmodified, for ready
//! queues, delayed-task lists, and every synchronization object's wait
//! list. A node that carries a [`ListNode`] field can belong to one list
//! through that field at a time; `ListNode::is_linked` tells whether it
//! currently does.
//!
//! Each concrete list (ready queue, delayed list, wait list) is a distinct
//! [`List<T>`] instance operating on a distinct `ListNode<T>` field of the
//! element type, so a single `T` (the task control block) can sit on up to
//! three lists simultaneously through three separate fields. Call sites
//! pass a plain function pointer that picks out which field a given list
//! instance manipulates.

use core::ptr::NonNull;

/// Embedded link field. `prev`/`next` are `None` exactly when the node is
/// not currently a member of any list through this field.
pub struct ListNode<T> {
    prev: Option<NonNull<T>>,
    next: Option<NonNull<T>>,
}

impl<T> ListNode<T> {
    pub const fn new() -> Self {
        Self {
            prev: None,
            next: None,
        }
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.prev.is_some() || self.next.is_some()
    }
}

impl<T> Default for ListNode<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Accessor used by every operation below to reach a node's link field.
/// Implemented as a plain function pointer (rather than a capturing
/// closure) so lists can live in `static` storage.
pub type LinkOf<T> = unsafe fn(NonNull<T>) -> *mut ListNode<T>;

/// Sentinel head/tail of one intrusive list.
pub struct List<T> {
    head: Option<NonNull<T>>,
    tail: Option<NonNull<T>>,
}

impl<T> List<T> {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    pub fn init(&mut self) {
        self.head = None;
        self.tail = None;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[inline]
    pub fn head(&self) -> Option<NonNull<T>> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<NonNull<T>> {
        self.tail
    }

    /// Append `node` at the tail (the usual FIFO insertion for ready
    /// queues and wait lists).
    ///
    /// # Safety
    /// `node` must be valid and not already linked through `link`.
    pub unsafe fn insert_tail(&mut self, node: NonNull<T>, link: LinkOf<T>) {
        unsafe {
            let n = &mut *link(node);
            n.prev = self.tail;
            n.next = None;

            match self.tail {
                Some(tail) => (*link(tail)).next = Some(node),
                None => self.head = Some(node),
            }
            self.tail = Some(node);
        }
    }

    /// Insert `node` at the head (used for round-robin rotation and for
    /// priority-boost reinsertion).
    ///
    /// # Safety
    /// `node` must be valid and not already linked through `link`.
    pub unsafe fn insert_head(&mut self, node: NonNull<T>, link: LinkOf<T>) {
        unsafe {
            let n = &mut *link(node);
            n.next = self.head;
            n.prev = None;

            match self.head {
                Some(head) => (*link(head)).prev = Some(node),
                None => self.tail = Some(node),
            }
            self.head = Some(node);
        }
    }

    /// Insert `node` keeping the list sorted ascending by `key`, scanning
    /// from the head. Used for the delayed-task lists.
    ///
    /// # Safety
    /// `node` must be valid and not already linked through `link`.
    pub unsafe fn insert_sorted(
        &mut self,
        node: NonNull<T>,
        link: LinkOf<T>,
        key: impl Fn(NonNull<T>) -> u32,
    ) {
        unsafe {
            let node_key = key(node);
            let mut cursor = self.head;
            while let Some(cur) = cursor {
                if node_key <= key(cur) {
                    break;
                }
                cursor = (*link(cur)).next;
            }

            match cursor {
                Some(before) => {
                    let prev = (*link(before)).prev;
                    let n = &mut *link(node);
                    n.prev = prev;
                    n.next = Some(before);
                    (*link(before)).prev = Some(node);
                    match prev {
                        Some(p) => (*link(p)).next = Some(node),
                        None => self.head = Some(node),
                    }
                }
                None => self.insert_tail(node, link),
            }
        }
    }

    /// Unlink `node`, wherever it currently sits.
    ///
    /// # Safety
    /// `node` must currently be linked into this list through `link`.
    pub unsafe fn remove(&mut self, node: NonNull<T>, link: LinkOf<T>) {
        unsafe {
            let n = &mut *link(node);
            let (prev, next) = (n.prev, n.next);

            match prev {
                Some(p) => (*link(p)).next = next,
                None => self.head = next,
            }
            match next {
                Some(nx) => (*link(nx)).prev = prev,
                None => self.tail = prev,
            }

            let n = &mut *link(node);
            n.prev = None;
            n.next = None;
        }
    }

    /// Move `node` (currently the head) to the tail. Used for round-robin
    /// selection within a priority level.
    ///
    /// # Safety
    /// `node` must currently be linked into this list through `link`.
    pub unsafe fn move_to_tail(&mut self, node: NonNull<T>, link: LinkOf<T>) {
        unsafe {
            self.remove(node, link);
            self.insert_tail(node, link);
        }
    }

    /// Return the node after `node`, or `None` at the tail.
    ///
    /// # Safety
    /// `node` must currently be linked into this list through `link`.
    pub unsafe fn next_of(node: NonNull<T>, link: LinkOf<T>) -> Option<NonNull<T>> {
        unsafe { (*link(node)).next }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: lists are only ever mutated from inside a critical section.
unsafe impl<T> Send for List<T> {}
unsafe impl<T> Sync for List<T> {}

impl<T> Copy for List<T> {}
impl<T> Clone for List<T> {
    fn clone(&self) -> Self {
        *self
    }
}
