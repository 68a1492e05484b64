//! Fixed-capacity circular buffer over externally supplied storage.
//!
//! The buffer never allocates: a caller (the queue module, backed by a
//! memory pool) hands it a raw byte region and is responsible for
//! returning it when done. Capacity is rounded up to a power of two so
//! index advance is a mask instead of a modulo.

use core::ptr;

use super::error::{OsError, OsResult};

pub struct CircularBuffer {
    storage: *mut u8,
    element_size: usize,
    /// Capacity in elements, always a power of two.
    capacity: usize,
    mask: usize,
    head: usize,
    tail: usize,
    len: usize,
}

impl CircularBuffer {
    /// An empty, unusable buffer (no storage attached yet).
    pub const fn empty() -> Self {
        Self {
            storage: core::ptr::null_mut(),
            element_size: 0,
            capacity: 0,
            mask: 0,
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Attach `storage` (at least `next_pow2(requested_capacity) *
    /// element_size` bytes) as this buffer's backing region.
    pub fn init(
        &mut self,
        storage: *mut u8,
        requested_capacity: usize,
        element_size: usize,
    ) -> OsResult<()> {
        if storage.is_null() {
            return Err(OsError::Null);
        }
        if requested_capacity == 0 || element_size == 0 {
            return Err(OsError::InvalidSize);
        }

        let capacity = requested_capacity.next_power_of_two();
        self.storage = storage;
        self.element_size = element_size;
        self.capacity = capacity;
        self.mask = capacity - 1;
        self.head = 0;
        self.tail = 0;
        self.len = 0;
        Ok(())
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.capacity - self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }

    /// Copy `element_size` bytes from `item` into the next free slot.
    ///
    /// # Safety
    /// `item` must point to at least `element_size` readable bytes.
    pub unsafe fn put(&mut self, item: *const u8) -> OsResult<()> {
        if item.is_null() {
            return Err(OsError::Null);
        }
        if self.is_full() {
            return Err(OsError::Full);
        }
        unsafe {
            let dst = self.storage.add(self.tail * self.element_size);
            ptr::copy_nonoverlapping(item, dst, self.element_size);
        }
        self.tail = (self.tail + 1) & self.mask;
        self.len += 1;
        Ok(())
    }

    /// Copy `element_size` bytes out of the oldest occupied slot into
    /// `out`.
    ///
    /// # Safety
    /// `out` must point to at least `element_size` writable bytes.
    pub unsafe fn get(&mut self, out: *mut u8) -> OsResult<()> {
        if out.is_null() {
            return Err(OsError::Null);
        }
        if self.is_empty() {
            return Err(OsError::Empty);
        }
        unsafe {
            let src = self.storage.add(self.head * self.element_size);
            ptr::copy_nonoverlapping(src, out, self.element_size);
        }
        self.head = (self.head + 1) & self.mask;
        self.len -= 1;
        Ok(())
    }

    /// Copy the oldest occupied slot into `out` without removing it.
    ///
    /// # Safety
    /// `out` must point to at least `element_size` writable bytes.
    pub unsafe fn peek(&self, out: *mut u8) -> OsResult<()> {
        if out.is_null() {
            return Err(OsError::Null);
        }
        if self.is_empty() {
            return Err(OsError::Empty);
        }
        unsafe {
            let src = self.storage.add(self.head * self.element_size);
            ptr::copy_nonoverlapping(src, out, self.element_size);
        }
        Ok(())
    }

    /// Detach the storage pointer, returning the buffer to an empty,
    /// unusable state. The caller is responsible for returning the memory
    /// to its pool.
    pub fn deinit(&mut self) -> *mut u8 {
        let storage = self.storage;
        *self = Self::empty();
        storage
    }
}

// SAFETY: the storage pointer is only ever dereferenced while the owning
// queue is manipulated inside a critical section.
unsafe impl Send for CircularBuffer {}
unsafe impl Sync for CircularBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_capacity_up_to_power_of_two() {
        let mut storage = [0u8; 4 * 4];
        let mut cb = CircularBuffer::empty();
        cb.init(storage.as_mut_ptr(), 3, 4).unwrap();
        assert_eq!(cb.capacity(), 4);

        let mut storage2 = [0u8; 8 * 4];
        let mut cb2 = CircularBuffer::empty();
        cb2.init(storage2.as_mut_ptr(), 8, 4).unwrap();
        assert_eq!(cb2.capacity(), 8);
    }

    #[test]
    fn put_get_round_trip_preserves_bytes() {
        let mut storage = [0u8; 4 * 4];
        let mut cb = CircularBuffer::empty();
        cb.init(storage.as_mut_ptr(), 4, 4).unwrap();

        for v in [10i32, 20, 30, 40] {
            unsafe { cb.put(&v as *const i32 as *const u8).unwrap() };
        }
        assert!(cb.is_full());

        let mut out = 0i32;
        unsafe { cb.get(&mut out as *mut i32 as *mut u8).unwrap() };
        assert_eq!(out, 10);

        unsafe { cb.put(&50i32 as *const i32 as *const u8).unwrap() };

        let mut results = vec![];
        while !cb.is_empty() {
            let mut v = 0i32;
            unsafe { cb.get(&mut v as *mut i32 as *mut u8).unwrap() };
            results.push(v);
        }
        assert_eq!(results, vec![20, 30, 40, 50]);
    }

    #[test]
    fn full_and_empty_are_reported() {
        let mut storage = [0u8; 2 * 4];
        let mut cb = CircularBuffer::empty();
        cb.init(storage.as_mut_ptr(), 2, 4).unwrap();

        let mut out = 0i32;
        assert_eq!(
            unsafe { cb.get(&mut out as *mut i32 as *mut u8) },
            Err(OsError::Empty)
        );

        unsafe { cb.put(&1i32 as *const i32 as *const u8).unwrap() };
        unsafe { cb.put(&2i32 as *const i32 as *const u8).unwrap() };
        assert_eq!(
            unsafe { cb.put(&3i32 as *const i32 as *const u8) },
            Err(OsError::Full)
        );
    }
}
