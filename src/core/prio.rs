//! Priority bitmap for O(1) highest-ready-priority lookup.
//!
//! One set bit per priority level with at least one ready task. Bit 31
//! corresponds to priority 0 (highest); `leading_zeros` finds the
//! highest-priority set bit directly, the same trick the original CLZ
//! based table used, just over a single word since this kernel's
//! priority range comfortably fits one `u32`.

use crate::config::{CFG_PRIO_IDLE, CFG_PRIO_LEVELS};
use crate::types::OsPrio;

const _: () = assert!(CFG_PRIO_LEVELS <= 32, "priority bitmap is a single u32");

pub struct PrioTable {
    bitmap: u32,
}

impl PrioTable {
    pub const fn new() -> Self {
        PrioTable { bitmap: 0 }
    }

    pub fn init(&mut self) {
        self.bitmap = 0;
    }

    #[inline]
    pub fn insert(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_LEVELS);
        self.bitmap |= 1 << (31 - prio as u32);
    }

    #[inline]
    pub fn remove(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_LEVELS);
        self.bitmap &= !(1 << (31 - prio as u32));
    }

    #[inline]
    pub fn is_set(&self, prio: OsPrio) -> bool {
        self.bitmap & (1 << (31 - prio as u32)) != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap == 0
    }

    /// Highest-priority (lowest-numbered) level with a ready task. Falls
    /// back to the idle priority when nothing else is set, since the
    /// idle task is always ready once the kernel has started.
    #[inline]
    pub fn highest(&self) -> OsPrio {
        if self.bitmap == 0 {
            CFG_PRIO_IDLE
        } else {
            self.bitmap.leading_zeros() as OsPrio
        }
    }
}

impl Default for PrioTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_reports_idle() {
        let table = PrioTable::new();
        assert!(table.is_empty());
        assert_eq!(table.highest(), CFG_PRIO_IDLE);
    }

    #[test]
    fn insert_remove_tracks_highest() {
        let mut table = PrioTable::new();

        table.insert(5);
        assert!(table.is_set(5));
        assert!(!table.is_set(4));
        assert_eq!(table.highest(), 5);

        table.insert(3);
        assert_eq!(table.highest(), 3);

        table.remove(3);
        assert_eq!(table.highest(), 5);

        table.remove(5);
        assert!(table.is_empty());
    }

    #[test]
    fn highest_ignores_insertion_order() {
        let mut table = PrioTable::new();

        table.insert(4);
        table.insert(2);
        table.insert(6);
        table.insert(0);

        assert_eq!(table.highest(), 0);
        table.remove(0);
        assert_eq!(table.highest(), 2);
        table.remove(2);
        assert_eq!(table.highest(), 4);
    }

    #[test]
    fn boundary_priorities() {
        let mut table = PrioTable::new();

        table.insert(CFG_PRIO_IDLE);
        assert_eq!(table.highest(), CFG_PRIO_IDLE);

        table.insert(CFG_PRIO_IDLE - 1);
        assert_eq!(table.highest(), CFG_PRIO_IDLE - 1);

        table.remove(CFG_PRIO_IDLE - 1);
        assert_eq!(table.highest(), CFG_PRIO_IDLE);
    }
}
