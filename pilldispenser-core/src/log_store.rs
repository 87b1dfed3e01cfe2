//! Wrap-around event log: `MAX_LOGS` fixed-size slots written in strict
//! order, wrapped (and bulk-zeroed) when full.
//!
//! The log store owns the "next free slot" cursor itself rather than
//! threading it through `DeviceStatus` on every call (the distilled spec's
//! `unused_log_index` is explicitly volatile/not persisted; recomputing it
//! once at `init` via `find_first_free` and keeping it as private state is
//! the natural Rust shape for that — see DESIGN.md).

use core::cell::Cell;

use crate::codec::{self, LogEntry, LOG_SIZE};
use crate::error::PersistenceError;
use crate::hil::EepromBus;
use crate::message::MessageCode;

/// A decoded, still-valid log record paired with its slot index, returned by
/// `for_each_valid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedEvent {
    pub slot: usize,
    pub entry: LogEntry,
}

pub struct LogStore<B: EepromBus, const MAX_LOGS: usize> {
    bus: B,
    base_addr: u16,
    next_free: Cell<usize>,
}

impl<B: EepromBus, const MAX_LOGS: usize> LogStore<B, MAX_LOGS> {
    /// Builds the store and immediately runs `find_first_free` to recover
    /// the write cursor, the way the controller's boot sequence calls for.
    pub fn new(bus: B, base_addr: u16) -> Result<Self, PersistenceError> {
        let mut store = Self {
            bus,
            base_addr,
            next_free: Cell::new(0),
        };
        let first_free = store.find_first_free()?;
        store.next_free.set(first_free);
        Ok(store)
    }

    fn slot_addr(&self, slot: usize) -> u16 {
        self.base_addr + (slot * LOG_SIZE) as u16
    }

    fn read_slot(&mut self, slot: usize) -> Result<[u8; LOG_SIZE], PersistenceError> {
        let mut buf = [0u8; LOG_SIZE];
        let addr = self.slot_addr(slot);
        self.bus.read(addr, &mut buf)?;
        Ok(buf)
    }

    /// Scans slots `0..MAX_LOGS` for the first whose in-use byte is 0. If
    /// every slot is in use, wraps via `zero_all` and returns 0.
    pub fn find_first_free(&mut self) -> Result<usize, PersistenceError> {
        for slot in 0..MAX_LOGS {
            let buf = self.read_slot(slot)?;
            if buf[0] == 0 {
                return Ok(slot);
            }
        }
        self.zero_all()?;
        Ok(0)
    }

    /// Writes 0 to the in-use byte of every slot. The rest of each slot is
    /// left untouched; a stale CRC will make `for_each_valid` reject it.
    pub fn zero_all(&mut self) -> Result<(), PersistenceError> {
        for slot in 0..MAX_LOGS {
            let addr = self.slot_addr(slot);
            self.bus.write(addr, &[0u8])?;
        }
        Ok(())
    }

    /// Appends one event at the current cursor, advancing it (and wrapping
    /// via `zero_all` once the ring is full), in the order callers invoke
    /// this — so within one boot, log order matches call order.
    pub fn append(&mut self, code: MessageCode, timestamp_ms: u32) -> Result<usize, PersistenceError> {
        let slot = self.next_free.get();
        let entry = LogEntry::new(code.as_u8(), timestamp_ms);
        let mut buf = [0u8; LOG_SIZE];
        entry.encode(&mut buf);
        let addr = self.slot_addr(slot);
        self.bus.write(addr, &buf)?;

        if slot >= MAX_LOGS - 1 {
            self.zero_all()?;
            self.next_free.set(0);
        } else {
            self.next_free.set(slot + 1);
        }
        Ok(slot)
    }

    /// The slot the next `append` will use.
    #[must_use]
    pub fn next_free_slot(&self) -> usize {
        self.next_free.get()
    }

    /// Visits every slot whose in-use byte is 1 and whose CRC verifies, in
    /// slot order, invoking `f`. Slots with a bad CRC (failed partial
    /// writes) are silently skipped.
    pub fn for_each_valid<F>(&mut self, mut f: F) -> Result<(), PersistenceError>
    where
        F: FnMut(LoggedEvent),
    {
        for slot in 0..MAX_LOGS {
            let buf = self.read_slot(slot)?;
            if buf[0] != 1 {
                continue;
            }
            if let Some(entry) = codec::verify(&buf).then(|| LogEntry::decode(&buf)).flatten() {
                f(LoggedEvent { slot, entry });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockEeprom;

    fn new_store(size: usize) -> LogStore<MockEeprom, 4> {
        LogStore::new(MockEeprom::new(size), 0).unwrap()
    }

    #[test]
    fn find_first_free_on_blank_eeprom_is_zero() {
        let store = new_store(4 * LOG_SIZE);
        assert_eq!(store.next_free_slot(), 0);
    }

    #[test]
    fn append_advances_cursor_in_call_order() {
        let mut store = new_store(4 * LOG_SIZE);
        let s0 = store.append(MessageCode::Idle, 10).unwrap();
        let s1 = store.append(MessageCode::ButtonPress, 20).unwrap();
        assert_eq!((s0, s1), (0, 1));
        assert_eq!(store.next_free_slot(), 2);

        let mut seen = heapless::Vec::<(usize, u8), 4>::new();
        store
            .for_each_valid(|ev| {
                seen.push((ev.slot, ev.entry.message_code)).unwrap();
            })
            .unwrap();
        assert_eq!(
            seen.as_slice(),
            &[(0, MessageCode::Idle.as_u8()), (1, MessageCode::ButtonPress.as_u8())]
        );
    }

    #[test]
    fn ring_wraps_and_zeroes_on_last_slot() {
        // MAX_LOGS = 4: filling all four slots wraps to 0 on the 4th append.
        let mut store = new_store(4 * LOG_SIZE);
        for i in 0..4 {
            store.append(MessageCode::Idle, i).unwrap();
        }
        assert_eq!(store.next_free_slot(), 0);

        let mut count = 0usize;
        store.for_each_valid(|_| count += 1).unwrap();
        assert_eq!(count, 0, "zero_all must invalidate every slot's CRC");
    }

    #[test]
    fn thirty_three_appends_over_max_logs_32_wraps_once() {
        // End-to-end scenario 6: MAX_LOGS = 32, 33 appends in one boot.
        let mut store: LogStore<MockEeprom, 32> =
            LogStore::new(MockEeprom::new(32 * LOG_SIZE), 0).unwrap();
        for i in 0..33u32 {
            store.append(MessageCode::Idle, i).unwrap();
        }
        assert_eq!(store.find_first_free().unwrap(), 1);
    }

    #[test]
    fn partial_write_with_bad_crc_is_skipped() {
        let mut store = new_store(4 * LOG_SIZE);
        store.append(MessageCode::Idle, 5).unwrap();
        // Corrupt slot 0's payload in place, in_use byte stays 1.
        store.bus.corrupt(1, 0xAA);
        let mut count = 0usize;
        store.for_each_valid(|_| count += 1).unwrap();
        assert_eq!(count, 0);
    }
}
