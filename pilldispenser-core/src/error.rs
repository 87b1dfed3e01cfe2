//! Error types shared across the persistence and stepper layers.
//!
//! Library code here never panics on an expected hardware or data failure;
//! callers get a `Result` and decide (the controller's recovery protocol is
//! the main consumer of that decision).

use core::fmt;

/// A bus-level failure reported by a `hil::EepromBus` or `hil::UartLink`
/// implementation. The core treats all such failures identically: the
/// operation did not complete, nothing was torn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError;

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("bus error")
    }
}

/// Failures the persistence layer can report to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceError {
    /// The underlying bus reported a failure.
    Bus,
    /// The stored record's CRC did not verify.
    CrcMismatch,
    /// The log ring is full and could not be wrapped (should be unreachable;
    /// `LogStore::append` always wraps instead of failing, this variant
    /// exists for future backends that cannot wrap in place).
    RingFull,
}

impl From<BusError> for PersistenceError {
    fn from(_: BusError) -> Self {
        PersistenceError::Bus
    }
}
