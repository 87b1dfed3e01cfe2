//! Hardware interface layer.
//!
//! Every board-specific collaborator the core depends on is expressed here
//! as a trait, the same seam the teacher draws with `kernel::hil` (see e.g.
//! `kernel::hil::i2c::I2CDevice` consumed by `capsules_extra::at24c_eeprom`,
//! or `kernel::hil::flash::Flash` it in turn implements). Core modules are
//! generic over these traits and never name concrete hardware; the firmware
//! crate provides the real implementations, a software test harness provides
//! mocks.

use crate::error::BusError;

/// Blocking byte-addressed EEPROM access, modeled on the AT24-series
/// two-byte-address-then-data protocol described in the spec. Unlike the
/// teacher's async `hil::i2c`/`hil::flash::Flash` traits, this is
/// deliberately blocking: the spec requires the main loop to block for the
/// bounded write-cycle time rather than poll a completion callback.
pub trait EepromBus {
    /// Reads `buf.len()` bytes starting at `address`.
    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), BusError>;

    /// Writes `data` starting at `address` and blocks until the device's
    /// write-cycle time has elapsed, so the next call is safe to issue
    /// immediately.
    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), BusError>;
}

/// Direction of carousel rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    AntiClockwise,
}

impl Direction {
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Direction::Clockwise => Direction::AntiClockwise,
            Direction::AntiClockwise => Direction::Clockwise,
        }
    }
}

/// The programmable-I/O (or hardware timer) co-processor that walks the
/// eight half-step phase patterns for a batch of steps without further CPU
/// intervention, raising a completion interrupt at the end.
///
/// All methods are non-blocking: a batch start returns immediately, and
/// completion is observed later via `is_running` going false or via the
/// firmware's completion-IRQ handler calling back into the stepper engine.
pub trait StepperCoprocessor {
    /// Loads the step program for `direction` and the starting phase index,
    /// and begins walking `step_count` half-steps. Disables itself first if
    /// a batch is already running.
    fn start_batch(&mut self, direction: Direction, entry_phase: u8, step_count: u32);

    /// True between `start_batch` and the completion interrupt.
    fn is_running(&self) -> bool;

    /// Half-steps remaining in the in-flight batch (0 if idle).
    fn steps_remaining(&self) -> u32;

    /// The physical phase index (0..8) currently latched on the driver pins.
    fn current_phase(&self) -> u8;

    /// Immediately halts phase output, leaving `current_phase` valid, and
    /// discards any in-flight or queued batch.
    fn stop(&mut self);

    /// Programs the clock divider so that one half-step takes
    /// `half_step_period_us` microseconds. Must not be called while running.
    fn set_half_step_period_us(&mut self, half_step_period_us: u32);
}

/// Edges observed on the opto-fork since it was last polled, delivered by
/// the firmware's IRQ handler into a shared flag the calibration FSM drains
/// once per main-loop tick (see `core::flags`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptoEdge {
    Falling,
    Rising,
}

/// A single indicator LED or PWM-dimmed output.
pub trait Led {
    fn on(&mut self);
    fn off(&mut self);
}

/// A monotonic millisecond clock. Implemented by a hardware timer on the
/// board, and by a plain counter in tests.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

/// Non-blocking byte transport used by the LoRa shipper. Reads are polled,
/// never blocked on, matching the "stepper commands return immediately"
/// discipline in the concurrency model: nothing in the main loop may sleep
/// except the bounded EEPROM write-cycle wait.
pub trait UartLink {
    fn write_byte(&mut self, byte: u8) -> Result<(), BusError>;
    /// Returns the next received byte, if any, without blocking.
    fn poll_byte(&mut self) -> Option<u8>;
}

/// The hardware watchdog primitive. `kick` must be called at least once per
/// `timeout_ms` or the device resets.
pub trait Watchdog {
    fn enable(&mut self, timeout_ms: u32);
    fn kick(&mut self);
    /// True if the previous reset was caused by the watchdog firing (read
    /// once at boot from a sticky hardware reset-cause register).
    fn caused_last_reset(&self) -> bool;
}
