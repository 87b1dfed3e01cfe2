//! Software mocks of the `hil` traits, used only by unit tests across this
//! crate (host-side testing of `no_std` driver logic, the common pattern for
//! exercising embedded logic without hardware).

extern crate std;

use std::vec;
use std::vec::Vec;

use crate::error::BusError;
use crate::hil::{Clock, Direction, EepromBus, Led, UartLink, Watchdog};

/// A byte-addressable EEPROM backed by a plain `Vec`, starting all-0xFF the
/// way a blank/erased EEPROM reads.
pub struct MockEeprom {
    cells: Vec<u8>,
    pub write_count: usize,
    pub fail_next_write: bool,
}

impl MockEeprom {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![0xFFu8; size],
            write_count: 0,
            fail_next_write: false,
        }
    }

    /// XORs a byte at `addr` with `mask`, simulating storage corruption.
    pub fn corrupt(&mut self, addr: u16, mask: u8) {
        self.cells[addr as usize] ^= mask;
    }
}

impl EepromBus for MockEeprom {
    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), BusError> {
        let start = address as usize;
        buf.copy_from_slice(&self.cells[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), BusError> {
        if self.fail_next_write {
            self.fail_next_write = false;
            return Err(BusError);
        }
        let start = address as usize;
        self.cells[start..start + data.len()].copy_from_slice(data);
        self.write_count += 1;
        Ok(())
    }
}

/// An LED that just remembers whether it is lit, for asserting indicator
/// patterns in tests.
#[derive(Default)]
pub struct MockLed {
    pub lit: bool,
}

impl Led for MockLed {
    fn on(&mut self) {
        self.lit = true;
    }

    fn off(&mut self) {
        self.lit = false;
    }
}

/// A monotonic clock a test can advance by hand.
#[derive(Default)]
pub struct MockClock {
    pub now_ms: u32,
}

impl Clock for MockClock {
    fn now_ms(&self) -> u32 {
        self.now_ms
    }
}

/// A loopback-free UART: bytes written are captured, bytes to "receive" are
/// queued up by the test ahead of time.
#[derive(Default)]
pub struct MockUart {
    pub written: Vec<u8>,
    pub rx_queue: Vec<u8>,
}

impl UartLink for MockUart {
    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        self.written.push(byte);
        Ok(())
    }

    fn poll_byte(&mut self) -> Option<u8> {
        if self.rx_queue.is_empty() {
            None
        } else {
            Some(self.rx_queue.remove(0))
        }
    }
}

/// A software stepper co-processor: tracks phase/step math in a way tests
/// can both drive (via `finish_batch`) and assert against, standing in for
/// the real PIO hardware.
pub struct MockCoprocessor {
    pub running: bool,
    pub direction: Direction,
    pub entry_phase: u8,
    pub remaining: u32,
    pub half_step_period_us: u32,
}

impl Default for MockCoprocessor {
    fn default() -> Self {
        Self {
            running: false,
            direction: Direction::Clockwise,
            entry_phase: 0,
            remaining: 0,
            half_step_period_us: 0,
        }
    }
}

impl MockCoprocessor {
    /// Test helper: advances the in-flight batch by `steps` half-steps
    /// without completing it.
    pub fn advance(&mut self, steps: u32) {
        self.remaining = self.remaining.saturating_sub(steps);
        let delta = if self.direction == Direction::Clockwise {
            steps as i32
        } else {
            -(steps as i32)
        };
        self.entry_phase = (((self.entry_phase as i32 + delta).rem_euclid(8)) as u8) % 8;
        if self.remaining == 0 {
            self.running = false;
        }
    }
}

impl crate::hil::StepperCoprocessor for MockCoprocessor {
    fn start_batch(&mut self, direction: Direction, entry_phase: u8, step_count: u32) {
        self.direction = direction;
        self.entry_phase = entry_phase;
        self.remaining = step_count;
        self.running = step_count > 0;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn steps_remaining(&self) -> u32 {
        self.remaining
    }

    fn current_phase(&self) -> u8 {
        self.entry_phase
    }

    fn stop(&mut self) {
        self.running = false;
        self.remaining = 0;
    }

    fn set_half_step_period_us(&mut self, half_step_period_us: u32) {
        self.half_step_period_us = half_step_period_us;
    }
}

/// A software watchdog: records whether it was enabled and how many times
/// it was kicked, and lets a test pre-arm `caused_last_reset`.
#[derive(Default)]
pub struct MockWatchdog {
    pub enabled: bool,
    pub timeout_ms: u32,
    pub kick_count: u32,
    pub caused_last_reset: bool,
}

impl Watchdog for MockWatchdog {
    fn enable(&mut self, timeout_ms: u32) {
        self.enabled = true;
        self.timeout_ms = timeout_ms;
    }

    fn kick(&mut self) {
        self.kick_count += 1;
    }

    fn caused_last_reset(&self) -> bool {
        self.caused_last_reset
    }
}
