//! Millisecond `hil::Clock` over the RP2040's always-running timer.

use pilldispenser_core::hil::Clock;
use rp2040_hal::Timer;

pub struct HalClock {
    timer: Timer,
}

impl HalClock {
    pub fn new(timer: Timer) -> Self {
        Self { timer }
    }
}

impl Clock for HalClock {
    fn now_ms(&self) -> u32 {
        (self.timer.get_counter().ticks() / 1000) as u32
    }
}
