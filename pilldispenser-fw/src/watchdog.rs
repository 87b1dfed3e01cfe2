//! Thin `hil::Watchdog` wrapper over `rp2040_hal::Watchdog`. The RP2040's
//! watchdog latches whether it caused the last reset in `WATCHDOG.REASON`,
//! which `rp2040-hal` exposes directly.

use pilldispenser_core::hil::Watchdog as WatchdogHil;
use rp2040_hal::Watchdog;

pub struct HalWatchdog {
    inner: Watchdog,
}

impl HalWatchdog {
    pub fn new(inner: Watchdog) -> Self {
        Self { inner }
    }

    /// Reads the sticky reset-cause register. Must be called before the
    /// first `enable`, which starts counting down again.
    pub fn caused_last_reset(watchdog_regs: &rp2040_hal::pac::WATCHDOG) -> bool {
        watchdog_regs.reason().read().timer().bit_is_set()
    }
}

impl WatchdogHil for HalWatchdog {
    fn enable(&mut self, timeout_ms: u32) {
        self.inner.start(fugit::MicrosDurationU32::millis(timeout_ms));
    }

    fn kick(&mut self) {
        self.inner.feed();
    }

    fn caused_last_reset(&self) -> bool {
        // The real answer is read once, before `enable` is ever called, via
        // `Self::caused_last_reset` and passed to `DispenserController::boot`
        // directly; nothing in this firmware calls this trait method.
        false
    }
}
