//! IRQ-shared input flags. Button and piezo interrupt handlers are the only
//! concurrent agents in this firmware; they communicate with the main loop
//! by setting `Cell`s guarded by a `critical_section::Mutex`, the
//! generalization of the teacher's `kernel::utilities::cells` idiom to a
//! bare-metal binary with no kernel-level grant regions.

use core::cell::Cell;
use critical_section::Mutex;

/// Edge-debounced level of the two user buttons, plus the piezo drop flag.
/// Each field follows a single contract: an interrupt handler sets it, and
/// exactly one main-loop consumer clears it after reading.
pub struct InputFlags {
    calib_btn_pressed: Mutex<Cell<bool>>,
    dispense_btn_pressed: Mutex<Cell<bool>>,
    dropped: Mutex<Cell<bool>>,
}

impl InputFlags {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            calib_btn_pressed: Mutex::new(Cell::new(false)),
            dispense_btn_pressed: Mutex::new(Cell::new(false)),
            dropped: Mutex::new(Cell::new(false)),
        }
    }

    /// Called from the debounced button IRQ: sets the calibrate-button flag
    /// to match the button's current (debounced) level.
    pub fn set_calib_button(&self, cs: critical_section::CriticalSection, pressed: bool) {
        self.calib_btn_pressed.borrow(cs).set(pressed);
    }

    /// Called from the debounced button IRQ: sets the dispense-button flag
    /// to match the button's current (debounced) level.
    pub fn set_dispense_button(&self, cs: critical_section::CriticalSection, pressed: bool) {
        self.dispense_btn_pressed.borrow(cs).set(pressed);
    }

    /// Called from the piezo falling-edge IRQ (not debounced).
    pub fn set_dropped(&self, cs: critical_section::CriticalSection) {
        self.dropped.borrow(cs).set(true);
    }

    /// Reads and clears the calibrate-button flag.
    pub fn take_calib_button(&self) -> bool {
        critical_section::with(|cs| {
            let cell = self.calib_btn_pressed.borrow(cs);
            let value = cell.get();
            cell.set(false);
            value
        })
    }

    /// Reads and clears the dispense-button flag.
    pub fn take_dispense_button(&self) -> bool {
        critical_section::with(|cs| {
            let cell = self.dispense_btn_pressed.borrow(cs);
            let value = cell.get();
            cell.set(false);
            value
        })
    }

    /// Reads and clears the piezo drop flag, so at most one drop per
    /// dispense cycle is counted.
    pub fn take_dropped(&self) -> bool {
        critical_section::with(|cs| {
            let cell = self.dropped.borrow(cs);
            let value = cell.get();
            cell.set(false);
            value
        })
    }
}

impl Default for InputFlags {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears_flag_after_reading() {
        let flags = InputFlags::new();
        critical_section::with(|cs| flags.set_dropped(cs));
        assert!(flags.take_dropped());
        assert!(!flags.take_dropped());
    }

    #[test]
    fn button_flags_are_independent() {
        let flags = InputFlags::new();
        critical_section::with(|cs| flags.set_calib_button(cs, true));
        assert!(flags.take_calib_button());
        assert!(!flags.take_dispense_button());
    }
}
