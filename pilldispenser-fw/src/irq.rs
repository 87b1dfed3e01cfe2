//! GPIO interrupt wiring: the two user buttons (20 ms debounce), the piezo
//! drop sensor (un-debounced falling edge), and the carousel opto-fork
//! (both edges, feeding the calibration state machines). All three share one
//! `IO_IRQ_BANK0` vector on the RP2040, the way the board's real interrupt
//! table dispatches it; this module is the single place that decides, per
//! pin, what a raw GPIO edge means.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;
use embedded_hal::digital::InputPin;
use pilldispenser_core::flags::InputFlags;
use pilldispenser_core::hil::OptoEdge;
use rp2040_hal::gpio::{DynPinId, FunctionSioInput, Interrupt, Pin, PullUp};
use rp2040_hal::pac;

const DEBOUNCE_MS: u32 = 20;

pub type IrqInputPin = Pin<DynPinId, FunctionSioInput, PullUp>;

pub struct IrqPins {
    pub calib_btn: IrqInputPin,
    pub dispense_btn: IrqInputPin,
    pub piezo: IrqInputPin,
    pub opto: IrqInputPin,
}

struct Debounce {
    pins: IrqPins,
    calib_last_change_ms: u32,
    dispense_last_change_ms: u32,
}

static PINS: Mutex<RefCell<Option<Debounce>>> = Mutex::new(RefCell::new(None));
static OPTO_EDGE: Mutex<Cell<Option<OptoEdge>>> = Mutex::new(Cell::new(None));

/// Shared with the main loop: `InputFlags::take_*` drains what this module's
/// handlers set.
pub static INPUT_FLAGS: InputFlags = InputFlags::new();

fn now_ms() -> u32 {
    // SAFETY: reads the free-running timer's raw counter register; never
    // races a concurrent write because nothing else in this firmware writes
    // it.
    let timer = unsafe { &*pac::TIMER::ptr() };
    (timer.timerawl().read().bits() / 1000) as u32
}

/// Installs the four interrupt-capable pins and arms their edge interrupts.
/// Call once during board bring-up, before interrupts are unmasked in the
/// NVIC.
pub fn init(pins: IrqPins) {
    pins.calib_btn.set_interrupt_enabled(Interrupt::EdgeLow, true);
    pins.calib_btn.set_interrupt_enabled(Interrupt::EdgeHigh, true);
    pins.dispense_btn.set_interrupt_enabled(Interrupt::EdgeLow, true);
    pins.dispense_btn.set_interrupt_enabled(Interrupt::EdgeHigh, true);
    pins.piezo.set_interrupt_enabled(Interrupt::EdgeLow, true);
    pins.opto.set_interrupt_enabled(Interrupt::EdgeLow, true);
    pins.opto.set_interrupt_enabled(Interrupt::EdgeHigh, true);

    critical_section::with(|cs| {
        *PINS.borrow(cs).borrow_mut() = Some(Debounce {
            pins,
            calib_last_change_ms: 0,
            dispense_last_change_ms: 0,
        });
    });
}

/// Called from the board's `#[interrupt] fn IO_IRQ_BANK0()`.
pub fn on_io_irq() {
    let now = now_ms();
    critical_section::with(|cs| {
        let mut slot = PINS.borrow(cs).borrow_mut();
        let Some(db) = slot.as_mut() else { return };

        if db.pins.calib_btn.clear_interrupt(Interrupt::EdgeLow)
            || db.pins.calib_btn.clear_interrupt(Interrupt::EdgeHigh)
        {
            if now.wrapping_sub(db.calib_last_change_ms) >= DEBOUNCE_MS {
                db.calib_last_change_ms = now;
                let pressed = db.pins.calib_btn.is_low().unwrap_or(false);
                INPUT_FLAGS.set_calib_button(cs, pressed);
            }
        }

        if db.pins.dispense_btn.clear_interrupt(Interrupt::EdgeLow)
            || db.pins.dispense_btn.clear_interrupt(Interrupt::EdgeHigh)
        {
            if now.wrapping_sub(db.dispense_last_change_ms) >= DEBOUNCE_MS {
                db.dispense_last_change_ms = now;
                let pressed = db.pins.dispense_btn.is_low().unwrap_or(false);
                INPUT_FLAGS.set_dispense_button(cs, pressed);
            }
        }

        if db.pins.piezo.clear_interrupt(Interrupt::EdgeLow) {
            INPUT_FLAGS.set_dropped(cs);
        }

        if db.pins.opto.clear_interrupt(Interrupt::EdgeLow) {
            OPTO_EDGE.borrow(cs).set(Some(OptoEdge::Falling));
        }
        if db.pins.opto.clear_interrupt(Interrupt::EdgeHigh) {
            OPTO_EDGE.borrow(cs).set(Some(OptoEdge::Rising));
        }
    });
}

/// Drains the most recent opto-fork edge, if any arrived since the last
/// call. The calibration state machines only ever need the latest one: they
/// re-arm for the next edge as part of handling this one.
pub fn take_opto_edge() -> Option<OptoEdge> {
    critical_section::with(|cs| OPTO_EDGE.borrow(cs).take())
}
