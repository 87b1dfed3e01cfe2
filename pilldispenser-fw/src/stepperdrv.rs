//! Stepper co-processor backed by a free-running hardware timer alarm
//! instead of the RP2040's PIO block: `TIMER_IRQ_0` reloads the alarm every
//! half-step period and walks the four phase pins, so the core's stepper
//! engine only ever issues a batch and polls completion, exactly as
//! `hil::StepperCoprocessor` requires. A PIO program would do the same job
//! with less CPU involvement per step, but needs the `pio`/`pio-proc`
//! toolchain; a timer alarm needs nothing beyond what's already in the
//! dependency stack and easily keeps up with the dispenser's step rates.

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::digital::OutputPin;
use pilldispenser_core::hil::{Direction, StepperCoprocessor};
use rp2040_hal::gpio::{DynPinId, FunctionSioOutput, Pin, PullDown};
use rp2040_hal::timer::{Alarm, Alarm0};

const HALF_STEP_PHASES: [u8; 8] = [0x1, 0x3, 0x2, 0x6, 0x4, 0xC, 0x8, 0x9];

type PhasePin = Pin<DynPinId, FunctionSioOutput, PullDown>;

struct Runtime {
    phase_pins: [PhasePin; 4],
    alarm: Alarm0,
    direction: Direction,
    phase: u8,
    remaining: u32,
    half_step_period_us: u32,
}

impl Runtime {
    fn latch(&mut self) {
        let bits = HALF_STEP_PHASES[self.phase as usize];
        for (i, pin) in self.phase_pins.iter_mut().enumerate() {
            if bits & (1 << i) != 0 {
                pin.set_high().ok();
            } else {
                pin.set_low().ok();
            }
        }
    }

    fn step(&mut self) {
        let delta = if self.direction == Direction::Clockwise { 1i8 } else { -1i8 };
        self.phase = ((self.phase as i8 + delta).rem_euclid(8)) as u8;
        self.latch();
    }
}

static RUNTIME: Mutex<RefCell<Option<Runtime>>> = Mutex::new(RefCell::new(None));

/// Handle implementing `hil::StepperCoprocessor`; zero-sized, all state
/// lives in the module-level `RUNTIME` so the timer IRQ can reach it too.
#[derive(Default, Clone, Copy)]
pub struct TimerStepper;

impl TimerStepper {
    /// Installs the phase pins and alarm into the shared runtime. Call once
    /// during board bring-up, before the controller can issue a batch.
    pub fn init(phase_pins: [PhasePin; 4], mut alarm: Alarm0) {
        alarm.enable_interrupt();
        critical_section::with(|cs| {
            *RUNTIME.borrow(cs).borrow_mut() = Some(Runtime {
                phase_pins,
                alarm,
                direction: Direction::Clockwise,
                phase: 0,
                remaining: 0,
                half_step_period_us: 2000,
            });
        });
    }
}

impl StepperCoprocessor for TimerStepper {
    fn start_batch(&mut self, direction: Direction, entry_phase: u8, step_count: u32) {
        critical_section::with(|cs| {
            let mut slot = RUNTIME.borrow(cs).borrow_mut();
            let rt = slot.as_mut().expect("stepper runtime not initialized");
            rt.direction = direction;
            rt.phase = entry_phase % 8;
            rt.remaining = step_count;
            rt.latch();
            if step_count > 0 {
                let period = rt.half_step_period_us;
                rt.alarm.schedule(fugit::MicrosDurationU32::micros(period)).ok();
            }
        });
    }

    fn is_running(&self) -> bool {
        critical_section::with(|cs| {
            RUNTIME
                .borrow(cs)
                .borrow()
                .as_ref()
                .map(|rt| rt.remaining > 0)
                .unwrap_or(false)
        })
    }

    fn steps_remaining(&self) -> u32 {
        critical_section::with(|cs| {
            RUNTIME
                .borrow(cs)
                .borrow()
                .as_ref()
                .map(|rt| rt.remaining)
                .unwrap_or(0)
        })
    }

    fn current_phase(&self) -> u8 {
        critical_section::with(|cs| {
            RUNTIME
                .borrow(cs)
                .borrow()
                .as_ref()
                .map(|rt| rt.phase)
                .unwrap_or(0)
        })
    }

    fn stop(&mut self) {
        critical_section::with(|cs| {
            let mut slot = RUNTIME.borrow(cs).borrow_mut();
            if let Some(rt) = slot.as_mut() {
                rt.remaining = 0;
                rt.alarm.disable_interrupt();
            }
        });
    }

    fn set_half_step_period_us(&mut self, half_step_period_us: u32) {
        critical_section::with(|cs| {
            let mut slot = RUNTIME.borrow(cs).borrow_mut();
            if let Some(rt) = slot.as_mut() {
                rt.half_step_period_us = half_step_period_us;
            }
        });
    }
}

/// Called from the board's `#[interrupt] fn TIMER_IRQ_0()`. Advances one
/// half-step and reschedules, or disables the alarm once the batch is done.
pub fn on_timer_irq() {
    critical_section::with(|cs| {
        let mut slot = RUNTIME.borrow(cs).borrow_mut();
        let Some(rt) = slot.as_mut() else { return };
        rt.alarm.clear_interrupt();
        if rt.remaining == 0 {
            return;
        }
        rt.step();
        rt.remaining -= 1;
        if rt.remaining > 0 {
            let period = rt.half_step_period_us;
            rt.alarm.schedule(fugit::MicrosDurationU32::micros(period)).ok();
        } else {
            rt.alarm.disable_interrupt();
        }
    });
}
