//! Four LED animation patterns, generic over `hil::Led`, driven by a
//! free-running millisecond clock and the controller's current state.
//! Grounded in the teacher's `capsules::led` abstraction: a pattern object
//! owns no hardware state beyond the LED slice and a phase counter.

use crate::hil::{Clock, Led};

const WAIT_PERIOD_MS: u32 = 500;
const CALIBRATION_STEP_MS: u32 = 500;
const RUN_STEP_MS: u32 = 200;
const ERROR_PERIOD_MS: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Wait,
    Calibration,
    Run,
    Error,
}

/// Drives `N` LEDs (the reference board has 3) through one of the four
/// patterns. `tick` is idempotent within the same millisecond and cheap
/// enough to call unconditionally every main-loop iteration.
pub struct Indicator<L: Led, const N: usize> {
    leds: [L; N],
    pattern: Pattern,
    last_step_ms: u32,
    chase_index: usize,
    blinks_remaining: u8,
    lit: bool,
}

impl<L: Led, const N: usize> Indicator<L, N> {
    pub fn new(leds: [L; N]) -> Self {
        Self {
            leds,
            pattern: Pattern::Wait,
            last_step_ms: 0,
            chase_index: 0,
            blinks_remaining: 0,
            lit: false,
        }
    }

    /// Switches pattern, resetting phase. For `Error`, also arms the blink
    /// counter (`ERROR_BLINK_TIMES` on/off cycles).
    pub fn set_pattern(&mut self, pattern: Pattern, now_ms: u32, blink_times: u8) {
        self.pattern = pattern;
        self.last_step_ms = now_ms;
        self.chase_index = 0;
        self.lit = false;
        self.blinks_remaining = if pattern == Pattern::Error { blink_times } else { 0 };
        self.all_off();
    }

    /// Advances the active pattern if its step period has elapsed. Returns
    /// `true` once an `Error` pattern has completed its blink count (the
    /// caller then moves the controller on from `PILL_NOT_DROPPED`).
    pub fn tick(&mut self, clock: &dyn Clock) -> bool {
        let now = clock.now_ms();
        let step_ms = match self.pattern {
            Pattern::Wait => WAIT_PERIOD_MS,
            Pattern::Calibration => CALIBRATION_STEP_MS,
            Pattern::Run => RUN_STEP_MS,
            Pattern::Error => ERROR_PERIOD_MS,
        };
        if now.wrapping_sub(self.last_step_ms) < step_ms {
            return false;
        }
        self.last_step_ms = now;

        match self.pattern {
            Pattern::Wait | Pattern::Error => {
                self.lit = !self.lit;
                if self.lit {
                    self.all_on();
                } else {
                    self.all_off();
                }
                if self.pattern == Pattern::Error && !self.lit {
                    self.blinks_remaining = self.blinks_remaining.saturating_sub(1);
                    if self.blinks_remaining == 0 {
                        return true;
                    }
                }
            }
            Pattern::Calibration | Pattern::Run => {
                self.all_off();
                if N > 0 {
                    self.leds[self.chase_index % N].on();
                    self.chase_index = (self.chase_index + 1) % N;
                }
            }
        }
        false
    }

    fn all_on(&mut self) {
        for led in &mut self.leds {
            led.on();
        }
    }

    fn all_off(&mut self) {
        for led in &mut self.leds {
            led.off();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockClock, MockLed};

    #[test]
    fn wait_pattern_toggles_all_leds_together() {
        let mut indicator: Indicator<MockLed, 3> = Indicator::new(core::array::from_fn(|_| MockLed::default()));
        let mut clock = MockClock::default();
        indicator.set_pattern(Pattern::Wait, clock.now_ms, 5);

        clock.now_ms = 500;
        indicator.tick(&clock);
        assert!(indicator.leds.iter().all(|l| l.lit));

        clock.now_ms = 1000;
        indicator.tick(&clock);
        assert!(indicator.leds.iter().all(|l| !l.lit));
    }

    #[test]
    fn run_pattern_chases_one_hot() {
        let mut indicator: Indicator<MockLed, 3> = Indicator::new(core::array::from_fn(|_| MockLed::default()));
        let mut clock = MockClock::default();
        indicator.set_pattern(Pattern::Run, clock.now_ms, 0);

        clock.now_ms = 200;
        indicator.tick(&clock);
        let lit_count = indicator.leds.iter().filter(|l| l.lit).count();
        assert_eq!(lit_count, 1);
    }

    #[test]
    fn error_pattern_reports_done_after_blink_budget() {
        let mut indicator: Indicator<MockLed, 3> = Indicator::new(core::array::from_fn(|_| MockLed::default()));
        let mut clock = MockClock::default();
        indicator.set_pattern(Pattern::Error, clock.now_ms, 2);

        let mut done = false;
        for step in 1..=8u32 {
            clock.now_ms = step * ERROR_PERIOD_MS;
            done = indicator.tick(&clock) || done;
        }
        assert!(done);
    }
}
