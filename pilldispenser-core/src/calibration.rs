//! Two IRQ-driven calibration procedures against the opto-fork. Both are
//! edge-driven state machines: the firmware's opto-fork interrupt handler
//! decides falling/rising and feeds that into `on_edge`, which is the only
//! place these FSMs touch the stepper engine. Neither has an internal
//! timeout — a carousel that never reaches the sensor is caught by the
//! watchdog, and the next boot simply re-enters calibration.

use crate::config::Config;
use crate::hil::{Direction, OptoEdge, StepperCoprocessor};
use crate::stepper::StepperEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FullPhase {
    SeekingGap,
    InGap,
    Centering,
    Done,
}

/// Full calibration: measures `step_max` (steps per revolution) and
/// `edge_steps` (width of the opto-fork gap) from scratch.
pub struct FullCalibration {
    phase: FullPhase,
    original_speed: f32,
    /// Raw `step_counter` observed at the first rising edge; finalized into
    /// `edge_steps` only once `step_max` is known (direction-normalized: for
    /// anticlockwise this is `step_max - raw`, not the raw value itself).
    raw_edge_marker: u32,
}

impl FullCalibration {
    /// Starts the seeking batch. `engine` must not be shared with the main
    /// loop again until `on_edge` reports completion.
    pub fn start<C: StepperCoprocessor>(engine: &mut StepperEngine<C>, cfg: &Config) -> Self {
        let original_speed = engine.speed_rpm();
        engine.set_calibrating(true);
        engine.set_calibrated(false);
        engine.set_speed(cfg.rpm_max);
        engine.set_step_counter(0);
        engine.turn_steps(cfg.calibration_seek_steps);
        Self {
            phase: FullPhase::SeekingGap,
            original_speed,
            raw_edge_marker: 0,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase == FullPhase::Done
    }

    /// Advances the FSM on one opto-fork edge. Returns `true` once
    /// calibration has completed (`step_max`/`edge_steps` recorded,
    /// `calibrated` set).
    pub fn on_edge<C: StepperCoprocessor>(
        &mut self,
        engine: &mut StepperEngine<C>,
        edge: OptoEdge,
        cfg: &Config,
    ) -> bool {
        match (self.phase, edge) {
            (FullPhase::SeekingGap, OptoEdge::Falling) => {
                engine.stop();
                engine.set_step_counter(0);
                engine.turn_steps(cfg.calibration_seek_steps);
                self.phase = FullPhase::InGap;
            }
            (FullPhase::InGap, OptoEdge::Rising) => {
                engine.stop();
                self.raw_edge_marker = engine.get_step_count();
                engine.turn_steps(cfg.calibration_seek_steps);
                self.phase = FullPhase::Centering;
            }
            (FullPhase::Centering, OptoEdge::Falling) => {
                engine.stop();
                let step_max = engine.get_step_count();
                let edge_steps = match engine.get_direction() {
                    Direction::Clockwise => self.raw_edge_marker,
                    Direction::AntiClockwise => step_max.saturating_sub(self.raw_edge_marker),
                };
                engine.set_step_max(step_max);
                engine.set_edge_steps(edge_steps);

                let center = match engine.get_direction() {
                    Direction::Clockwise => step_max.saturating_sub(edge_steps / 2),
                    Direction::AntiClockwise => edge_steps / 2,
                };
                engine.set_step_counter(center);
                engine.turn_steps(edge_steps / 2);

                engine.set_speed(self.original_speed);
                engine.set_calibrated(true);
                engine.set_calibrating(false);
                self.phase = FullPhase::Done;
                return true;
            }
            _ => {}
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HalfPhase {
    SeekingGapAntiClockwise,
    ReturningClockwise,
    Done,
}

/// Half calibration: reuses a previously measured `step_max`/`edge_steps`
/// and only re-zeros `step_counter`, optionally advancing so the next
/// served chamber lands under the chute.
pub struct HalfCalibration {
    phase: HalfPhase,
    pills_dispensed: u8,
}

impl HalfCalibration {
    pub fn start<C: StepperCoprocessor>(
        engine: &mut StepperEngine<C>,
        pills_dispensed: u8,
        cfg: &Config,
    ) -> Self {
        engine.set_calibrating(true);
        engine.set_calibrated(false);
        engine.set_speed(cfg.rpm_max);
        engine.set_direction(Direction::AntiClockwise);
        engine.turn_steps(cfg.calibration_seek_steps);
        Self {
            phase: HalfPhase::SeekingGapAntiClockwise,
            pills_dispensed,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase == HalfPhase::Done
    }

    pub fn on_edge<C: StepperCoprocessor>(
        &mut self,
        engine: &mut StepperEngine<C>,
        edge: OptoEdge,
        cfg: &Config,
    ) -> bool {
        match (self.phase, edge) {
            (HalfPhase::SeekingGapAntiClockwise, OptoEdge::Falling) => {
                engine.stop();
                engine.set_direction(Direction::Clockwise);
                engine.turn_steps(cfg.calibration_seek_steps);
                self.phase = HalfPhase::ReturningClockwise;
            }
            (HalfPhase::ReturningClockwise, OptoEdge::Rising) => {
                engine.stop();
                let edge_steps = engine.get_edge_steps();
                engine.set_step_counter(edge_steps / 2);

                if self.pills_dispensed > 0 {
                    let step_max = engine.get_max_steps();
                    if step_max > 0 {
                        let target = i64::from(self.pills_dispensed) * i64::from(step_max) / 8
                            - i64::from(engine.get_step_count());
                        let forward = target.rem_euclid(i64::from(step_max)) as u32;
                        if forward > 0 {
                            engine.turn_steps(forward);
                        }
                    }
                }

                engine.set_calibrated(true);
                engine.set_calibrating(false);
                self.phase = HalfPhase::Done;
                return true;
            }
            _ => {}
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockCoprocessor;

    fn engine() -> StepperEngine<MockCoprocessor> {
        StepperEngine::new(MockCoprocessor::default())
    }

    #[test]
    fn full_calibration_computes_step_max_and_centers() {
        let cfg = Config::default();
        let mut engine = engine();
        let mut cal = FullCalibration::start(&mut engine, &cfg);
        assert!(engine.is_calibrating());

        // Seeking batch: 4300 steps to the falling edge.
        engine.coprocessor_mut().advance(4300);
        assert!(!cal.on_edge(&mut engine, OptoEdge::Falling, &cfg));

        // In the gap for 312 steps to the rising edge.
        engine.coprocessor_mut().advance(312);
        assert!(!cal.on_edge(&mut engine, OptoEdge::Rising, &cfg));

        // Completes the revolution: 4300 steps back to the falling edge.
        engine.coprocessor_mut().advance(4300);
        assert!(cal.on_edge(&mut engine, OptoEdge::Falling, &cfg));

        assert!(cal.is_done());
        assert!(engine.is_calibrated());
        assert!(!engine.is_calibrating());
        assert_eq!(engine.get_max_steps(), 4300);
        assert_eq!(engine.get_edge_steps(), 312);
        assert_eq!(engine.get_step_count(), 4300 - 312 / 2 + 312 / 2);
    }

    #[test]
    fn half_calibration_reuses_prior_geometry() {
        let cfg = Config::default();
        let mut engine = engine();
        engine.set_step_max(4300);
        engine.set_edge_steps(312);

        let mut cal = HalfCalibration::start(&mut engine, 0, &cfg);
        assert_eq!(engine.get_direction(), Direction::AntiClockwise);

        engine.coprocessor_mut().advance(1200);
        assert!(!cal.on_edge(&mut engine, OptoEdge::Falling, &cfg));
        assert_eq!(engine.get_direction(), Direction::Clockwise);

        engine.coprocessor_mut().advance(312);
        assert!(cal.on_edge(&mut engine, OptoEdge::Rising, &cfg));

        assert!(engine.is_calibrated());
        assert_eq!(engine.get_step_count(), 312 / 2);
    }

    #[test]
    fn half_calibration_advances_to_next_chamber_when_pills_already_dispensed() {
        let cfg = Config::default();
        let mut engine = engine();
        engine.set_step_max(4300);
        engine.set_edge_steps(312);

        let mut cal = HalfCalibration::start(&mut engine, 2, &cfg);
        engine.coprocessor_mut().advance(1200);
        cal.on_edge(&mut engine, OptoEdge::Falling, &cfg);
        engine.coprocessor_mut().advance(312);
        cal.on_edge(&mut engine, OptoEdge::Rising, &cfg);

        // Still running the advance-to-chamber-2 batch.
        assert!(engine.is_running());
        let remaining = engine.coprocessor_mut().steps_remaining();
        engine.coprocessor_mut().advance(remaining);
        assert_eq!(engine.get_step_count(), 2 * 4300 / 8);
    }
}
