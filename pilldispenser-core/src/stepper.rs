//! Stepper Engine: issues half-step batches to a `StepperCoprocessor`,
//! tracks the absolute step position modulo the calibrated revolution, and
//! performs the position bookkeeping `stop()` needs to undo an aborted
//! batch (see the design note on mid-batch stop in SPEC_FULL.md §9).

use core::cell::Cell;

use crate::hil::{Direction, StepperCoprocessor};

/// The eight half-step winding patterns, in the order that gives clockwise
/// rotation; each bit maps to one of the four driver pins. Shared with the
/// firmware's PIO program so the hardware table and the bookkeeping here
/// never drift apart.
pub const HALF_STEP_PHASES: [u8; 8] = [0x1, 0x3, 0x2, 0x6, 0x4, 0xC, 0x8, 0x9];

/// Number of in-flight/queued batches `stop()` can undo. The engine never
/// submits a second batch before the first completes, so in practice this
/// holds at most one entry; the extra headroom keeps the undo path correct
/// even if that assumption is ever relaxed.
const STEP_MEMORY_DEPTH: usize = 4;

pub const RPM_MIN: f32 = 1.8;
pub const RPM_MAX: f32 = 15.0;

pub struct StepperEngine<C: StepperCoprocessor> {
    co: C,
    sequence_counter: Cell<u8>,
    step_counter: Cell<u32>,
    step_max: Cell<u32>,
    edge_steps: Cell<u32>,
    direction: Cell<Direction>,
    speed_rpm: Cell<f32>,
    calibrated: Cell<bool>,
    calibrating: Cell<bool>,
    step_memory: core::cell::RefCell<heapless::Deque<i32, STEP_MEMORY_DEPTH>>,
}

impl<C: StepperCoprocessor> StepperEngine<C> {
    pub fn new(co: C) -> Self {
        Self {
            co,
            sequence_counter: Cell::new(0),
            step_counter: Cell::new(0),
            step_max: Cell::new(0),
            edge_steps: Cell::new(0),
            direction: Cell::new(Direction::Clockwise),
            speed_rpm: Cell::new(RPM_MAX),
            calibrated: Cell::new(false),
            calibrating: Cell::new(false),
            step_memory: core::cell::RefCell::new(heapless::Deque::new()),
        }
    }

    /// Starts a batch of `step_count` half-steps in the current direction,
    /// from the current sequence phase. Has no effect if a batch is already
    /// running (callers must poll `is_running`).
    pub fn turn_steps(&mut self, step_count: u32) {
        if self.co.is_running() || step_count == 0 {
            return;
        }
        let entry_phase = self.sequence_counter.get();
        self.co.start_batch(self.direction.get(), entry_phase, step_count);

        let signed = self.signed(step_count);
        // A batch that finished without `stop()` (the common case) leaves
        // its entry here forever; since the running check above guarantees
        // at most one batch is ever in flight, starting a new one means
        // nothing here is still owed, and any leftover entry is stale.
        let mut memory = self.step_memory.borrow_mut();
        memory.clear();
        let _ = memory.push_back(signed);
        drop(memory);

        self.sequence_counter
            .set(((u32::from(entry_phase) + step_count) % 8) as u8);
        self.apply_delta(signed);
    }

    /// Halts phase output immediately, corrects `step_counter` for any
    /// unexecuted portion of the in-flight batch plus any still-queued
    /// batches, and realigns `sequence_counter` with the physical phase.
    pub fn stop(&mut self) {
        let was_running = self.co.is_running();
        let remaining = self.co.steps_remaining();
        let current_phase = self.co.current_phase();
        self.co.stop();

        let mut memory = self.step_memory.borrow_mut();
        if was_running {
            if let Some(in_flight) = memory.pop_back() {
                let unexecuted = same_sign_magnitude(in_flight, remaining);
                drop(memory);
                self.apply_delta(-unexecuted);
                memory = self.step_memory.borrow_mut();
            }
        }
        while let Some(queued) = memory.pop_back() {
            drop(memory);
            self.apply_delta(-queued);
            memory = self.step_memory.borrow_mut();
        }
        drop(memory);

        self.sequence_counter.set((current_phase + 1) % 8);
    }

    /// Clamps to `[RPM_MIN, RPM_MAX]` and programs the co-processor's clock
    /// divider so one half-step takes `60_000 / (rpm * 4096)` ms.
    pub fn set_speed(&mut self, rpm: f32) {
        let clamped = rpm.clamp(RPM_MIN, RPM_MAX);
        let half_step_period_us = (60_000_000.0 / (clamped * 4096.0)) as u32;
        self.co.set_half_step_period_us(half_step_period_us);
        self.speed_rpm.set(clamped);
    }

    /// Stops the motor if running, reloads the co-processor with the
    /// program for the new direction, and recomputes `sequence_counter` so
    /// the next phase is the one after the current physical winding state.
    pub fn set_direction(&mut self, direction: Direction) {
        if self.co.is_running() {
            self.stop();
        } else {
            let current_phase = self.co.current_phase();
            self.sequence_counter.set((current_phase + 1) % 8);
        }
        self.direction.set(direction);
    }

    fn signed(&self, step_count: u32) -> i32 {
        match self.direction.get() {
            Direction::Clockwise => step_count as i32,
            Direction::AntiClockwise => -(step_count as i32),
        }
    }

    /// Accumulates `delta` into `step_counter`. Before a revolution has been
    /// measured (`step_max == 0`, i.e. mid-full-calibration) there is no
    /// modulus to wrap against yet, so the count simply accumulates raw —
    /// full calibration relies on this to read back the exact step count
    /// between opto-fork edges.
    fn apply_delta(&self, delta: i32) {
        let step_max = self.step_max.get();
        let current = i64::from(self.step_counter.get());
        let next = if step_max == 0 {
            current + i64::from(delta)
        } else {
            (current + i64::from(delta)).rem_euclid(i64::from(step_max))
        };
        self.step_counter.set(next as u32);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.co.is_running()
    }

    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.calibrated.get()
    }

    #[must_use]
    pub fn is_calibrating(&self) -> bool {
        self.calibrating.get()
    }

    #[must_use]
    pub fn get_max_steps(&self) -> u32 {
        self.step_max.get()
    }

    #[must_use]
    pub fn get_edge_steps(&self) -> u32 {
        self.edge_steps.get()
    }

    #[must_use]
    pub fn get_step_count(&self) -> u32 {
        self.step_counter.get()
    }

    #[must_use]
    pub fn get_direction(&self) -> Direction {
        self.direction.get()
    }

    #[must_use]
    pub fn sequence_counter(&self) -> u8 {
        self.sequence_counter.get()
    }

    // The calibration FSM, which owns `&mut StepperEngine` for the duration
    // of a calibration run, is the only other place allowed to write these.
    pub(crate) fn set_calibrating(&self, value: bool) {
        self.calibrating.set(value);
    }

    pub(crate) fn set_calibrated(&self, value: bool) {
        self.calibrated.set(value);
    }

    pub(crate) fn set_step_counter(&self, value: u32) {
        self.step_counter.set(value);
    }

    pub(crate) fn set_step_max(&self, value: u32) {
        self.step_max.set(value);
    }

    pub(crate) fn set_edge_steps(&self, value: u32) {
        self.edge_steps.set(value);
    }

    #[must_use]
    pub fn speed_rpm(&self) -> f32 {
        self.speed_rpm.get()
    }

    pub(crate) fn coprocessor_mut(&mut self) -> &mut C {
        &mut self.co
    }
}

/// Returns `remaining` with the same sign as `full` (both are magnitudes of
/// half-steps in the same direction as the originally queued batch).
fn same_sign_magnitude(full: i32, remaining: u32) -> i32 {
    if full < 0 {
        -(remaining as i32)
    } else {
        remaining as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockCoprocessor;

    fn engine_with_revolution(step_max: u32) -> StepperEngine<MockCoprocessor> {
        let engine = StepperEngine::new(MockCoprocessor::default());
        engine.set_step_max(step_max);
        engine
    }

    #[test]
    fn turn_steps_completing_normally_advances_position() {
        let mut engine = engine_with_revolution(4300);
        engine.turn_steps(537);
        assert!(engine.is_running());
        // Let the mock coprocessor run the batch to completion.
        engine.coprocessor_mut().advance(537);
        assert!(!engine.is_running());
        assert_eq!(engine.get_step_count(), 537);
        assert_eq!(engine.sequence_counter(), 537 % 8);
    }

    #[test]
    fn stop_mid_batch_undoes_unexecuted_steps() {
        let mut engine = engine_with_revolution(4300);
        engine.turn_steps(100);
        engine.coprocessor_mut().advance(40); // only 40 of 100 actually happened
        engine.stop();
        assert_eq!(engine.get_step_count(), 40);
        assert!(!engine.is_running());
    }

    #[test]
    fn stop_normalizes_sequence_counter_from_physical_phase() {
        let mut engine = engine_with_revolution(4300);
        engine.turn_steps(10);
        engine.coprocessor_mut().advance(3);
        engine.stop();
        let physical = engine.coprocessor_mut().current_phase();
        assert_eq!(engine.sequence_counter(), (physical + 1) % 8);
    }

    #[test]
    fn step_counter_always_stays_within_revolution() {
        let mut engine = engine_with_revolution(10);
        for _ in 0..5 {
            engine.turn_steps(7);
            engine.coprocessor_mut().advance(7);
            assert!(engine.get_step_count() < 10);
        }
    }

    #[test]
    fn anticlockwise_turn_decrements_position() {
        let mut engine = engine_with_revolution(100);
        engine.set_step_counter(10);
        engine.set_direction(crate::hil::Direction::AntiClockwise);
        engine.turn_steps(7);
        engine.coprocessor_mut().advance(7);
        assert_eq!(engine.get_step_count(), 3);
    }

    #[test]
    fn set_speed_clamps_to_valid_range() {
        let mut engine = engine_with_revolution(4300);
        engine.set_speed(100.0);
        assert!((engine.speed_rpm() - RPM_MAX).abs() < f32::EPSILON);
        engine.set_speed(0.1);
        assert!((engine.speed_rpm() - RPM_MIN).abs() < f32::EPSILON);
    }
}
