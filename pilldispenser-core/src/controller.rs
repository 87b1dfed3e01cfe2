//! Top-level state machine: calibration, dispensing, drop detection, and
//! the boot-time recovery protocol that lets the device resume after a
//! watchdog reset without losing its place in the weekly cycle.

use crate::calibration::{FullCalibration, HalfCalibration};
use crate::codec::DeviceStatus;
use crate::config::Config;
use crate::error::PersistenceError;
use crate::hil::{EepromBus, OptoEdge, StepperCoprocessor, UartLink, Watchdog};
use crate::indicator::Pattern;
use crate::log_store::LogStore;
use crate::lora::{JoinParams, LoraShipper};
use crate::message::{MessageCode, RebootStatusCode};
use crate::status_store::StatusStore;
use crate::stepper::StepperEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Calibrate,
    WaitForDispense,
    Dispense,
    CheckIfDispensed,
    PillNotDropped,
}

/// Everything the main loop has already sampled this tick: debounced button
/// edges, the (already taken-and-cleared) piezo flag, the current time, and
/// whether the active `Indicator` error pattern just finished its blink
/// budget.
pub struct TickInputs {
    pub calib_pressed: bool,
    pub dispense_pressed: bool,
    pub dropped: bool,
    pub now_ms: u32,
    pub error_blink_done: bool,
}

pub struct DispenserController<B, C, U, W, const MAX_LOGS: usize>
where
    B: EepromBus,
    C: StepperCoprocessor,
    U: UartLink,
    W: Watchdog,
{
    stepper: StepperEngine<C>,
    log_store: LogStore<B, MAX_LOGS>,
    status_store: StatusStore<B>,
    lora: LoraShipper<U>,
    watchdog: W,
    config: Config,
    state: State,
    status: DeviceStatus,
    pills_dropped: u8,
    time_drop_started: u32,
    chute_arrival_ms: Option<u32>,
    calibration_logged: bool,
    full_cal: Option<FullCalibration>,
    half_cal: Option<HalfCalibration>,
}

impl<B, C, U, W, const MAX_LOGS: usize> DispenserController<B, C, U, W, MAX_LOGS>
where
    B: EepromBus,
    C: StepperCoprocessor,
    U: UartLink,
    W: Watchdog,
{
    /// Runs the full boot-time recovery protocol (§4.6 steps 1-8): locates
    /// the log cursor, reads and validates persisted status, logs the
    /// activity that was interrupted, presumes an in-flight dispense
    /// consumed on a crash, decides the initial state (possibly kicking off
    /// a half calibration), and arms the watchdog.
    #[allow(clippy::too_many_arguments)]
    pub fn boot(
        log_bus: B,
        status_bus: B,
        log_base_addr: u16,
        status_addr: u16,
        stepper_co: C,
        uart: U,
        join_params: &JoinParams,
        mut watchdog: W,
        watchdog_caused_reset: bool,
        config: Config,
        now_ms: u32,
    ) -> Result<Self, PersistenceError> {
        let mut log_store = LogStore::new(log_bus, log_base_addr)?;
        let mut status_store = StatusStore::new(status_bus, status_addr);
        let mut lora = LoraShipper::new(uart);
        lora.join(join_params);

        let read = status_store.read()?;
        let mut status = read.unwrap_or_default();
        if read.is_none() {
            let _ = log_store.append(MessageCode::Gremlins, now_ms);
            lora.ship(MessageCode::Gremlins.as_str());
        }

        if watchdog_caused_reset {
            let _ = log_store.append(MessageCode::WatchdogReboot, now_ms);
            lora.ship(MessageCode::WatchdogReboot.as_str());
        }

        let activity_code = match status.reboot_status_code {
            RebootStatusCode::Idle => MessageCode::Idle,
            RebootStatusCode::Dispensing => MessageCode::dispense_error(status.pill_dispense_state + 1),
            RebootStatusCode::FullCalibration => MessageCode::FullCalibrationError,
            RebootStatusCode::HalfCalibration => MessageCode::HalfCalibrationError,
        };
        let _ = log_store.append(activity_code, now_ms);
        lora.ship(activity_code.as_str());

        if status.reboot_status_code == RebootStatusCode::Dispensing {
            status.pill_dispense_state = status.pill_dispense_state.saturating_add(1);
        }

        let mut stepper = StepperEngine::new(stepper_co);
        let mut half_cal = None;
        let state = if status.pill_dispense_state == 0 || status.pill_dispense_state >= config.max_pills {
            State::Calibrate
        } else if config
            .calib_step_range
            .contains(u32::from(status.prev_calib_step_count))
        {
            stepper.set_step_max(u32::from(status.prev_calib_step_count));
            stepper.set_edge_steps(u32::from(status.prev_calib_edge_count));
            half_cal = Some(HalfCalibration::start(&mut stepper, status.pill_dispense_state, &config));
            State::WaitForDispense
        } else {
            State::Calibrate
        };

        let _ = log_store.append(MessageCode::BootFinished, now_ms);
        lora.ship(MessageCode::BootFinished.as_str());

        watchdog.enable(config.watchdog_timeout_ms);

        Ok(Self {
            stepper,
            log_store,
            status_store,
            lora,
            watchdog,
            config,
            state,
            status,
            pills_dropped: status.pill_dispense_state,
            time_drop_started: now_ms,
            chute_arrival_ms: None,
            calibration_logged: false,
            full_cal: None,
            half_cal,
        })
    }

    /// Forwards an opto-fork edge to whichever calibration routine is
    /// active. A no-op if neither is running (called, e.g., from bounce on
    /// the sensor outside a calibration window).
    pub fn on_opto_edge(&mut self, edge: OptoEdge) {
        if let Some(fsm) = self.full_cal.as_mut() {
            if fsm.on_edge(&mut self.stepper, edge, &self.config) {
                self.full_cal = None;
            }
            return;
        }
        if let Some(fsm) = self.half_cal.as_mut() {
            if fsm.on_edge(&mut self.stepper, edge, &self.config) {
                self.half_cal = None;
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn pills_dropped(&self) -> u8 {
        self.pills_dropped
    }

    /// Visits every valid log slot in order, decoding its message code for
    /// the caller. Used by the firmware's debug GPIO to dump the event log
    /// without exposing `log_store` itself.
    pub fn for_each_log<F>(&mut self, mut f: F) -> Result<(), PersistenceError>
    where
        F: FnMut(usize, MessageCode, u32),
    {
        self.log_store.for_each_valid(|event| {
            if let Some(code) = MessageCode::from_u8(event.entry.message_code) {
                f(event.slot, code, event.entry.timestamp_ms);
            }
        })
    }

    /// Advances the state machine by one main-loop iteration. Kicks the
    /// watchdog first, per the ordering rule in the concurrency model.
    /// Returns the LED pattern that should be active this tick.
    pub fn tick(&mut self, inputs: TickInputs) -> Pattern {
        self.watchdog.kick();

        match self.state {
            State::Calibrate => self.tick_calibrate(&inputs),
            State::WaitForDispense => self.tick_wait_for_dispense(&inputs),
            State::Dispense => self.tick_dispense(&inputs),
            State::CheckIfDispensed => self.tick_check_if_dispensed(&inputs),
            State::PillNotDropped => self.tick_pill_not_dropped(&inputs),
        }
    }

    fn tick_calibrate(&mut self, inputs: &TickInputs) -> Pattern {
        if inputs.calib_pressed {
            self.full_cal = Some(FullCalibration::start(&mut self.stepper, &self.config));
            self.status.reboot_status_code = RebootStatusCode::FullCalibration;
            self.status.pill_dispense_state = 0;
            self.persist_status();
            self.log_event(MessageCode::FullCalibration, inputs.now_ms);
            self.pills_dropped = 0;
            self.calibration_logged = false;
            self.state = State::WaitForDispense;
        }
        Pattern::Wait
    }

    fn tick_wait_for_dispense(&mut self, inputs: &TickInputs) -> Pattern {
        if self.stepper.is_running() || self.stepper.is_calibrating() {
            return Pattern::Calibration;
        }
        if !self.calibration_logged {
            self.status.reboot_status_code = RebootStatusCode::Idle;
            self.status.prev_calib_step_count = self.stepper.get_max_steps() as u16;
            self.status.prev_calib_edge_count = self.stepper.get_edge_steps() as u16;
            self.persist_status();
            self.log_event(MessageCode::CalibrationFinished, inputs.now_ms);
            self.calibration_logged = true;
        }
        if inputs.dispense_pressed {
            self.log_event(MessageCode::ButtonPress, inputs.now_ms);
            self.time_drop_started = inputs.now_ms;
            self.state = State::Dispense;
        }
        Pattern::Wait
    }

    fn tick_dispense(&mut self, inputs: &TickInputs) -> Pattern {
        if self.pills_dropped >= self.config.max_pills {
            self.log_event(MessageCode::DispenserEmpty, inputs.now_ms);
            self.state = State::Calibrate;
            return Pattern::Wait;
        }
        if inputs.now_ms.wrapping_sub(self.time_drop_started) >= self.config.pill_drop_delay_ms {
            let step = self.stepper.get_max_steps() / u32::from(self.config.max_turns);
            self.stepper.turn_steps(step);
            self.status.reboot_status_code = RebootStatusCode::Dispensing;
            self.status.pill_dispense_state = self.pills_dropped;
            self.persist_status();
            self.log_event(MessageCode::dispense(self.pills_dropped + 1), inputs.now_ms);
            self.chute_arrival_ms = None;
            self.state = State::CheckIfDispensed;
            return Pattern::Run;
        }
        Pattern::Wait
    }

    fn tick_check_if_dispensed(&mut self, inputs: &TickInputs) -> Pattern {
        if inputs.dropped {
            self.pills_dropped += 1;
            self.status.reboot_status_code = RebootStatusCode::Idle;
            self.status.pill_dispense_state = self.pills_dropped;
            self.persist_status();
            self.log_event(MessageCode::PillDispensed, inputs.now_ms);
            self.time_drop_started = inputs.now_ms;
            self.state = State::Dispense;
            return Pattern::Wait;
        }
        if self.stepper.is_running() {
            return Pattern::Run;
        }
        let arrival = *self.chute_arrival_ms.get_or_insert(inputs.now_ms);
        if inputs.now_ms.wrapping_sub(arrival) >= self.config.pill_not_dropped_delay_ms() {
            self.pills_dropped += 1;
            self.status.reboot_status_code = RebootStatusCode::Idle;
            self.status.pill_dispense_state = self.pills_dropped;
            self.persist_status();
            self.log_event(MessageCode::PillError, inputs.now_ms);
            self.chute_arrival_ms = None;
            self.state = State::PillNotDropped;
            return Pattern::Error;
        }
        Pattern::Run
    }

    fn tick_pill_not_dropped(&mut self, inputs: &TickInputs) -> Pattern {
        if inputs.error_blink_done {
            self.time_drop_started = inputs.now_ms;
            self.state = State::Dispense;
        }
        Pattern::Error
    }

    fn persist_status(&mut self) {
        let _ = self.status_store.update(self.status);
    }

    fn log_event(&mut self, code: MessageCode, now_ms: u32) {
        let _ = self.log_store.append(code, now_ms);
        self.lora.ship(code.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockCoprocessor, MockEeprom, MockUart, MockWatchdog};
    use core::cell::RefCell;

    const MAX_LOGS: usize = 32;
    const LOG_SIZE: usize = crate::codec::LOG_SIZE;
    const STATUS_SIZE: usize = crate::codec::STATUS_SIZE;

    fn boot_fresh() -> DispenserController<MockEeprom, MockCoprocessor, MockUart, MockWatchdog, MAX_LOGS> {
        let log_bus = MockEeprom::new(MAX_LOGS * LOG_SIZE);
        let status_bus = MockEeprom::new(STATUS_SIZE);
        DispenserController::boot(
            log_bus,
            status_bus,
            0,
            0,
            MockCoprocessor::default(),
            MockUart::default(),
            &JoinParams {
                app_key: "0011223344556677",
                port: 2,
            },
            MockWatchdog::default(),
            false,
            Config::default(),
            0,
        )
        .unwrap()
    }

    #[test]
    fn fresh_boot_with_no_history_enters_calibrate() {
        let controller = boot_fresh();
        assert_eq!(controller.state(), State::Calibrate);
    }

    #[test]
    fn pressing_calib_button_starts_full_calibration_and_moves_to_wait() {
        let mut controller = boot_fresh();
        let pattern = controller.tick(TickInputs {
            calib_pressed: true,
            dispense_pressed: false,
            dropped: false,
            now_ms: 0,
            error_blink_done: false,
        });
        assert_eq!(controller.state(), State::WaitForDispense);
        assert_eq!(pattern, Pattern::Wait);
        assert!(controller.full_cal.is_some());
    }

    #[test]
    fn recovery_from_mid_dispense_advances_counter_to_avoid_double_dosing() {
        // Persist DISPENSING at pill_dispense_state = 3 (interrupted dispense #4),
        // with a plausible calibration on record.
        let status_bus = MockEeprom::new(STATUS_SIZE);
        let cell = RefCell::new(status_bus);
        let mut store = StatusStore::new(crate::bus::SharedBus::new(&cell), 0);
        store
            .update(DeviceStatus {
                pill_dispense_state: 3,
                reboot_status_code: RebootStatusCode::Dispensing,
                prev_calib_step_count: 4300,
                prev_calib_edge_count: 312,
            })
            .unwrap();
        drop(store);
        let status_bus = cell.into_inner();

        let log_bus = MockEeprom::new(MAX_LOGS * LOG_SIZE);
        let controller: DispenserController<MockEeprom, MockCoprocessor, MockUart, MockWatchdog, MAX_LOGS> =
            DispenserController::boot(
                log_bus,
                status_bus,
                0,
                0,
                MockCoprocessor::default(),
                MockUart::default(),
                &JoinParams {
                    app_key: "0011223344556677",
                    port: 2,
                },
                MockWatchdog::default(),
                false,
                Config::default(),
                0,
            )
            .unwrap();

        assert_eq!(controller.pills_dropped(), 4);
        assert_eq!(controller.state(), State::WaitForDispense);
        assert!(controller.half_cal.is_some());
    }

    #[test]
    fn dispenser_empty_after_seven_pills_returns_to_calibrate() {
        let mut controller = boot_fresh();
        controller.pills_dropped = 7;
        controller.state = State::Dispense;
        let pattern = controller.tick(TickInputs {
            calib_pressed: false,
            dispense_pressed: false,
            dropped: false,
            now_ms: 0,
            error_blink_done: false,
        });
        assert_eq!(controller.state(), State::Calibrate);
        assert_eq!(pattern, Pattern::Wait);
    }

    #[test]
    fn missed_pill_transitions_to_pill_not_dropped_then_back_to_dispense() {
        let mut controller = boot_fresh();
        controller.stepper.set_step_max(4300);
        controller.state = State::Dispense;
        controller.time_drop_started = 0;

        // Drop delay elapses: starts a turn and moves to CHECK_IF_DISPENSED.
        let pattern = controller.tick(TickInputs {
            calib_pressed: false,
            dispense_pressed: false,
            dropped: false,
            now_ms: 5000,
            error_blink_done: false,
        });
        assert_eq!(controller.state(), State::CheckIfDispensed);
        assert_eq!(pattern, Pattern::Run);

        // Let the batch finish with no piezo edge, then wait out the window.
        controller.stepper.coprocessor_mut().advance(4300 / 8);
        let delay = controller.config.pill_not_dropped_delay_ms();
        let pattern = controller.tick(TickInputs {
            calib_pressed: false,
            dispense_pressed: false,
            dropped: false,
            now_ms: 5000 + delay,
            error_blink_done: false,
        });
        assert_eq!(controller.state(), State::PillNotDropped);
        assert_eq!(pattern, Pattern::Error);
        assert_eq!(controller.pills_dropped(), 1);

        let pattern = controller.tick(TickInputs {
            calib_pressed: false,
            dispense_pressed: false,
            dropped: false,
            now_ms: 5000 + delay + 1,
            error_blink_done: true,
        });
        assert_eq!(controller.state(), State::Dispense);
        assert_eq!(pattern, Pattern::Error);
    }
}
