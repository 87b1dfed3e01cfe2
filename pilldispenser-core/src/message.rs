//! The two activity enums the reference implementation conflated
//! (`reboot_num` and `log_number` in the design notes). Kept disjoint here
//! and tagged: `RebootStatusCode` is what gets persisted in `DeviceStatus`,
//! `MessageCode` is what gets appended to the log. Conversion between them
//! happens in exactly one place, `controller::recover`.

/// What the controller was doing when `DeviceStatus` was last written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RebootStatusCode {
    Idle = 0,
    Dispensing = 1,
    FullCalibration = 2,
    HalfCalibration = 3,
}

impl RebootStatusCode {
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => RebootStatusCode::Dispensing,
            2 => RebootStatusCode::FullCalibration,
            3 => RebootStatusCode::HalfCalibration,
            _ => RebootStatusCode::Idle,
        }
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// The stable, persisted event-code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageCode {
    Idle = 0,
    WatchdogReboot = 1,
    Dispense1 = 2,
    Dispense2 = 3,
    Dispense3 = 4,
    Dispense4 = 5,
    Dispense5 = 6,
    Dispense6 = 7,
    Dispense7 = 8,
    HalfCalibration = 9,
    FullCalibration = 10,
    ButtonPress = 11,
    PillDispensed = 12,
    PillError = 13,
    DispenserEmpty = 14,
    CalibrationFinished = 15,
    Dispense1Error = 16,
    Dispense2Error = 17,
    Dispense3Error = 18,
    Dispense4Error = 19,
    Dispense5Error = 20,
    Dispense6Error = 21,
    Dispense7Error = 22,
    HalfCalibrationError = 23,
    FullCalibrationError = 24,
    Gremlins = 25,
    DispenserStatusReadError = 26,
    BootFinished = 27,
}

impl MessageCode {
    /// `DISPENSE{n}` for `n` in `1..=7` (`n` is the 1-based pill number).
    #[must_use]
    pub fn dispense(n: u8) -> Self {
        match n {
            1 => MessageCode::Dispense1,
            2 => MessageCode::Dispense2,
            3 => MessageCode::Dispense3,
            4 => MessageCode::Dispense4,
            5 => MessageCode::Dispense5,
            6 => MessageCode::Dispense6,
            _ => MessageCode::Dispense7,
        }
    }

    /// `DISPENSE{n}_ERROR` for `n` in `1..=7`.
    #[must_use]
    pub fn dispense_error(n: u8) -> Self {
        match n {
            1 => MessageCode::Dispense1Error,
            2 => MessageCode::Dispense2Error,
            3 => MessageCode::Dispense3Error,
            4 => MessageCode::Dispense4Error,
            5 => MessageCode::Dispense5Error,
            6 => MessageCode::Dispense6Error,
            _ => MessageCode::Dispense7Error,
        }
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        let code = match value {
            0 => MessageCode::Idle,
            1 => MessageCode::WatchdogReboot,
            2 => MessageCode::Dispense1,
            3 => MessageCode::Dispense2,
            4 => MessageCode::Dispense3,
            5 => MessageCode::Dispense4,
            6 => MessageCode::Dispense5,
            7 => MessageCode::Dispense6,
            8 => MessageCode::Dispense7,
            9 => MessageCode::HalfCalibration,
            10 => MessageCode::FullCalibration,
            11 => MessageCode::ButtonPress,
            12 => MessageCode::PillDispensed,
            13 => MessageCode::PillError,
            14 => MessageCode::DispenserEmpty,
            15 => MessageCode::CalibrationFinished,
            16 => MessageCode::Dispense1Error,
            17 => MessageCode::Dispense2Error,
            18 => MessageCode::Dispense3Error,
            19 => MessageCode::Dispense4Error,
            20 => MessageCode::Dispense5Error,
            21 => MessageCode::Dispense6Error,
            22 => MessageCode::Dispense7Error,
            23 => MessageCode::HalfCalibrationError,
            24 => MessageCode::FullCalibrationError,
            25 => MessageCode::Gremlins,
            26 => MessageCode::DispenserStatusReadError,
            27 => MessageCode::BootFinished,
            _ => return None,
        };
        Some(code)
    }

    /// Short human-readable text used for the debug dump and the LoRa
    /// uplink payload.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MessageCode::Idle => "IDLE",
            MessageCode::WatchdogReboot => "WATCHDOG_REBOOT",
            MessageCode::Dispense1 => "DISPENSE1",
            MessageCode::Dispense2 => "DISPENSE2",
            MessageCode::Dispense3 => "DISPENSE3",
            MessageCode::Dispense4 => "DISPENSE4",
            MessageCode::Dispense5 => "DISPENSE5",
            MessageCode::Dispense6 => "DISPENSE6",
            MessageCode::Dispense7 => "DISPENSE7",
            MessageCode::HalfCalibration => "HALF_CALIBRATION",
            MessageCode::FullCalibration => "FULL_CALIBRATION",
            MessageCode::ButtonPress => "BUTTON_PRESS",
            MessageCode::PillDispensed => "PILL_DISPENSED",
            MessageCode::PillError => "PILL_ERROR",
            MessageCode::DispenserEmpty => "DISPENSER_EMPTY",
            MessageCode::CalibrationFinished => "CALIBRATION_FINISHED",
            MessageCode::Dispense1Error => "DISPENSE1_ERROR",
            MessageCode::Dispense2Error => "DISPENSE2_ERROR",
            MessageCode::Dispense3Error => "DISPENSE3_ERROR",
            MessageCode::Dispense4Error => "DISPENSE4_ERROR",
            MessageCode::Dispense5Error => "DISPENSE5_ERROR",
            MessageCode::Dispense6Error => "DISPENSE6_ERROR",
            MessageCode::Dispense7Error => "DISPENSE7_ERROR",
            MessageCode::HalfCalibrationError => "HALF_CALIBRATION_ERROR",
            MessageCode::FullCalibrationError => "FULL_CALIBRATION_ERROR",
            MessageCode::Gremlins => "GREMLINS",
            MessageCode::DispenserStatusReadError => "DISPENSER_STATUS_READ_ERROR",
            MessageCode::BootFinished => "BOOTFINISHED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispense_codes_cover_all_seven_pills() {
        for n in 1..=7u8 {
            let code = MessageCode::dispense(n);
            assert_eq!(MessageCode::from_u8(code.as_u8()), Some(code));
            let err = MessageCode::dispense_error(n);
            assert_eq!(MessageCode::from_u8(err.as_u8()), Some(err));
        }
    }

    #[test]
    fn reboot_status_round_trips_and_defaults_idle() {
        assert_eq!(RebootStatusCode::from_u8(3), RebootStatusCode::HalfCalibration);
        assert_eq!(RebootStatusCode::from_u8(99), RebootStatusCode::Idle);
    }
}
