//! Pin assignment and peripheral addressing for the reference board, the
//! single place all the wiring constants live instead of scattered across
//! driver modules.

use pilldispenser_core::config::Config;
use pilldispenser_core::lora::JoinParams;

/// 24-series EEPROM 7-bit I²C address (A0..A2 tied low).
pub const EEPROM_I2C_ADDR: u8 = 0x50;

/// Log ring base address; the status record follows immediately after the
/// ring's 32 slots.
pub const LOG_BASE_ADDR: u16 = 0x0000;
pub const MAX_LOGS: usize = 32;
pub const STATUS_ADDR: u16 = (MAX_LOGS * pilldispenser_core::codec::LOG_SIZE) as u16;

/// GPIO pin numbers, board silkscreen order.
pub mod pins {
    pub const STEPPER_PHASE_A: u8 = 2;
    pub const STEPPER_PHASE_B: u8 = 3;
    pub const STEPPER_PHASE_C: u8 = 4;
    pub const STEPPER_PHASE_D: u8 = 5;

    pub const LED_WAIT: u8 = 6;
    pub const LED_CALIB: u8 = 7;
    pub const LED_ERROR: u8 = 8;

    pub const BTN_CALIBRATE: u8 = 9;
    pub const BTN_DISPENSE: u8 = 10;
    pub const PIEZO_DROP: u8 = 11;
    pub const OPTO_FORK: u8 = 12;

    /// Held low to trigger a one-shot dump of the event log over the debug
    /// channel; normally pulled high.
    pub const DEBUG_DUMP: u8 = 13;

    pub const I2C_SDA: u8 = 16;
    pub const I2C_SCL: u8 = 17;

    pub const LORA_UART_TX: u8 = 20;
    pub const LORA_UART_RX: u8 = 21;
}

/// Placeholder OTAA app key; a production board provisions its own at
/// flash time rather than compiling it in.
pub const LORA_JOIN: JoinParams = JoinParams {
    app_key: "00000000000000000000000000000000",
    port: 2,
};

#[must_use]
pub fn config() -> Config {
    Config::default()
}
