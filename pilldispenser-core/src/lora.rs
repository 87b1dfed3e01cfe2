//! Best-effort LoRa uplink: frames a short text payload per logged event as
//! an AT command and writes it to the UART. Nothing here blocks, retries
//! indefinitely, or propagates failure back to the caller — a dropped
//! uplink is not a dispenser fault.

use heapless::String;

use crate::hil::UartLink;

const MAX_FRAME: usize = 96;
const JOIN_RETRIES: u8 = 5;
/// Polls bounding the 500 ms response window. The reference build has no
/// `Clock` threaded into this module (the component is specified generic
/// only over `UartLink`), so elapsed wall-time is approximated by a fixed
/// poll budget rather than a real deadline; a board's UART round-trip is
/// far below this either way.
const RESPONSE_POLL_BUDGET: u32 = 2000;

/// Compile-time OTAA parameters. The app key is a placeholder; a real board
/// provisions its own via `firmware::board`.
pub struct JoinParams {
    pub app_key: &'static str,
    pub port: u8,
}

pub struct LoraShipper<U: UartLink> {
    uart: U,
    available: bool,
}

impl<U: UartLink> LoraShipper<U> {
    #[must_use]
    pub fn new(uart: U) -> Self {
        Self {
            uart,
            available: false,
        }
    }

    /// Runs the OTAA join sequence. Marks the shipper unavailable (and every
    /// later `ship` a no-op) if any step fails.
    pub fn join(&mut self, params: &JoinParams) {
        let mut ok = self.send_line("AT");
        ok &= self.send_line("AT+MODE=LWOTAA");
        ok &= self.send_key_command(params.app_key);
        ok &= self.send_line("AT+CLASS=A");
        ok &= self.send_port_command(params.port);

        let mut joined = false;
        for _ in 0..JOIN_RETRIES {
            if self.send_line("AT+JOIN") {
                joined = true;
                break;
            }
        }
        self.available = ok && joined;
    }

    /// Ships one event's text as `AT+MSG="<text>"`. A no-op once the shipper
    /// has been marked unavailable; failure to send is never surfaced.
    pub fn ship(&mut self, text: &str) {
        if !self.available {
            return;
        }
        let mut frame: String<MAX_FRAME> = String::new();
        if frame.push_str("AT+MSG=\"").is_err()
            || frame.push_str(text).is_err()
            || frame.push_str("\"\r\n").is_err()
        {
            return;
        }
        self.write_frame(frame.as_bytes());
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available
    }

    fn send_key_command(&mut self, app_key: &str) -> bool {
        let mut frame: String<MAX_FRAME> = String::new();
        if frame.push_str("AT+KEY=APPKEY,\"").is_err()
            || frame.push_str(app_key).is_err()
            || frame.push_str("\"\r\n").is_err()
        {
            return false;
        }
        self.write_frame(frame.as_bytes());
        self.await_response()
    }

    fn send_port_command(&mut self, port: u8) -> bool {
        let mut frame: String<MAX_FRAME> = String::new();
        let mut digits: String<3> = String::new();
        let _ = core::fmt::Write::write_fmt(&mut digits, format_args!("{port}"));
        if frame.push_str("AT+PORT=").is_err()
            || frame.push_str(&digits).is_err()
            || frame.push_str("\r\n").is_err()
        {
            return false;
        }
        self.write_frame(frame.as_bytes());
        self.await_response()
    }

    fn send_line(&mut self, command: &str) -> bool {
        let mut frame: String<MAX_FRAME> = String::new();
        if frame.push_str(command).is_err() || frame.push_str("\r\n").is_err() {
            return false;
        }
        self.write_frame(frame.as_bytes());
        self.await_response()
    }

    fn write_frame(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if self.uart.write_byte(byte).is_err() {
                return;
            }
        }
    }

    /// Polls for a response line ending in `\r\n`, within a bounded budget
    /// standing in for the 500 ms window. Returns `true` once a newline is
    /// observed, `false` if the budget runs out first.
    fn await_response(&mut self) -> bool {
        for _ in 0..RESPONSE_POLL_BUDGET {
            if self.uart.poll_byte() == Some(b'\n') {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockUart;

    #[test]
    fn ship_frames_message_as_at_command() {
        let mut shipper = LoraShipper::new(MockUart::default());
        shipper.available = true;
        shipper.ship("DISPENSE1");
        assert_eq!(shipper.uart.written, b"AT+MSG=\"DISPENSE1\"\r\n");
    }

    #[test]
    fn ship_is_a_no_op_before_join_succeeds() {
        let mut shipper = LoraShipper::new(MockUart::default());
        shipper.ship("IDLE");
        assert!(shipper.uart.written.is_empty());
    }

    #[test]
    fn join_marks_shipper_available_on_success() {
        let mut uart = MockUart::default();
        // One "OK\r\n" per command: AT, AT+MODE, AT+KEY, AT+CLASS, AT+PORT,
        // AT+JOIN.
        for _ in 0..6 {
            uart.rx_queue.extend_from_slice(b"OK\r\n");
        }
        let mut shipper = LoraShipper::new(uart);
        let params = JoinParams {
            app_key: "0011223344556677",
            port: 2,
        };
        shipper.join(&params);
        assert!(shipper.is_available());
    }

    #[test]
    fn join_marks_shipper_unavailable_without_responses() {
        let mut shipper = LoraShipper::new(MockUart::default());
        let params = JoinParams {
            app_key: "0011223344556677",
            port: 2,
        };
        shipper.join(&params);
        assert!(!shipper.is_available());
        shipper.ship("IDLE");
        assert!(shipper.uart.written.is_empty());
    }
}
