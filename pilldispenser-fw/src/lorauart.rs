//! UART transport for the LoRa radio's AT-command interface. `write_byte`
//! blocks only on the UART's own FIFO (bounded, sub-microsecond); `poll_byte`
//! never blocks, matching `hil::UartLink`'s non-blocking-read contract so the
//! LoRa shipper's response polling stays a plain loop counter rather than a
//! real sleep.

use embedded_hal_nb::serial::{Read, Write};
use nb::block;
use pilldispenser_core::error::BusError;
use pilldispenser_core::hil::UartLink;

pub struct LoraUart<U> {
    uart: U,
}

impl<U> LoraUart<U> {
    pub fn new(uart: U) -> Self {
        Self { uart }
    }
}

impl<U> UartLink for LoraUart<U>
where
    U: Write<u8> + Read<u8>,
{
    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        block!(self.uart.write(byte)).map_err(|_| BusError)?;
        block!(self.uart.flush()).map_err(|_| BusError)
    }

    fn poll_byte(&mut self) -> Option<u8> {
        match self.uart.read() {
            Ok(byte) => Some(byte),
            Err(nb::Error::WouldBlock) => None,
            Err(nb::Error::Other(_)) => None,
        }
    }
}
