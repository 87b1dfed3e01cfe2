//! Blocking driver for a 24-series (AT24Cxx) I²C EEPROM: two-byte
//! big-endian address latch, then data bytes; writes block for the
//! device's write-cycle time before returning, the way `core::hil::EepromBus`
//! requires.

use embedded_hal::i2c::I2c;
use fugit::MicrosDurationU32;
use pilldispenser_core::error::BusError;
use pilldispenser_core::hil::EepromBus;

/// Device write-cycle time. 24-series parts commonly specify 5 ms max.
const WRITE_CYCLE: MicrosDurationU32 = MicrosDurationU32::millis(5);

pub struct At24Eeprom<I2C, D> {
    i2c: I2C,
    address: u8,
    delay: D,
}

impl<I2C, D> At24Eeprom<I2C, D>
where
    I2C: I2c,
    D: embedded_hal::delay::DelayNs,
{
    pub fn new(i2c: I2C, address: u8, delay: D) -> Self {
        Self { i2c, address, delay }
    }
}

impl<I2C, D> EepromBus for At24Eeprom<I2C, D>
where
    I2C: I2c,
    D: embedded_hal::delay::DelayNs,
{
    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), BusError> {
        let addr_bytes = address.to_be_bytes();
        self.i2c
            .write_read(self.address, &addr_bytes, buf)
            .map_err(|_| BusError)
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), BusError> {
        // 24-series parts only accept a bounded page per write; the log and
        // status records are both well under a typical 32-byte page, so one
        // write per call is correct here.
        let addr_bytes = address.to_be_bytes();
        let mut frame = heapless::Vec::<u8, 34>::new();
        frame.extend_from_slice(&addr_bytes).map_err(|_| BusError)?;
        frame.extend_from_slice(data).map_err(|_| BusError)?;
        self.i2c.write(self.address, &frame).map_err(|_| BusError)?;
        self.delay.delay_us(WRITE_CYCLE.to_micros());
        Ok(())
    }
}
