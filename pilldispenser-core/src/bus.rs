//! A shared handle onto one `EepromBus`, so the Log Store and the Status
//! Store — two independent generic clients — can address the same physical
//! chip without either owning it outright. Plain `RefCell` is enough: the
//! spec's concurrency model has exactly one main-loop owner of the I²C bus,
//! never an interrupt handler, so there is no contention to guard against,
//! only two long-lived Rust values that both need a handle.

use core::cell::RefCell;

use crate::error::BusError;
use crate::hil::EepromBus;

#[derive(Clone, Copy)]
pub struct SharedBus<'a, B>(&'a RefCell<B>);

impl<'a, B> SharedBus<'a, B> {
    #[must_use]
    pub fn new(cell: &'a RefCell<B>) -> Self {
        Self(cell)
    }
}

impl<'a, B: EepromBus> EepromBus for SharedBus<'a, B> {
    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), BusError> {
        self.0.borrow_mut().read(address, buf)
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), BusError> {
        self.0.borrow_mut().write(address, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockEeprom;

    #[test]
    fn two_handles_see_each_others_writes() {
        let cell = RefCell::new(MockEeprom::new(16));
        let mut a = SharedBus::new(&cell);
        let mut b = SharedBus::new(&cell);

        a.write(0, &[0xAB]).unwrap();
        let mut buf = [0u8; 1];
        b.read(0, &mut buf).unwrap();
        assert_eq!(buf[0], 0xAB);
    }
}
