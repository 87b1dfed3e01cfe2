//! GPIO-backed indicator LEDs: push-pull outputs driven straight from the
//! `Led` trait, one pin per LED in the three-LED bar the indicator module
//! drives in `Wait`/`Calibration`/`Run`/`Error` patterns.

use embedded_hal::digital::OutputPin;
use pilldispenser_core::hil::Led;

pub struct GpioLed<P> {
    pin: P,
    active_low: bool,
}

impl<P: OutputPin> GpioLed<P> {
    pub fn new(pin: P, active_low: bool) -> Self {
        Self { pin, active_low }
    }
}

impl<P: OutputPin> Led for GpioLed<P> {
    fn on(&mut self) {
        let result = if self.active_low {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };
        result.ok();
    }

    fn off(&mut self) {
        let result = if self.active_low {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.ok();
    }
}
