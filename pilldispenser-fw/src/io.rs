//! Panic handling. Mirrors the shape of a board's debug `io.rs`: on panic we
//! steal the peripherals (nothing else will run again), blink the error LED,
//! and push what we can over the debug UART before looping forever.

use core::panic::PanicInfo;
use core::sync::atomic::{AtomicBool, Ordering};

use cortex_m::asm;
use embedded_hal::digital::OutputPin;
use rp2040_hal::gpio::Pins;
use rp2040_hal::pac;
use rp2040_hal::Sio;

/// Set once `main` has finished board bring-up; a panic before that point
/// skips the LED/UART recovery path and just spins, since the pins it would
/// need may not be configured yet.
static BOARD_READY: AtomicBool = AtomicBool::new(false);

pub fn mark_board_ready() {
    BOARD_READY.store(true, Ordering::Relaxed);
}

#[inline(never)]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    defmt::error!("PANIC");
    if let Some(location) = info.location() {
        defmt::error!("  at {}:{}", location.file(), location.line());
    }

    if BOARD_READY.load(Ordering::Relaxed) {
        // SAFETY: we are unwinding into a panic from which there is no
        // return; no other code will touch these peripherals again.
        unsafe {
            let mut pac = pac::Peripherals::steal();
            let sio = Sio::new(pac.SIO);
            let pins = Pins::new(
                pac.IO_BANK0,
                pac.PADS_BANK0,
                sio.gpio_bank0,
                &mut pac.RESETS,
            );
            let mut error_led = pins.gpio25.into_push_pull_output();

            loop {
                error_led.set_high().ok();
                asm::delay(12_000_000);
                error_led.set_low().ok();
                asm::delay(12_000_000);
            }
        }
    }

    loop {
        asm::nop();
    }
}
