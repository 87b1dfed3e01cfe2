//! Entry point: board bring-up, one `DispenserController::boot` call, then
//! the single cooperative main loop — kick the watchdog, advance the clock,
//! drain debounced inputs, tick the controller, and drive the indicator.
//! Nothing in this loop sleeps except the EEPROM driver's bounded
//! write-cycle wait, buried inside `eeprom24::At24Eeprom::write`.

#![no_std]
#![no_main]

mod board;
mod clock;
mod eeprom24;
mod io;
mod irq;
mod leds;
mod lorauart;
mod stepperdrv;
mod watchdog;

use core::cell::RefCell;

use cortex_m_rt::entry;
use embedded_hal::digital::InputPin;
use fugit::{HertzU32, RateExtU32};
use pilldispenser_core::bus::SharedBus;
use pilldispenser_core::controller::{DispenserController, TickInputs};
use pilldispenser_core::hil::Clock as _;
use pilldispenser_core::indicator::{Indicator, Pattern};
use rp2040_hal::clocks::init_clocks_and_plls;
use rp2040_hal::gpio::Pins;
use rp2040_hal::pac::{self, interrupt};
use rp2040_hal::{Sio, Timer, Watchdog as HalWatchdogPeripheral};

use defmt_rtt as _;

const XTAL_FREQ_HZ: u32 = 12_000_000;

#[entry]
fn main() -> ! {
    let mut pac = pac::Peripherals::take().unwrap();
    let core = pac::CorePeripherals::take().unwrap();

    // Read before `HalWatchdog::enable` re-arms the watchdog and clears the
    // sticky reset-cause flag.
    let watchdog_caused_reset = watchdog::HalWatchdog::caused_last_reset(&pac.WATCHDOG);

    let mut hal_watchdog_peripheral = HalWatchdogPeripheral::new(pac.WATCHDOG);
    let clocks = init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut hal_watchdog_peripheral,
    )
    .ok()
    .unwrap();

    let delay = cortex_m::delay::Delay::new(core.SYST, clocks.system_clock.freq().to_Hz());

    let sio = Sio::new(pac.SIO);
    let pins = Pins::new(pac.IO_BANK0, pac.PADS_BANK0, sio.gpio_bank0, &mut pac.RESETS);

    let timer = Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let alarm0 = timer.alarm_0().unwrap();
    let rtc_clock = clock::HalClock::new(timer);

    // Stepper phase pins + timer alarm.
    let phase_pins = [
        pins.gpio2.into_push_pull_output().into_dyn_pin(),
        pins.gpio3.into_push_pull_output().into_dyn_pin(),
        pins.gpio4.into_push_pull_output().into_dyn_pin(),
        pins.gpio5.into_push_pull_output().into_dyn_pin(),
    ];
    stepperdrv::TimerStepper::init(phase_pins, alarm0);
    let stepper_co = stepperdrv::TimerStepper;

    // Indicator LEDs.
    let led_wait = leds::GpioLed::new(pins.gpio6.into_push_pull_output().into_dyn_pin(), false);
    let led_calib = leds::GpioLed::new(pins.gpio7.into_push_pull_output().into_dyn_pin(), false);
    let led_error = leds::GpioLed::new(pins.gpio8.into_push_pull_output().into_dyn_pin(), false);
    let mut indicator: Indicator<_, 3> = Indicator::new([led_wait, led_calib, led_error]);
    let mut current_pattern = Pattern::Wait;

    // Buttons, piezo, opto-fork: interrupt-driven, debounced in `irq`.
    let calib_btn = pins.gpio9.into_pull_up_input().into_dyn_pin();
    let dispense_btn = pins.gpio10.into_pull_up_input().into_dyn_pin();
    let piezo = pins.gpio11.into_pull_up_input().into_dyn_pin();
    let opto = pins.gpio12.into_pull_up_input().into_dyn_pin();
    let mut debug_dump_pin = pins.gpio13.into_pull_up_input().into_dyn_pin();
    let mut debug_dump_armed = true;
    irq::init(irq::IrqPins {
        calib_btn,
        dispense_btn,
        piezo,
        opto,
    });
    unsafe {
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::IO_IRQ_BANK0);
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::TIMER_IRQ_0);
    }

    // EEPROM bus, shared between the log ring and the status record so only
    // one real I²C peripheral instance exists.
    let i2c = rp2040_hal::I2C::i2c0(
        pac.I2C0,
        pins.gpio16.into_function(),
        pins.gpio17.into_function(),
        HertzU32::kHz(400),
        &mut pac.RESETS,
        clocks.peripheral_clock.freq(),
    );
    let eeprom = eeprom24::At24Eeprom::new(i2c, board::EEPROM_I2C_ADDR, delay);
    let eeprom_cell = RefCell::new(eeprom);
    let log_bus = SharedBus::new(&eeprom_cell);
    let status_bus = SharedBus::new(&eeprom_cell);

    // LoRa radio UART.
    let uart_pins = (pins.gpio20.into_function(), pins.gpio21.into_function());
    let uart = rp2040_hal::uart::UartPeripheral::new(pac.UART1, uart_pins, &mut pac.RESETS)
        .enable(
            rp2040_hal::uart::UartConfig::new(
                9600.Hz(),
                rp2040_hal::uart::DataBits::Eight,
                None,
                rp2040_hal::uart::StopBits::One,
            ),
            clocks.peripheral_clock.freq(),
        )
        .ok()
        .unwrap();
    let lora_uart = lorauart::LoraUart::new(uart);

    let hal_watchdog = watchdog::HalWatchdog::new(hal_watchdog_peripheral);

    let boot_ms = rtc_clock.now_ms();
    let mut controller = DispenserController::<_, _, _, _, { board::MAX_LOGS }>::boot(
        log_bus,
        status_bus,
        board::LOG_BASE_ADDR,
        board::STATUS_ADDR,
        stepper_co,
        lora_uart,
        &board::LORA_JOIN,
        hal_watchdog,
        watchdog_caused_reset,
        board::config(),
        boot_ms,
    )
    .ok()
    .unwrap();

    io::mark_board_ready();

    loop {
        if let Some(edge) = irq::take_opto_edge() {
            controller.on_opto_edge(edge);
        }

        let now_ms = rtc_clock.now_ms();
        let error_blink_done = indicator.tick(&rtc_clock);

        // Held-low debug GPIO: one-shot dump of the event log, re-armed once
        // the pin is released.
        if debug_dump_pin.is_low().unwrap_or(false) {
            if debug_dump_armed {
                debug_dump_armed = false;
                let _ = controller.for_each_log(|slot, code, timestamp_ms| {
                    defmt::info!(
                        "{}: {} {} seconds after last boot.",
                        slot,
                        code.as_str(),
                        timestamp_ms / 1000
                    );
                });
            }
        } else {
            debug_dump_armed = true;
        }

        let inputs = TickInputs {
            calib_pressed: irq::INPUT_FLAGS.take_calib_button(),
            dispense_pressed: irq::INPUT_FLAGS.take_dispense_button(),
            dropped: irq::INPUT_FLAGS.take_dropped(),
            now_ms,
            error_blink_done,
        };

        let pattern = controller.tick(inputs);
        // Re-setting an unchanged pattern every tick would restart its phase
        // counter and break the chase/blink animations.
        if pattern != current_pattern {
            indicator.set_pattern(pattern, now_ms, board::config().error_blink_times);
            current_pattern = pattern;
        }
    }
}

#[interrupt]
fn IO_IRQ_BANK0() {
    irq::on_io_irq();
}

#[interrupt]
fn TIMER_IRQ_0() {
    stepperdrv::on_timer_irq();
}
