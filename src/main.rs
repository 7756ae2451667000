//! LoRaRxNode - Main entry point
//!
//! 1. Bring up UART log, SPI radio, I2C display
//! 2. Start the receive loop (fail-stop on radio errors)
//! 3. Poll + drain logs forever, or park once halted

#![cfg_attr(target_os = "espidf", no_std)]
#![cfg_attr(target_os = "espidf", no_main)]

#[cfg(target_os = "espidf")]
mod firmware {
    use esp_idf_svc::hal::delay::{Ets, FreeRtos};
    use esp_idf_svc::hal::gpio::{Input, InputPin, InterruptType, PinDriver};
    use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::prelude::*;
    use esp_idf_svc::hal::spi::{config::Config as SpiConfig, SpiDeviceDriver, SpiDriverConfig};
    use esp_idf_svc::sys::{self as esp_idf_sys, EspError};

    use lora_rx_node::hal::oled;
    use lora_rx_node::hal::sx1276::{ReceiveInterrupt, Sx1276, Sx1276Error};
    use lora_rx_node::uart_logger::{init_uart_logger, write_pending_logs};
    use lora_rx_node::{
        rt_error, rt_info, DisplaySink, FaultState, LogSink, NodeConfig, PacketSignal,
        ReceiveLoop, LOG_STREAM,
    };

    // Static allocations (ARCHITECTURE.md §3)
    static PACKET_SIGNAL: PacketSignal = PacketSignal::new();
    static FAULT_STATE: FaultState = FaultState::new();

    /// SX1276 DIO0 on a GPIO with a rising-edge ISR.
    struct Dio0Line<'d, P: InputPin> {
        pin: PinDriver<'d, P, Input>,
    }

    impl<P: InputPin> ReceiveInterrupt for Dio0Line<'_, P> {
        fn attach(&mut self, signal: &'static PacketSignal) -> Result<(), Sx1276Error> {
            self.pin
                .set_interrupt_type(InterruptType::PosEdge)
                .map_err(|_| Sx1276Error::Interrupt)?;

            // SAFETY: the callback runs in ISR context and only stores to
            // an atomic (RULE 3.1.1).
            unsafe { self.pin.subscribe(move || signal.raise()) }
                .map_err(|_| Sx1276Error::Interrupt)?;

            self.rearm()
        }

        fn rearm(&mut self) -> Result<(), Sx1276Error> {
            self.pin.enable_interrupt().map_err(|_| Sx1276Error::Interrupt)
        }
    }

    fn timestamp_us() -> i64 {
        unsafe { esp_idf_sys::esp_timer_get_time() }
    }

    /// Terminal state: nothing left to do but wait for a power cycle.
    fn park() -> ! {
        loop {
            FreeRtos::delay_ms(1000);
        }
    }

    #[no_mangle]
    fn main() {
        // Initialize ESP-IDF
        esp_idf_sys::link_patches();

        // Returns once the radio session halts, or early if peripheral
        // bring-up fails (already logged once the UART is up).
        let _ = run(&NodeConfig::default());
        park();
    }

    fn run(config: &NodeConfig) -> Result<(), EspError> {
        let peripherals = Peripherals::take()?;
        let pins = peripherals.pins;

        let mut uart = init_uart_logger(peripherals.uart0, pins.gpio43, &config.uart)?;
        rt_info!(LOG_STREAM, timestamp_us(), "{}", env!("VERSION_STRING"));

        let session = (|| -> Result<(), EspError> {
            // SX1276 wiring:
            // CS 10, DIO0 3, RESET 2, SCLK 12, MOSI 11, MISO 13
            let spi = SpiDeviceDriver::new_single(
                peripherals.spi2,
                pins.gpio12,
                pins.gpio11,
                Some(pins.gpio13),
                Some(pins.gpio10),
                &SpiDriverConfig::new(),
                &SpiConfig::new().baudrate(8.MHz().into()),
            )?;
            let reset = PinDriver::output(pins.gpio2)?;
            let dio0 = Dio0Line {
                pin: PinDriver::input(pins.gpio3)?,
            };
            let radio = Sx1276::new(spi, reset, dio0, Ets, config.radio);

            // SSD1306 on I2C0: SDA 8, SCL 9
            let i2c = I2cDriver::new(
                peripherals.i2c0,
                pins.gpio8,
                pins.gpio9,
                &I2cConfig::new().baudrate(400.kHz().into()),
            )?;
            let display = match oled::init_i2c(i2c, &config.display) {
                Ok(display) => Some(DisplaySink::new(display)),
                Err(e) => {
                    // Keep receiving; the log still shows every packet
                    rt_error!(LOG_STREAM, timestamp_us(), "display: {}", e);
                    None
                }
            };

            let sinks = (LogSink::new(&LOG_STREAM, timestamp_us), display);
            let mut rx = ReceiveLoop::new(radio, sinks, &PACKET_SIGNAL, &LOG_STREAM, &FAULT_STATE);

            let _ = rx.start(timestamp_us());

            while !rx.is_halted() {
                rx.poll(timestamp_us());
                write_pending_logs(&mut uart);

                // Let IDLE run so the task watchdog stays fed
                FreeRtos::delay_ms(1);
            }
            Ok(())
        })();

        if let Err(e) = &session {
            rt_error!(LOG_STREAM, timestamp_us(), "peripheral bring-up failed: {}", e);
        }
        write_pending_logs(&mut uart);
        session
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!(
        "{}: firmware binary, build for an ESP-IDF target (e.g. xtensa-esp32s3-espidf)",
        env!("VERSION_STRING")
    );
}
