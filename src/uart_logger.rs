//! Serial console output for the node log.
//!
//! The main task empties [`LOG_STREAM`](crate::LOG_STREAM) onto UART0 after
//! every receive-loop poll. Writes happen outside the receive path, so a
//! slow UART only delays the next poll, never a drain in progress.
//!
//! # Hardware Setup
//!
//! ```text
//! ESP32-S3 U0TXD (GPIO43) ──────▶ USB-UART RX
//!                                  └─▶ serial monitor, 115200 8N1
//! ```
//!
//! Line format: `[      1234] INFO: RX:PING`

use core::fmt::Write;

use crate::logging::{format_into, LogRecord, LogStream, TextBuf, MAX_MSG_LEN};
use crate::packet::PayloadText;

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::gpio;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::peripheral::Peripheral;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::uart::{self, UartTxDriver};

/// Room for the longest record plus timestamp and level prefix.
pub const LINE_BUF_LEN: usize = MAX_MSG_LEN + 32;

/// Serial port settings for the log console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartLoggerConfig {
    pub baud_rate: u32,
}

impl Default for UartLoggerConfig {
    fn default() -> Self {
        Self { baud_rate: 115_200 }
    }
}

/// Render one record as a console line (newline included).
pub fn format_record(record: &LogRecord, buf: &mut [u8]) -> usize {
    let mut line = TextBuf::new(buf);
    let _ = writeln!(
        line,
        "[{:10}] {}: {}",
        record.at_us,
        record.level.tag(),
        PayloadText(record.text())
    );
    line.len()
}

/// Hand every queued record to `write`, one line per call.
///
/// Records lost to a full ring since the previous call are announced
/// first with a `[WARN] Dropped: N` line. Returns the number of records
/// written.
pub fn drain_log<const N: usize>(stream: &LogStream<N>, mut write: impl FnMut(&[u8])) -> u32 {
    let mut buf = [0u8; LINE_BUF_LEN];

    match stream.take_dropped() {
        0 => {}
        lost => {
            let n = format_into(&mut buf, format_args!("[WARN] Dropped: {}\n", lost));
            write(&buf[..n]);
        }
    }

    let mut written = 0;
    while let Some(record) = stream.pop() {
        let n = format_record(&record, &mut buf);
        write(&buf[..n]);
        written += 1;
    }
    written
}

/// Open a TX-only UART for the log console.
#[cfg(target_os = "espidf")]
pub fn init_uart_logger<'d>(
    uart: impl Peripheral<P = impl uart::Uart> + 'd,
    tx: impl Peripheral<P = impl gpio::OutputPin> + 'd,
    config: &UartLoggerConfig,
) -> Result<UartTxDriver<'d>, esp_idf_svc::sys::EspError> {
    let settings = uart::config::Config::default()
        .baudrate(esp_idf_svc::hal::units::Hertz(config.baud_rate));

    UartTxDriver::new(
        uart,
        tx,
        Option::<gpio::AnyIOPin>::None, // CTS
        Option::<gpio::AnyIOPin>::None, // RTS
        &settings,
    )
}

/// Flush the node log to the console. Returns at once when it is empty.
#[cfg(target_os = "espidf")]
pub fn write_pending_logs(uart: &mut UartTxDriver<'_>) -> u32 {
    drain_log(&crate::LOG_STREAM, |line| {
        let _ = uart.write(line);
    })
}
