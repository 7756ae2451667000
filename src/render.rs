//! Status rendering: one formatted status text, written identically to
//! every output sink.
//!
//! # Format
//!
//! ```text
//! RX:<payload>
//! RSSI:<rssi>dBm|SNR:<snr>dB|ferr:<freq error>Hz
//! ```
//!
//! Numbers use Rust's shortest round-trip float formatting, which always
//! carries a decimal point (`-120.0`, `9.25`).
//!
//! # Rules (from ARCHITECTURE.md §6)
//!
//! - RULE 6.1.1: Text is formatted once, then handed to the sinks, so the
//!   log and the display can never diverge
//! - RULE 6.1.2: Only successful packets are rendered; diagnostics go to the
//!   log stream directly
//! - RULE 6.1.3: Renderer depends on [`StatusSink`] only, never on a
//!   concrete sink type

use core::fmt::Write;

use crate::logging::{TextBuf, MAX_MSG_LEN};
use crate::packet::ReceivedPacket;

/// Telemetry line buffer size. Worst-case float formatting fits easily.
const TELEMETRY_LINE_LEN: usize = 96;

/// Capability shared by every output: accept a line of text.
///
/// Stateful surfaces override the frame hooks; append-only sinks ignore
/// them.
pub trait StatusSink {
    /// Write one line (without trailing newline).
    fn write_line(&mut self, line: &str);

    /// Called before the first line of a render.
    fn begin_frame(&mut self) {}

    /// Called after the last line of a render.
    fn end_frame(&mut self) {}
}

impl<S: StatusSink + ?Sized> StatusSink for &mut S {
    fn write_line(&mut self, line: &str) {
        (**self).write_line(line)
    }

    fn begin_frame(&mut self) {
        (**self).begin_frame()
    }

    fn end_frame(&mut self) {
        (**self).end_frame()
    }
}

/// Optional sink (e.g. a display that failed to come up).
impl<S: StatusSink> StatusSink for Option<S> {
    fn write_line(&mut self, line: &str) {
        if let Some(sink) = self {
            sink.write_line(line);
        }
    }

    fn begin_frame(&mut self) {
        if let Some(sink) = self {
            sink.begin_frame();
        }
    }

    fn end_frame(&mut self) {
        if let Some(sink) = self {
            sink.end_frame();
        }
    }
}

/// Fan-out: both sinks receive every call in lock-step.
impl<A: StatusSink, B: StatusSink> StatusSink for (A, B) {
    fn write_line(&mut self, line: &str) {
        self.0.write_line(line);
        self.1.write_line(line);
    }

    fn begin_frame(&mut self) {
        self.0.begin_frame();
        self.1.begin_frame();
    }

    fn end_frame(&mut self) {
        self.0.end_frame();
        self.1.end_frame();
    }
}

/// Formatted status text for one packet.
pub struct StatusLines {
    rx: [u8; MAX_MSG_LEN],
    rx_len: usize,
    telemetry: [u8; TELEMETRY_LINE_LEN],
    telemetry_len: usize,
}

impl StatusLines {
    /// Format the status text for `packet`.
    pub fn format(packet: &ReceivedPacket) -> Self {
        let mut rx = [0u8; MAX_MSG_LEN];
        let rx_len = {
            let mut w = TextBuf::new(&mut rx);
            let _ = write!(w, "RX:{}", packet.text());
            w.len()
        };

        let mut telemetry = [0u8; TELEMETRY_LINE_LEN];
        let telemetry_len = {
            let mut w = TextBuf::new(&mut telemetry);
            let _ = write!(
                w,
                "RSSI:{:?}dBm|SNR:{:?}dB|ferr:{:?}Hz",
                packet.rssi_dbm, packet.snr_db, packet.freq_error_hz
            );
            w.len()
        };

        Self {
            rx,
            rx_len,
            telemetry,
            telemetry_len,
        }
    }

    /// `RX:<payload>`
    pub fn rx_line(&self) -> &str {
        utf8_prefix(&self.rx[..self.rx_len])
    }

    /// `RSSI:..dBm|SNR:..dB|ferr:..Hz`
    pub fn telemetry_line(&self) -> &str {
        utf8_prefix(&self.telemetry[..self.telemetry_len])
    }

    /// Lines in render order.
    pub fn lines(&self) -> [&str; 2] {
        [self.rx_line(), self.telemetry_line()]
    }
}

/// Longest valid UTF-8 prefix (a truncated buffer may end mid-character).
fn utf8_prefix(bytes: &[u8]) -> &str {
    match core::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(err) => core::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or_default(),
    }
}

/// Writes packet status to its sink.
pub struct StatusRenderer<S> {
    sink: S,
}

impl<S: StatusSink> StatusRenderer<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Render one packet as a single frame.
    pub fn render_packet(&mut self, packet: &ReceivedPacket) {
        let lines = StatusLines::format(packet);

        self.sink.begin_frame();
        for line in lines.lines() {
            self.sink.write_line(line);
        }
        self.sink.end_frame();
    }

    #[inline]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
