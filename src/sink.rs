//! Output sinks for status text.
//!
//! - [`LogSink`]: append-only, pushes each line into a [`LogStream`]
//! - [`DisplaySink`]: stateful surface, cleared and re-homed every frame

use core::fmt;

use crate::logging::{LogLevel, LogStream, LOG_BUFFER_SIZE};
use crate::render::StatusSink;

/// Append-only sink backed by the RT log stream.
pub struct LogSink<'a, const N: usize = LOG_BUFFER_SIZE> {
    stream: &'a LogStream<N>,
    clock: fn() -> i64,
}

impl<'a, const N: usize> LogSink<'a, N> {
    /// `clock` returns the timestamp (µs) stamped on each line.
    pub fn new(stream: &'a LogStream<N>, clock: fn() -> i64) -> Self {
        Self { stream, clock }
    }
}

impl<const N: usize> StatusSink for LogSink<'_, N> {
    fn write_line(&mut self, line: &str) {
        self.stream.push((self.clock)(), LogLevel::Info, line.as_bytes());
    }
}

/// Display driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    /// Bus transfer failed
    Bus,
    /// Cursor outside the text grid
    OutOfBounds,
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::Bus => f.write_str("display bus error"),
            DisplayError::OutOfBounds => f.write_str("cursor out of bounds"),
        }
    }
}

/// Text-mode display surface.
///
/// Implemented by [`crate::hal::oled::OledText`] on hardware.
pub trait DisplayDriver {
    /// Blank the frame buffer.
    fn clear(&mut self) -> Result<(), DisplayError>;

    /// Move the text cursor (character cells).
    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError>;

    /// Write text at the cursor. Wraps at the right edge, `\n` starts a
    /// new row.
    fn write_text(&mut self, text: &str) -> Result<(), DisplayError>;

    /// Push the frame buffer to the panel.
    fn flush(&mut self) -> Result<(), DisplayError>;
}

/// Sink that shows the latest frame on a display.
///
/// Display errors are counted, never propagated: a flaky OLED must not
/// stop reception.
pub struct DisplaySink<D> {
    display: D,
    errors: u32,
}

impl<D: DisplayDriver> DisplaySink<D> {
    pub fn new(display: D) -> Self {
        Self { display, errors: 0 }
    }

    /// Number of failed display operations since creation.
    #[inline]
    pub fn errors(&self) -> u32 {
        self.errors
    }

    #[inline]
    pub fn display(&self) -> &D {
        &self.display
    }

    #[inline]
    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    fn check(&mut self, result: Result<(), DisplayError>) {
        if result.is_err() {
            self.errors = self.errors.saturating_add(1);
        }
    }
}

impl<D: DisplayDriver> StatusSink for DisplaySink<D> {
    fn begin_frame(&mut self) {
        let r = self.display.clear();
        self.check(r);
        let r = self.display.set_cursor(0, 0);
        self.check(r);
    }

    fn write_line(&mut self, line: &str) {
        let r = self.display.write_text(line);
        self.check(r);
        let r = self.display.write_text("\n");
        self.check(r);
    }

    fn end_frame(&mut self) {
        let r = self.display.flush();
        self.check(r);
    }
}
