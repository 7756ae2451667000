//! RT-safe logging for LoRaRxNode.
//!
//! # Architecture (from ARCHITECTURE.md §5)
//!
//! ```text
//! Receive loop           LogStream            UART drain
//! ────────────           ─────────            ──────────
//!
//! rt_log!() ──────────▶ [R0][R1][R2] ──────▶ UART TX
//! formats in place       SPSC ring            between polls
//! no allocation          fixed slots
//! ```
//!
//! # Rules
//!
//! - RULE 5.1.1: The receive path shall NEVER call blocking log functions
//! - RULE 5.1.2: The DIO0 interrupt handler shall not log at all
//! - RULE 5.1.3: The receive path uses rt_log!() and friends
//! - RULE 5.2.1: Log messages may be dropped if ring full

use core::cell::UnsafeCell;
use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU32, Ordering};

/// Longest record text. A full status line (`RX:` + 255-byte payload)
/// fits without truncation.
pub const MAX_MSG_LEN: usize = 272;

/// Ring capacity of the node log (records).
pub const LOG_BUFFER_SIZE: usize = 32;

/// Severity. Lower is more severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
}

impl LogLevel {
    /// Upper-case label printed on the UART.
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
        }
    }
}

/// One log line as stored in the ring.
#[derive(Clone, Copy)]
pub struct LogRecord {
    /// Time the line was produced (µs since boot).
    pub at_us: i64,
    pub level: LogLevel,
    len: u16,
    text: [u8; MAX_MSG_LEN],
}

impl LogRecord {
    const BLANK: Self = Self {
        at_us: 0,
        level: LogLevel::Info,
        len: 0,
        text: [0; MAX_MSG_LEN],
    };

    /// Build a record, cutting `text` at [`MAX_MSG_LEN`].
    pub fn new(at_us: i64, level: LogLevel, text: &[u8]) -> Self {
        let mut record = Self::BLANK;
        record.fill(at_us, level, text);
        record
    }

    fn fill(&mut self, at_us: i64, level: LogLevel, text: &[u8]) {
        let len = text.len().min(MAX_MSG_LEN);
        self.at_us = at_us;
        self.level = level;
        self.text[..len].copy_from_slice(&text[..len]);
        self.len = len as u16;
    }

    fn fill_fmt(&mut self, at_us: i64, level: LogLevel, args: fmt::Arguments<'_>) {
        self.at_us = at_us;
        self.level = level;
        let mut out = TextBuf::new(&mut self.text);
        let _ = out.write_fmt(args);
        self.len = out.len() as u16;
    }

    /// Message bytes.
    #[inline]
    pub fn text(&self) -> &[u8] {
        &self.text[..self.len as usize]
    }
}

impl fmt::Debug for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRecord")
            .field("at_us", &self.at_us)
            .field("level", &self.level)
            .field("text", &crate::packet::PayloadText(self.text()))
            .finish()
    }
}

/// Fixed-capacity log ring, one producer and one consumer.
///
/// The receive loop pushes, the UART drain pops. A push into a full ring
/// is counted and discarded; it never waits.
pub struct LogStream<const N: usize = LOG_BUFFER_SIZE> {
    slots: UnsafeCell<[LogRecord; N]>,
    /// Next slot to write. Only the producer stores.
    head: AtomicU32,
    /// Next slot to read. Only the consumer stores.
    tail: AtomicU32,
    overflow: AtomicU32,
}

// SAFETY: the producer only writes the slot at `head`, which lies outside
// [tail, head) until `head` is published; the consumer only reads slots
// inside [tail, head).
unsafe impl<const N: usize> Sync for LogStream<N> {}
unsafe impl<const N: usize> Send for LogStream<N> {}

impl<const N: usize> LogStream<N> {
    pub const fn new() -> Self {
        // Indices wrap at u32::MAX; a power of two keeps slot mapping stable
        assert!(N.is_power_of_two(), "LogStream capacity must be a power of 2");

        Self {
            slots: UnsafeCell::new([LogRecord::BLANK; N]),
            head: AtomicU32::new(0),
            tail: AtomicU32::new(0),
            overflow: AtomicU32::new(0),
        }
    }

    /// Queue raw text. Returns `false` if the ring was full.
    #[inline]
    pub fn push(&self, at_us: i64, level: LogLevel, text: &[u8]) -> bool {
        self.publish(|slot| slot.fill(at_us, level, text))
    }

    /// Format straight into the next free slot. Returns `false` if the
    /// ring was full.
    #[inline]
    pub fn push_fmt(&self, at_us: i64, level: LogLevel, args: fmt::Arguments<'_>) -> bool {
        self.publish(|slot| slot.fill_fmt(at_us, level, args))
    }

    fn publish(&self, fill: impl FnOnce(&mut LogRecord)) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head.wrapping_sub(tail) as usize >= N {
            self.overflow.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // SAFETY: see the Sync impl; this slot is invisible to the consumer
        // until the store below.
        let slot = unsafe { &mut (*self.slots.get())[head as usize % N] };
        fill(slot);

        self.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// Oldest queued record, if any.
    #[inline]
    pub fn pop(&self) -> Option<LogRecord> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: slot published by the producer's Release store on `head`
        let record = unsafe { (*self.slots.get())[tail as usize % N] };

        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(record)
    }

    /// Records discarded since the last [`take_dropped`](Self::take_dropped).
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.overflow.load(Ordering::Relaxed)
    }

    /// Read and reset the discard counter in one step.
    #[inline]
    pub fn take_dropped(&self) -> u32 {
        self.overflow.swap(0, Ordering::Relaxed)
    }

    /// Records waiting to be popped.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        self.head.load(Ordering::Acquire).wrapping_sub(tail) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> Default for LogStream<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Format into `buf`, cutting off what does not fit. Returns bytes written.
#[inline]
pub fn format_into(buf: &mut [u8], args: fmt::Arguments<'_>) -> usize {
    let mut out = TextBuf::new(buf);
    let _ = out.write_fmt(args);
    out.len()
}

/// `fmt::Write` over a fixed byte slice. Overflow is cut off, never an
/// error, so a long payload cannot abort a status line.
pub struct TextBuf<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> TextBuf<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Write for TextBuf<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let free = &mut self.buf[self.len..];
        let n = s.len().min(free.len());
        free[..n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

/// Log from the receive path.
///
/// Formats into the ring slot directly; when the ring is full the record
/// is counted as dropped.
///
/// ```ignore
/// rt_log!(LogLevel::Warn, LOG_STREAM, now_us, "CRC error!");
/// ```
#[macro_export]
macro_rules! rt_log {
    ($level:expr, $stream:expr, $at_us:expr, $($arg:tt)*) => {{
        let _ = $stream.push_fmt($at_us, $level, format_args!($($arg)*));
    }};
}

/// [`rt_log!`] at info level.
#[macro_export]
macro_rules! rt_info {
    ($stream:expr, $at_us:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Info, $stream, $at_us, $($arg)*)
    };
}

/// [`rt_log!`] at warn level.
#[macro_export]
macro_rules! rt_warn {
    ($stream:expr, $at_us:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Warn, $stream, $at_us, $($arg)*)
    };
}

/// [`rt_log!`] at error level.
#[macro_export]
macro_rules! rt_error {
    ($stream:expr, $at_us:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Error, $stream, $at_us, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts<const N: usize>(stream: &LogStream<N>) -> Vec<Vec<u8>> {
        core::iter::from_fn(|| stream.pop())
            .map(|r| r.text().to_vec())
            .collect()
    }

    #[test]
    fn test_push_pop() {
        let ring = LogStream::<16>::new();
        assert!(ring.is_empty());

        assert!(ring.push(1000, LogLevel::Info, b"RX:PING"));
        assert_eq!(ring.len(), 1);

        let record = ring.pop().unwrap();
        assert_eq!(record.at_us, 1000);
        assert_eq!(record.level, LogLevel::Info);
        assert_eq!(record.text(), b"RX:PING");
        assert!(ring.pop().is_none());
    }

    #[test]
    fn test_full_ring_drops_newest() {
        let ring = LogStream::<4>::new();
        for i in 0..4u8 {
            assert!(ring.push(i as i64, LogLevel::Warn, &[b'a' + i]));
        }

        assert!(!ring.push(9, LogLevel::Warn, b"z"));
        assert!(!ring.push(9, LogLevel::Warn, b"z"));
        assert_eq!(ring.dropped(), 2);

        ring.pop();
        assert!(ring.push(5, LogLevel::Warn, b"e"));
        assert_eq!(texts(&ring), vec![b"b", b"c", b"d", b"e"]);
    }

    #[test]
    fn test_take_dropped_resets() {
        let ring = LogStream::<1>::new();
        ring.push(0, LogLevel::Info, b"kept");
        ring.push(0, LogLevel::Info, b"lost");

        assert_eq!(ring.take_dropped(), 1);
        assert_eq!(ring.take_dropped(), 0);
    }

    #[test]
    fn test_long_text_cut() {
        let ring = LogStream::<2>::new();
        ring.push(0, LogLevel::Info, &[b'x'; MAX_MSG_LEN + 40]);
        assert_eq!(ring.pop().unwrap().text().len(), MAX_MSG_LEN);

        let record = LogRecord::new(0, LogLevel::Info, &[b'y'; MAX_MSG_LEN * 2]);
        assert_eq!(record.text().len(), MAX_MSG_LEN);
    }

    #[test]
    fn test_push_fmt_overwrites_stale_slot() {
        let ring = LogStream::<1>::new();
        ring.push(0, LogLevel::Info, b"a much longer earlier line");
        ring.pop();

        crate::rt_warn!(ring, 3, "timeout!");
        let record = ring.pop().unwrap();
        assert_eq!(record.level, LogLevel::Warn);
        assert_eq!(record.text(), b"timeout!");
    }

    #[test]
    fn test_macros_carry_level_and_time() {
        let ring = LogStream::<8>::new();

        crate::rt_info!(ring, 1, "[{}] Initializing ... success!", "SX1276");
        crate::rt_error!(ring, 2, "failed, code {}", -5);

        let info = ring.pop().unwrap();
        assert_eq!(info.level, LogLevel::Info);
        assert_eq!(info.text(), b"[SX1276] Initializing ... success!");

        let err = ring.pop().unwrap();
        assert_eq!((err.level, err.at_us), (LogLevel::Error, 2));
        assert_eq!(err.text(), b"failed, code -5");
    }

    #[test]
    fn test_format_into_cuts() {
        let mut buf = [0u8; 6];
        let n = format_into(&mut buf, format_args!("RSSI:{:?}dBm", -42.5f32));
        assert_eq!(&buf[..n], b"RSSI:-");

        let mut out = TextBuf::new(&mut buf);
        assert!(out.is_empty());
        let _ = write!(out, "ok");
        assert_eq!(out.as_bytes(), b"ok");
    }

    #[test]
    fn test_severity_order() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert_eq!(LogLevel::Warn.tag(), "WARN");
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        use std::sync::Arc;
        use std::thread;

        let ring = Arc::new(LogStream::<8>::new());

        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for i in 0..1000i64 {
                    while !ring.push_fmt(i, LogLevel::Info, format_args!("line {}", i)) {
                        thread::yield_now();
                    }
                }
            })
        };

        let mut next = 0i64;
        while next < 1000 {
            match ring.pop() {
                Some(record) => {
                    assert_eq!(record.at_us, next);
                    assert_eq!(record.text(), format!("line {}", next).as_bytes());
                    next += 1;
                }
                None => thread::yield_now(),
            }
        }

        producer.join().unwrap();
        assert!(ring.is_empty());
    }
}
