//! Receive loop: radio session state machine and per-packet dispatch.
//!
//! # State machine (from ARCHITECTURE.md §2)
//!
//! ```text
//!                 start() ok
//! Uninitialized ─────────────▶ Listening ──┐ poll(): drain + dispatch
//!       │                          ▲       │ (any outcome)
//!       │ start() failed           └───────┘
//!       ▼
//!     Fault  (terminal, no further radio operations)
//! ```
//!
//! # Rules
//!
//! - RULE 2.1.1: Startup failure is fail-stop. No retry, no backoff.
//! - RULE 2.1.2: In Fault, `poll()` touches neither the signal nor the radio
//! - RULE 2.2.1: At most one drain per taken signal
//! - RULE 2.2.2: Per-packet errors are logged, never rendered, and never
//!   change the session state
//! - RULE 2.2.3: `poll()` never blocks; an idle poll is a no-op

use crate::fault::{FaultCode, FaultState};
use crate::logging::{LogStream, LOG_BUFFER_SIZE};
use crate::radio::{FaultReason, RadioDriver, RadioLink, ReceiveOutcome};
use crate::render::{StatusRenderer, StatusSink};
use crate::signal::PacketSignal;

/// Logical state of the radio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `start()` not called yet.
    Uninitialized,
    /// Continuous receive armed.
    Listening,
    /// Startup failed at `stage`. Terminal.
    Fault { stage: FaultCode, reason: FaultReason },
}

/// Per-outcome counters.
///
/// `success + timeout + malformed + other == drains` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    pub drains: u32,
    pub success: u32,
    pub timeout: u32,
    pub malformed: u32,
    pub other: u32,
}

impl ReceiveStats {
    fn record(&mut self, outcome: &ReceiveOutcome) {
        self.drains = self.drains.wrapping_add(1);
        let counter = match outcome {
            ReceiveOutcome::Success(_) => &mut self.success,
            ReceiveOutcome::Timeout => &mut self.timeout,
            ReceiveOutcome::Malformed => &mut self.malformed,
            ReceiveOutcome::OtherError(_) => &mut self.other,
        };
        *counter = counter.wrapping_add(1);
    }

    /// Failed drains of any kind.
    pub fn errors(&self) -> u32 {
        self.timeout
            .wrapping_add(self.malformed)
            .wrapping_add(self.other)
    }
}

/// Orchestrates radio, signal, renderer and diagnostics.
///
/// # Example
///
/// ```ignore
/// static SIGNAL: PacketSignal = PacketSignal::new();
/// static FAULT: FaultState = FaultState::new();
///
/// let mut rx = ReceiveLoop::new(radio, (log_sink, display_sink), &SIGNAL, &LOG_STREAM, &FAULT);
///
/// if rx.start(now_us()).is_ok() {
///     loop {
///         rx.poll(now_us());
///         drain_log_to_uart();
///     }
/// }
/// ```
pub struct ReceiveLoop<'a, D, S, const N: usize = LOG_BUFFER_SIZE> {
    radio: RadioLink<D>,
    renderer: StatusRenderer<S>,
    signal: &'static PacketSignal,
    log: &'a LogStream<N>,
    fault: &'a FaultState,
    state: SessionState,
    stats: ReceiveStats,
}

impl<'a, D: RadioDriver, S: StatusSink, const N: usize> ReceiveLoop<'a, D, S, N> {
    /// Create a loop in `Uninitialized`. Nothing touches hardware yet.
    pub fn new(
        radio: D,
        sink: S,
        signal: &'static PacketSignal,
        log: &'a LogStream<N>,
        fault: &'a FaultState,
    ) -> Self {
        Self {
            radio: RadioLink::new(radio),
            renderer: StatusRenderer::new(sink),
            signal,
            log,
            fault,
            state: SessionState::Uninitialized,
            stats: ReceiveStats::default(),
        }
    }

    /// Bring the radio up: initialize, hook the interrupt, arm receive.
    ///
    /// The interrupt is hooked before receive is armed so a packet landing
    /// right after arming still raises the signal.
    ///
    /// On failure the session enters `Fault` for good and the reason is
    /// returned. Calling `start()` again after that returns the same
    /// reason without touching the radio.
    pub fn start(&mut self, now_us: i64) -> Result<(), FaultReason> {
        match self.state {
            SessionState::Listening => return Ok(()),
            SessionState::Fault { reason, .. } => return Err(reason),
            SessionState::Uninitialized => {}
        }

        let name = self.radio.name();

        if let Err(reason) = self.radio.initialize() {
            return Err(self.halt(now_us, FaultCode::RadioInit, "Initializing", reason));
        }
        crate::rt_info!(self.log, now_us, "[{}] Initializing ... success!", name);

        if let Err(reason) = self.radio.register_interrupt(self.signal) {
            return Err(self.halt(now_us, FaultCode::InterruptSetup, "Setting packet action", reason));
        }

        if let Err(reason) = self.radio.start_listening() {
            return Err(self.halt(now_us, FaultCode::RadioListen, "Starting to listen", reason));
        }
        crate::rt_info!(self.log, now_us, "[{}] Starting to listen ... success!", name);

        self.state = SessionState::Listening;
        Ok(())
    }

    fn halt(&mut self, now_us: i64, stage: FaultCode, step: &str, reason: FaultReason) -> FaultReason {
        crate::rt_error!(
            self.log,
            now_us,
            "[{}] {} ... failed, code {}",
            self.radio.name(),
            step,
            reason.code()
        );
        self.fault.latch(stage, reason);
        self.state = SessionState::Fault { stage, reason };
        reason
    }

    /// One loop iteration.
    ///
    /// Returns the drain outcome if the signal was pending, `None` for an
    /// idle iteration or a halted session.
    pub fn poll(&mut self, now_us: i64) -> Option<ReceiveOutcome> {
        if self.state != SessionState::Listening {
            return None;
        }

        // Clear before draining: a packet signalled during the drain is
        // picked up on the next poll.
        if !self.signal.take() {
            return None;
        }

        let outcome = self.radio.drain_packet();
        self.stats.record(&outcome);

        match &outcome {
            ReceiveOutcome::Success(packet) => self.renderer.render_packet(packet),
            ReceiveOutcome::Timeout => crate::rt_warn!(self.log, now_us, "timeout!"),
            ReceiveOutcome::Malformed => crate::rt_warn!(self.log, now_us, "CRC error!"),
            ReceiveOutcome::OtherError(code) => {
                crate::rt_error!(self.log, now_us, "failed, code {}", code)
            }
        }

        Some(outcome)
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True once the session has faulted. The runtime decides what happens
    /// next (reset, deep sleep, park).
    #[inline]
    pub fn is_halted(&self) -> bool {
        matches!(self.state, SessionState::Fault { .. })
    }

    #[inline]
    pub fn stats(&self) -> ReceiveStats {
        self.stats
    }

    #[inline]
    pub fn radio(&self) -> &RadioLink<D> {
        &self.radio
    }

    #[inline]
    pub fn sink(&self) -> &S {
        self.renderer.sink()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::{status, StatusCode};

    struct NullSink;

    impl StatusSink for NullSink {
        fn write_line(&mut self, _: &str) {}
    }

    struct ScriptDriver {
        begin: Result<(), StatusCode>,
        reads: u32,
    }

    impl RadioDriver for ScriptDriver {
        const NAME: &'static str = "SX1276";

        fn begin(&mut self) -> Result<(), StatusCode> {
            self.begin
        }

        fn start_receive(&mut self) -> Result<(), StatusCode> {
            Ok(())
        }

        fn read_data(&mut self, _: &mut [u8]) -> Result<usize, StatusCode> {
            self.reads += 1;
            Err(status::RX_TIMEOUT)
        }

        fn rssi(&mut self) -> f32 {
            0.0
        }

        fn snr(&mut self) -> f32 {
            0.0
        }

        fn frequency_error(&mut self) -> f32 {
            0.0
        }

        fn set_packet_received_action(&mut self, _: &'static PacketSignal) -> Result<(), StatusCode> {
            Ok(())
        }
    }

    fn leak_signal() -> &'static PacketSignal {
        Box::leak(Box::new(PacketSignal::new()))
    }

    #[test]
    fn test_start_logs_success_lines() {
        let log = LogStream::<8>::new();
        let fault = FaultState::new();
        let driver = ScriptDriver { begin: Ok(()), reads: 0 };
        let mut rx = ReceiveLoop::new(driver, NullSink, leak_signal(), &log, &fault);

        assert_eq!(rx.start(5), Ok(()));
        assert_eq!(rx.state(), SessionState::Listening);

        assert_eq!(log.pop().unwrap().text(), b"[SX1276] Initializing ... success!");
        assert_eq!(log.pop().unwrap().text(), b"[SX1276] Starting to listen ... success!");
    }

    #[test]
    fn test_init_failure_halts() {
        let log = LogStream::<8>::new();
        let fault = FaultState::new();
        let signal = leak_signal();
        let driver = ScriptDriver { begin: Err(status::CHIP_NOT_FOUND), reads: 0 };
        let mut rx = ReceiveLoop::new(driver, NullSink, signal, &log, &fault);

        assert_eq!(rx.start(0), Err(FaultReason::ChipNotFound));
        assert!(rx.is_halted());
        assert_eq!(log.pop().unwrap().text(), b"[SX1276] Initializing ... failed, code -2");
        assert_eq!(fault.stage(), FaultCode::RadioInit);

        // Signal stays untouched, radio never read
        signal.raise();
        assert!(rx.poll(1).is_none());
        assert!(signal.is_pending());
        assert_eq!(rx.radio().driver().reads, 0);

        // Restart attempt is refused
        assert_eq!(rx.start(2), Err(FaultReason::ChipNotFound));
    }

    #[test]
    fn test_stats_record() {
        let mut stats = ReceiveStats::default();
        stats.record(&ReceiveOutcome::Timeout);
        stats.record(&ReceiveOutcome::Malformed);
        stats.record(&ReceiveOutcome::OtherError(-1));

        assert_eq!(stats.drains, 3);
        assert_eq!(stats.errors(), 3);
        assert_eq!(stats.success, 0);
    }
}
