//! Radio link: the transceiver seen through the operations the receive loop
//! needs, with raw driver status codes classified into outcomes.
//!
//! # Rules (from ARCHITECTURE.md §4)
//!
//! - RULE 4.1.1: Init-class failures (begin, start receive) are fatal
//! - RULE 4.1.2: Per-packet failures (timeout, CRC, other) are informational
//! - RULE 4.1.3: `OtherError` keeps the raw code, its meaning is
//!   driver-specific
//! - RULE 4.2.1: `drain_packet()` is only called after the packet signal
//!   was taken (enforced by `ReceiveLoop`, not here)

use core::fmt;

use crate::packet::{ReceivedPacket, MAX_PAYLOAD_LEN};
use crate::signal::PacketSignal;

/// Raw driver status code (RadioLib-compatible numbering, 0 = success).
pub type StatusCode = i16;

/// Driver status codes.
pub mod status {
    use super::StatusCode;

    pub const NONE: StatusCode = 0;
    pub const UNKNOWN: StatusCode = -1;
    pub const CHIP_NOT_FOUND: StatusCode = -2;
    pub const PACKET_TOO_LONG: StatusCode = -4;
    pub const RX_TIMEOUT: StatusCode = -6;
    pub const CRC_MISMATCH: StatusCode = -7;
    pub const INVALID_BANDWIDTH: StatusCode = -8;
    pub const INVALID_SPREADING_FACTOR: StatusCode = -9;
    pub const INVALID_CODING_RATE: StatusCode = -10;
    pub const INVALID_FREQUENCY: StatusCode = -12;
    pub const INVALID_OUTPUT_POWER: StatusCode = -13;
    pub const SPI_WRITE_FAILED: StatusCode = -16;
    pub const INVALID_CURRENT_LIMIT: StatusCode = -17;
    pub const INVALID_PREAMBLE_LENGTH: StatusCode = -18;
    pub const INVALID_GAIN: StatusCode = -19;
    pub const WRONG_MODEM: StatusCode = -20;
}

/// Transceiver driver surface consumed by [`RadioLink`].
///
/// Implemented by [`crate::hal::sx1276::Sx1276`] on hardware and by mocks
/// in tests.
pub trait RadioDriver {
    /// Short chip name used as a log tag (e.g. `"SX1276"`).
    const NAME: &'static str;

    /// Reset and configure the transceiver with its default parameters.
    fn begin(&mut self) -> Result<(), StatusCode>;

    /// Arm continuous receive mode.
    fn start_receive(&mut self) -> Result<(), StatusCode>;

    /// Read the buffered packet into `buf`, returning the payload length.
    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, StatusCode>;

    /// RSSI of the last packet in dBm.
    fn rssi(&mut self) -> f32;

    /// SNR of the last packet in dB.
    fn snr(&mut self) -> f32;

    /// Frequency error of the last packet in Hz.
    fn frequency_error(&mut self) -> f32;

    /// Route the packet-received interrupt to `signal`.
    ///
    /// The handler installed here must do nothing but `signal.raise()`.
    fn set_packet_received_action(&mut self, signal: &'static PacketSignal)
        -> Result<(), StatusCode>;
}

/// Why the radio could not be brought up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultReason {
    /// Transceiver did not answer on the bus (wrong or missing chip).
    ChipNotFound,
    /// A configuration parameter was rejected.
    InvalidParameter(StatusCode),
    /// Bus transfer failed.
    BusFailure(StatusCode),
    /// Anything else.
    Other(StatusCode),
}

impl FaultReason {
    /// Classify a non-zero driver status code.
    pub fn from_status(code: StatusCode) -> Self {
        match code {
            status::CHIP_NOT_FOUND => FaultReason::ChipNotFound,
            status::SPI_WRITE_FAILED => FaultReason::BusFailure(code),
            status::INVALID_BANDWIDTH
            | status::INVALID_SPREADING_FACTOR
            | status::INVALID_CODING_RATE
            | status::INVALID_FREQUENCY
            | status::INVALID_OUTPUT_POWER
            | status::INVALID_CURRENT_LIMIT
            | status::INVALID_PREAMBLE_LENGTH
            | status::INVALID_GAIN
            | status::WRONG_MODEM => FaultReason::InvalidParameter(code),
            _ => FaultReason::Other(code),
        }
    }

    /// Underlying driver status code.
    pub fn code(&self) -> StatusCode {
        match *self {
            FaultReason::ChipNotFound => status::CHIP_NOT_FOUND,
            FaultReason::InvalidParameter(code)
            | FaultReason::BusFailure(code)
            | FaultReason::Other(code) => code,
        }
    }

    /// Short description.
    pub fn message(&self) -> &'static str {
        match self {
            FaultReason::ChipNotFound => "chip not found",
            FaultReason::InvalidParameter(_) => "configuration rejected",
            FaultReason::BusFailure(_) => "bus failure",
            FaultReason::Other(_) => "radio error",
        }
    }
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code())
    }
}

/// Result of one drain attempt.
#[derive(Debug, Clone, Copy)]
pub enum ReceiveOutcome {
    /// Packet decoded.
    Success(ReceivedPacket),
    /// Nothing arrived in time.
    Timeout,
    /// Packet arrived with a CRC mismatch.
    Malformed,
    /// Any other driver status.
    OtherError(StatusCode),
}

impl ReceiveOutcome {
    /// Classify a failed `read_data` status.
    pub fn from_status(code: StatusCode) -> Self {
        match code {
            status::RX_TIMEOUT => ReceiveOutcome::Timeout,
            status::CRC_MISMATCH => ReceiveOutcome::Malformed,
            other => ReceiveOutcome::OtherError(other),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, ReceiveOutcome::Success(_))
    }
}

/// Radio link over a concrete driver.
pub struct RadioLink<D> {
    driver: D,
}

impl<D: RadioDriver> RadioLink<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    /// Configure the transceiver with its defaults.
    ///
    /// No retry: a failure here is fatal for the session.
    pub fn initialize(&mut self) -> Result<(), FaultReason> {
        self.driver.begin().map_err(FaultReason::from_status)
    }

    /// Arm continuous receive. Same failure contract as [`initialize`].
    ///
    /// [`initialize`]: RadioLink::initialize
    pub fn start_listening(&mut self) -> Result<(), FaultReason> {
        self.driver.start_receive().map_err(FaultReason::from_status)
    }

    /// Install the packet-received interrupt handler.
    pub fn register_interrupt(&mut self, signal: &'static PacketSignal) -> Result<(), FaultReason> {
        self.driver
            .set_packet_received_action(signal)
            .map_err(FaultReason::from_status)
    }

    /// Read the one buffered packet and classify the result.
    ///
    /// Telemetry is sampled right after a successful read, while the
    /// packet registers still describe this packet.
    pub fn drain_packet(&mut self) -> ReceiveOutcome {
        let mut buf = [0u8; MAX_PAYLOAD_LEN];

        match self.driver.read_data(&mut buf) {
            Ok(len) => {
                let len = len.min(buf.len());
                let rssi = self.driver.rssi();
                let snr = self.driver.snr();
                let freq_error = self.driver.frequency_error();
                ReceiveOutcome::Success(ReceivedPacket::new(&buf[..len], rssi, snr, freq_error))
            }
            Err(code) => ReceiveOutcome::from_status(code),
        }
    }

    /// RSSI of the most recent packet. Stale unless called right after a
    /// successful drain.
    #[inline]
    pub fn current_rssi(&mut self) -> f32 {
        self.driver.rssi()
    }

    /// SNR of the most recent packet. Same staleness caveat as RSSI.
    #[inline]
    pub fn current_snr(&mut self) -> f32 {
        self.driver.snr()
    }

    /// Frequency error of the most recent packet. Same staleness caveat.
    #[inline]
    pub fn current_frequency_error(&mut self) -> f32 {
        self.driver.frequency_error()
    }

    /// Chip name for log tags.
    #[inline]
    pub fn name(&self) -> &'static str {
        D::NAME
    }

    #[inline]
    pub fn driver(&self) -> &D {
        &self.driver
    }
}
