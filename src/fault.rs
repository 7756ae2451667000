//! Fault latch for LoRaRxNode.
//!
//! # Philosophy (from ARCHITECTURE.md §4)
//!
//! > A receiver that silently receives nothing is worse than a halted one.
//! > If the radio will not come up, FAULT and stop.
//!
//! A node running with a dead radio looks alive and lies.
//! A halted node is obviously broken and gets power-cycled.
//!
//! The latch is one `AtomicU32`: startup stage in bits 16..24, driver
//! status code in bits 0..16. Zero means healthy. There is no clear.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::radio::{FaultReason, StatusCode};

/// Startup stage that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// Healthy.
    None = 0,

    /// Transceiver did not accept its configuration at startup.
    RadioInit = 1,

    /// Transceiver refused to enter continuous receive.
    RadioListen = 2,

    /// Packet-received interrupt could not be installed.
    InterruptSetup = 3,
}

impl FaultCode {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => FaultCode::RadioInit,
            2 => FaultCode::RadioListen,
            3 => FaultCode::InterruptSetup,
            _ => FaultCode::None,
        }
    }

    /// Short stage name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::None => "none",
            FaultCode::RadioInit => "radio init",
            FaultCode::RadioListen => "radio listen",
            FaultCode::InterruptSetup => "interrupt setup",
        }
    }
}

/// First fatal error of the session, readable from any context.
///
/// Written once by the receive loop; read by the runtime (park loop,
/// status LED, debugger).
///
/// ```ignore
/// static FAULT: FaultState = FaultState::new();
///
/// if let Some(fault) = FAULT.snapshot() {
///     park_forever();
/// }
/// ```
pub struct FaultState {
    word: AtomicU32,
}

impl FaultState {
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(0),
        }
    }

    fn pack(stage: FaultCode, status: StatusCode) -> u32 {
        ((stage as u32) << 16) | (status as u16 as u32)
    }

    /// Record a fault. Only the first one sticks, so the root cause stays
    /// visible. Returns `true` if this call latched.
    pub fn latch(&self, stage: FaultCode, reason: FaultReason) -> bool {
        if stage == FaultCode::None {
            return false;
        }
        self.word
            .compare_exchange(
                0,
                Self::pack(stage, reason.code()),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.word.load(Ordering::Acquire) != 0
    }

    /// Failed stage, `FaultCode::None` while healthy.
    #[inline]
    pub fn stage(&self) -> FaultCode {
        FaultCode::from_bits((self.word.load(Ordering::Acquire) >> 16) as u8)
    }

    /// Driver status code behind the fault (0 while healthy).
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.word.load(Ordering::Acquire) as u16 as StatusCode
    }

    /// Both halves from a single load.
    pub fn snapshot(&self) -> Option<FaultSnapshot> {
        match self.word.load(Ordering::Acquire) {
            0 => None,
            word => Some(FaultSnapshot {
                stage: FaultCode::from_bits((word >> 16) as u8),
                status: word as u16 as StatusCode,
            }),
        }
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultSnapshot {
    pub stage: FaultCode,
    pub status: StatusCode,
}
