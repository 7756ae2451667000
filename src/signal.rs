//! Packet-ready signal shared between the DIO0 interrupt and the main loop.
//!
//! # Architecture (from ARCHITECTURE.md §3)
//!
//! ```text
//! DIO0 ISR                PacketSignal              Main loop
//! ────────                ────────────              ─────────
//!
//! raise() ──────────────▶ [ pending ] ◀──────────── take()
//! store(true)              AtomicBool               swap(false)
//! never blocks                                      one drain if set
//! ```
//!
//! # Rules
//!
//! - RULE 3.1.1: The ISR only calls `raise()`. No radio access, no logging,
//!   no allocation.
//! - RULE 3.1.2: The main loop clears with an atomic swap BEFORE draining,
//!   so a packet signalled during the drain is seen on the next poll.
//! - RULE 3.1.3: Two raises without an intervening `take()` coalesce into
//!   one drain. The SX1276 FIFO holds a single packet, so nothing more can
//!   be pending anyway.

use core::sync::atomic::{AtomicBool, Ordering};

/// Single-bit handshake between interrupt context and the polling loop.
///
/// # Usage
///
/// ```ignore
/// static SIGNAL: PacketSignal = PacketSignal::new();
///
/// // In the DIO0 handler:
/// SIGNAL.raise();
///
/// // In the main loop:
/// if SIGNAL.take() {
///     radio.drain_packet();
/// }
/// ```
pub struct PacketSignal {
    pending: AtomicBool,
}

impl PacketSignal {
    /// Create a new signal (nothing pending).
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Mark a packet as available. ISR-safe.
    #[inline]
    pub fn raise(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Test-and-clear.
    ///
    /// Returns `true` exactly once per run of raises, and leaves the flag
    /// clear. The `Acquire` half pairs with the `Release` in [`raise`] so
    /// the main loop observes everything the ISR did before raising.
    ///
    /// [`raise`]: PacketSignal::raise
    #[inline]
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Peek without clearing (diagnostics only).
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for PacketSignal {
    fn default() -> Self {
        Self::new()
    }
}
