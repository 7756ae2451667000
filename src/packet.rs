//! Received packet: payload bytes plus link-quality telemetry.
//!
//! Fixed-size, stack-allocated. One is built per successful drain and
//! dropped once it has been rendered.

use core::fmt;

/// Largest LoRa payload the SX127x FIFO can deliver.
pub const MAX_PAYLOAD_LEN: usize = 255;

/// One successfully decoded packet.
#[derive(Clone, Copy)]
pub struct ReceivedPacket {
    /// Payload bytes (only the first `len` are valid).
    payload: [u8; MAX_PAYLOAD_LEN],
    /// Payload length.
    len: u8,
    /// Packet RSSI in dBm.
    pub rssi_dbm: f32,
    /// Packet SNR in dB.
    pub snr_db: f32,
    /// Carrier frequency error in Hz.
    pub freq_error_hz: f32,
}

impl ReceivedPacket {
    /// Build a packet from payload bytes and telemetry.
    ///
    /// Payloads longer than [`MAX_PAYLOAD_LEN`] are truncated.
    pub fn new(payload: &[u8], rssi_dbm: f32, snr_db: f32, freq_error_hz: f32) -> Self {
        let len = payload.len().min(MAX_PAYLOAD_LEN);
        let mut buf = [0u8; MAX_PAYLOAD_LEN];
        buf[..len].copy_from_slice(&payload[..len]);

        Self {
            payload: buf,
            len: len as u8,
            rssi_dbm,
            snr_db,
            freq_error_hz,
        }
    }

    /// Payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len as usize]
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// True for a zero-length payload.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Payload as displayable text.
    #[inline]
    pub fn text(&self) -> PayloadText<'_> {
        PayloadText(self.payload())
    }
}

impl fmt::Debug for ReceivedPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceivedPacket")
            .field("payload", &self.text())
            .field("rssi_dbm", &self.rssi_dbm)
            .field("snr_db", &self.snr_db)
            .field("freq_error_hz", &self.freq_error_hz)
            .finish()
    }
}

/// Payload bytes rendered as text.
///
/// Valid UTF-8 is written as-is. Each invalid sequence becomes a single
/// `?` so a garbled payload that passed CRC still renders.
#[derive(Clone, Copy)]
pub struct PayloadText<'a>(pub &'a [u8]);

impl fmt::Display for PayloadText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;

        while !rest.is_empty() {
            match core::str::from_utf8(rest) {
                Ok(valid) => return f.write_str(valid),
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    // SAFETY: from_utf8 just validated this prefix.
                    f.write_str(unsafe { core::str::from_utf8_unchecked(valid) })?;
                    f.write_str("?")?;

                    // `None` means the input ended mid-sequence.
                    let skip = err.error_len().unwrap_or(after.len());
                    rest = &after[skip..];
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for PayloadText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}
