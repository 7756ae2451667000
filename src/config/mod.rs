//! Module: config
//!
//! Purpose: Fixed node configuration for LoRaRxNode.
//!
//! Architecture:
//! - Plain structs with `Default` impls, grouped under [`NodeConfig`]
//! - Radio defaults match the RadioLib SX127x defaults so the node talks
//!   to stock senders out of the box
//! - Nothing is persisted; a different setup means a different build
//! - Pin wiring lives in main.rs, next to the peripherals it claims
//!
//! Safety: Read-only after boot. No atomics needed.

use crate::uart_logger::UartLoggerConfig;

/// LoRa modem parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadioConfig {
    /// Carrier frequency in Hz.
    pub frequency_hz: u32,
    /// Signal bandwidth in Hz (one of the SX127x steps, 7_800..=500_000).
    pub bandwidth_hz: u32,
    /// Spreading factor (6-12).
    pub spreading_factor: u8,
    /// Coding rate denominator: 5..=8 for 4/5..4/8.
    pub coding_rate: u8,
    /// LoRa sync word.
    pub sync_word: u8,
    /// Output power on PA_BOOST in dBm (2-17).
    pub output_power_dbm: i8,
    /// Preamble length in symbols (>= 6).
    pub preamble_len: u16,
    /// Append and check payload CRC.
    pub crc: bool,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 434_000_000,
            bandwidth_hz: 125_000,
            spreading_factor: 9,
            coding_rate: 7,
            sync_word: 0x12,
            output_power_dbm: 10,
            preamble_len: 8,
            crc: true,
        }
    }
}

/// OLED panel setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    /// I2C address (0x3C for 128x32 panels).
    pub i2c_address: u8,
    /// Mounted upside down.
    pub rotate_180: bool,
    /// Text columns at the 6x8 font.
    pub columns: u8,
    /// Text rows at the 6x8 font.
    pub rows: u8,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            i2c_address: 0x3C,
            rotate_180: true,
            columns: 21,
            rows: 4,
        }
    }
}

/// Whole-node configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeConfig {
    pub radio: RadioConfig,
    pub display: DisplayConfig,
    pub uart: UartLoggerConfig,
}
