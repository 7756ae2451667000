//! Hardware Abstraction Layer for LoRaRxNode.
//!
//! Thin drivers over `embedded-hal` 1.0 traits.
//! Business logic stays in core modules, HAL is just I/O.

pub mod oled;
pub mod sx1276;

pub use oled::{OledText, TextCursor};
pub use sx1276::{ReceiveInterrupt, Sx1276, Sx1276Error, SX1276_VERSION};
