//! # LoRaRxNode
//!
//! Receive-only LoRa node: interrupt-driven packet reception, status shown
//! on a serial log and a small OLED.
//!
//! ## Architecture
//!
//! ```text
//! DIO0 ISR ──▶ PacketSignal ──▶ ReceiveLoop::poll() ──▶ RadioLink::drain_packet()
//!                                      │
//!                     ┌────────────────┴───────────────┐
//!                  Success                    Timeout / CRC / other
//!                     │                                │
//!              StatusRenderer                    rt_warn!/rt_error!
//!              ┌──────┴──────┐                         │
//!           LogSink     DisplaySink                LOG_STREAM
//! ```
//!
//! - The ISR touches one atomic bit, nothing else
//! - One cooperative loop does all radio, display and log work
//! - A radio that will not start halts the node (fail-stop)
//!
//! See ARCHITECTURE.md for the design rules.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod fault;
pub mod hal;
pub mod log_globals;
pub mod logging;
pub mod packet;
pub mod radio;
pub mod receiver;
pub mod render;
pub mod signal;
pub mod sink;
pub mod uart_logger;

pub use config::NodeConfig;
pub use fault::{FaultCode, FaultState};
pub use log_globals::LOG_STREAM;
pub use packet::ReceivedPacket;
pub use radio::{FaultReason, RadioDriver, RadioLink, ReceiveOutcome};
pub use receiver::{ReceiveLoop, ReceiveStats, SessionState};
pub use render::{StatusRenderer, StatusSink};
pub use signal::PacketSignal;
pub use sink::{DisplayDriver, DisplaySink, LogSink};
