//! Global log stream instance.
//!
//! Single stream following ARCHITECTURE.md §5.1:
//! "one cooperative thread produces, the UART drain consumes"

use crate::logging::LogStream;

/// Node log stream.
///
/// Producer: the receive loop (startup, status lines, diagnostics).
/// Consumer: the UART drain between polls.
/// The DIO0 interrupt never touches it.
pub static LOG_STREAM: LogStream = LogStream::new();
