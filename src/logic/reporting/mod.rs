//! Reporting Module - Event sinks
//!
//! Every processed event is handed to each sink in registration order.
//! A failing sink is logged by the caller and never blocks the next one.
//!
//! ## Structure
//! - `jsonl.rs` - machine-readable stream, one event per line
//! - `html.rs` - human-readable dashboard table, rows appended
//! - `console.rs` - log alert for high-risk events

pub mod jsonl;
pub mod html;
pub mod console;

use crate::logic::telemetry::SecurityEvent;

pub use console::ConsoleAlertReporter;
pub use html::HtmlReporter;
pub use jsonl::JsonLinesReporter;

/// Output sink for processed events
pub trait EventSink: Send {
    fn name(&self) -> &str;
    fn handle(&mut self, event: &SecurityEvent) -> Result<(), ReportError>;
}

#[derive(Debug)]
pub enum ReportError {
    IoError(std::io::Error),
    SerializationError(serde_json::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::IoError(e) => write!(f, "IO Error: {}", e),
            ReportError::SerializationError(e) => write!(f, "Serialization Error: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<std::io::Error> for ReportError {
    fn from(err: std::io::Error) -> Self {
        ReportError::IoError(err)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::SerializationError(err)
    }
}
