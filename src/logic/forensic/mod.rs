//! Forensic Module - Tamper-resistant event trail
//!
//! # Architecture
//! - `cipher.rs`: key derivation and the XOR obfuscation transform
//! - `collector.rs`: append-only writer, one file open per record
//! - `reader.rs`: inverse transform for investigators
//!
//! # Failure Strategy
//! Write failures never reach the caller: monitoring continues and the
//! failure is logged and counted.

pub mod cipher;
pub mod collector;
pub mod reader;

pub use cipher::{ObfuscationKey, SeedOrigin};
pub use collector::{CollectorStats, ForensicCollector};
pub use reader::{read_events, read_records, ForensicLog};

#[derive(Debug)]
pub enum ForensicError {
    IoError(std::io::Error),
    SerializationError(serde_json::Error),
}

impl std::fmt::Display for ForensicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForensicError::IoError(e) => write!(f, "IO Error: {}", e),
            ForensicError::SerializationError(e) => write!(f, "Serialization Error: {}", e),
        }
    }
}

impl std::error::Error for ForensicError {}

impl From<std::io::Error> for ForensicError {
    fn from(err: std::io::Error) -> Self {
        ForensicError::IoError(err)
    }
}

impl From<serde_json::Error> for ForensicError {
    fn from(err: serde_json::Error) -> Self {
        ForensicError::SerializationError(err)
    }
}
