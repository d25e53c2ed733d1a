//! Detection Module - Deeper inspection of risky events
//!
//! The cascade runs only for events whose risk reached the medium
//! threshold. Detectors annotate the event (new `details` keys, raised
//! severity); they never remove anything and never re-score it.
//!
//! # Architecture
//! - `signature.rs`: compiled YARA rules against the referenced file
//! - `ransomware.rs`: encrypted-extension indicator for FILE events
//! - `behavior.rs`: per-event behavior note
//! - `heuristic.rs`: process heuristics used by the process sensor

pub mod heuristic;
pub mod signature;
pub mod ransomware;
pub mod behavior;

use crate::logic::telemetry::SecurityEvent;

pub use behavior::BehaviorAnalyzer;
pub use heuristic::{HeuristicEngine, ProcessInfo};
pub use ransomware::RansomwareDetector;
pub use signature::SignatureScanner;

#[derive(Debug)]
pub enum DetectionError {
    IoError(std::io::Error),
    InvalidRules(String),
    ScanFailed(String),
}

impl std::fmt::Display for DetectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionError::IoError(e) => write!(f, "IO Error: {}", e),
            DetectionError::InvalidRules(msg) => write!(f, "Invalid rules: {}", msg),
            DetectionError::ScanFailed(msg) => write!(f, "Scan failed: {}", msg),
        }
    }
}

impl std::error::Error for DetectionError {}

impl From<std::io::Error> for DetectionError {
    fn from(err: std::io::Error) -> Self {
        DetectionError::IoError(err)
    }
}

/// One stage of the cascade
pub trait Detector: Send {
    fn name(&self) -> &str;
    fn inspect(&mut self, event: &mut SecurityEvent) -> Result<(), DetectionError>;
}

/// Ordered detector list; a failing detector does not stop the next one
pub struct DetectionCascade {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectionCascade {
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// signature -> ransomware -> behavior
    pub fn standard(scanner: SignatureScanner) -> Self {
        Self::new()
            .with_detector(Box::new(scanner))
            .with_detector(Box::new(RansomwareDetector::new()))
            .with_detector(Box::new(BehaviorAnalyzer::new()))
    }

    pub fn with_detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Run every detector in order. Returns the number that failed.
    pub fn run(&mut self, event: &mut SecurityEvent) -> usize {
        let mut failures = 0;
        for detector in self.detectors.iter_mut() {
            if let Err(e) = detector.inspect(event) {
                failures += 1;
                log::error!("[cascade:{}] failed on event {}: {}", detector.name(), event.id(), e);
            }
        }
        failures
    }
}

impl Default for DetectionCascade {
    fn default() -> Self {
        Self::new()
    }
}
