//! Security Event Types
//!
//! The unit of observation flowing from sensors through the pipeline.
//! Everything except the risk annotation and the additive `details` map is
//! fixed at creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ============================================================================
// EVENT TYPES
// ============================================================================

/// OS facet an event was observed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Process,
    Network,
    File,
    Registry,
    Generic,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Process => "PROCESS",
            EventType::Network => "NETWORK",
            EventType::File => "FILE",
            EventType::Registry => "REGISTRY",
            EventType::Generic => "GENERIC",
        }
    }
}

/// Sensor's initial assessment, before risk scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

// ============================================================================
// WELL-KNOWN DETAIL KEYS
// ============================================================================

pub mod keys {
    pub const PID: &str = "pid";
    pub const NAME: &str = "name";
    pub const PATH: &str = "path";
    pub const EXE: &str = "exe";
    pub const CMDLINE: &str = "cmdline";
    pub const PPID: &str = "ppid";
    pub const LADDR: &str = "laddr";
    pub const RADDR: &str = "raddr";
    pub const STATUS: &str = "status";
    pub const IS_REMOTE: &str = "is_remote";
    pub const IS_PERSISTENCE: &str = "is_persistence";
    pub const IS_ENCRYPTED: &str = "is_encrypted";
    pub const IS_INJECTED: &str = "is_injected";
    pub const YARA_MATCHES: &str = "yara_matches";
    pub const RANSOMWARE_INDICATOR: &str = "ransomware_indicator";
    pub const BEHAVIOR_NOTE: &str = "behavior_note";
    pub const TI_MALICIOUS_IP: &str = "ti_malicious_ip";
    pub const KEY: &str = "key";
    pub const VALUE: &str = "value";
}

// ============================================================================
// SECURITY EVENT (Main struct)
// ============================================================================

/// A single observation
///
/// Created by exactly one sensor and moved by value through the bus, so the
/// consumer is its only owner while it is scored, recorded and reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Unique event ID
    id: String,
    /// Producing sensor
    #[serde(default)]
    source: String,
    event_type: EventType,
    severity: Severity,
    message: String,
    /// Sensor payload; keys are only ever added
    #[serde(default)]
    details: Map<String, Value>,
    /// Capture time (UTC)
    timestamp: DateTime<Utc>,
    #[serde(default)]
    risk_score: f64,
    #[serde(skip)]
    scored: bool,
}

impl SecurityEvent {
    /// Create a new event; an empty message is replaced with a generic one
    pub fn new(event_type: EventType, severity: Severity, message: &str) -> Self {
        let message = match message.trim() {
            "" => format!("{} event", event_type.as_str()),
            _ => message.to_string(),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            source: String::new(),
            event_type,
            severity,
            message,
            details: Map::new(),
            timestamp: Utc::now(),
            risk_score: 0.0,
            scored: false,
        }
    }

    // Builder pattern methods
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert_detail(key, value);
        self
    }

    pub(crate) fn with_source(mut self, source: &str) -> Self {
        if self.source.is_empty() {
            self.source = source.to_string();
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    /// String value of a detail, if present and a string
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }

    pub fn is_scored(&self) -> bool {
        self.scored
    }

    /// Add a detail key. Existing keys are updated, never removed.
    pub fn insert_detail(&mut self, key: &str, value: impl Into<Value>) {
        self.details.insert(key.to_string(), value.into());
    }

    /// Assign the risk score. Only the first assignment takes effect.
    pub fn set_risk_score(&mut self, score: f64) -> bool {
        if self.scored {
            log::warn!(
                "Event {} already scored ({:.1}), ignoring re-score to {:.1}",
                self.id, self.risk_score, score
            );
            return false;
        }
        self.risk_score = score;
        self.scored = true;
        true
    }

    /// Raise severity after a detector finding. Never lowers it.
    pub fn escalate_severity(&mut self, severity: Severity) {
        if severity > self.severity {
            self.severity = severity;
        }
    }

    /// Compact single-line JSON, enums by name
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// TESTS
// ============================================================================
