//! Risk Engine
//!
//! Pure mapping from an event to a score in [0, 100]:
//! `BASE[severity] * MULTIPLIER[event_type] + 5 * suspicious_flags`.

use serde::Serialize;
use serde_json::Value;

use crate::logic::telemetry::{keys, EventType, SecurityEvent, Severity};

// ============================================================================
// WEIGHTS
// ============================================================================

/// Points added per truthy suspicious flag
pub const FLAG_WEIGHT: f64 = 5.0;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Detail keys that raise the score when truthy
pub const SUSPICIOUS_FLAGS: [&str; 4] = [
    keys::IS_REMOTE,
    keys::IS_PERSISTENCE,
    keys::IS_ENCRYPTED,
    keys::IS_INJECTED,
];

pub fn base_score(severity: Severity) -> f64 {
    match severity {
        Severity::Low => 10.0,
        Severity::Medium => 40.0,
        Severity::High => 70.0,
        Severity::Critical => 90.0,
    }
}

pub fn type_multiplier(event_type: EventType) -> f64 {
    match event_type {
        EventType::Process => 1.1,
        EventType::Network => 1.2,
        EventType::File => 1.0,
        EventType::Registry => 1.3,
        EventType::Generic => 1.0,
    }
}

// ============================================================================
// SCORING
// ============================================================================

/// Only `true` and non-zero numbers count; anything else reads as false.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Count truthy suspicious flags in an event's details
pub fn count_flags(event: &SecurityEvent) -> usize {
    SUSPICIOUS_FLAGS
        .iter()
        .filter(|key| is_truthy(event.detail(key)))
        .count()
}

/// Score an event. Total and side-effect free.
pub fn calculate_risk(event: &SecurityEvent) -> f64 {
    let base = base_score(event.severity());
    let mult = type_multiplier(event.event_type());
    let score = base * mult + FLAG_WEIGHT * count_flags(event) as f64;
    score.clamp(MIN_SCORE, MAX_SCORE)
}

// ============================================================================
// RISK LEVEL
// ============================================================================

/// Score bucket against the configured thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn classify(score: f64, medium: f64, high: f64) -> Self {
        if score >= high {
            RiskLevel::High
        } else if score >= medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Detection cascade gate
pub fn should_cascade(risk_score: f64, medium_threshold: f64) -> bool {
    risk_score >= medium_threshold
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_SEVERITIES: [Severity; 4] =
        [Severity::Low, Severity::Medium, Severity::High, Severity::Critical];
    const ALL_TYPES: [EventType; 5] = [
        EventType::Process,
        EventType::Network,
        EventType::File,
        EventType::Registry,
        EventType::Generic,
    ];

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {}, got {}", expected, actual);
    }

    #[test]
    fn test_registry_persistence_scenario() {
        let event = SecurityEvent::new(EventType::Registry, Severity::High, "autorun")
            .with_detail(keys::IS_PERSISTENCE, true);
        assert_close(calculate_risk(&event), 96.0);
    }

    #[test]
    fn test_low_file_scenario() {
        let event = SecurityEvent::new(EventType::File, Severity::Low, "modified");
        assert_close(calculate_risk(&event), 10.0);
    }

    #[test]
    fn test_clamped_to_max() {
        let mut event = SecurityEvent::new(EventType::Registry, Severity::Critical, "all flags");
        for flag in SUSPICIOUS_FLAGS {
            event.insert_detail(flag, true);
        }
        // 90 * 1.3 + 20 = 137
        assert_eq!(calculate_risk(&event), MAX_SCORE);
    }

    #[test]
    fn test_determinism_ignores_timestamp() {
        for severity in ALL_SEVERITIES {
            for event_type in ALL_TYPES {
                let a = SecurityEvent::new(event_type, severity, "a")
                    .with_detail(keys::IS_REMOTE, true);
                std::thread::sleep(std::time::Duration::from_millis(1));
                let b = SecurityEvent::new(event_type, severity, "a")
                    .with_detail(keys::IS_REMOTE, true);
                assert_ne!(a.timestamp(), b.timestamp());
                assert_eq!(calculate_risk(&a), calculate_risk(&b));
            }
        }
    }

    #[test]
    fn test_bounds_and_monotonicity() {
        for severity in ALL_SEVERITIES {
            for event_type in ALL_TYPES {
                let mut event = SecurityEvent::new(event_type, severity, "m");
                let mut previous = calculate_risk(&event);
                assert!((MIN_SCORE..=MAX_SCORE).contains(&previous));

                for flag in SUSPICIOUS_FLAGS {
                    event.insert_detail(flag, true);
                    let next = calculate_risk(&event);
                    assert!((MIN_SCORE..=MAX_SCORE).contains(&next));
                    assert!(next >= previous, "{} decreased score", flag);
                    previous = next;
                }
            }
        }
    }

    #[test]
    fn test_malformed_and_unknown_flags_ignored() {
        let event = SecurityEvent::new(EventType::Network, Severity::Medium, "odd")
            .with_detail(keys::IS_REMOTE, "yes")
            .with_detail(keys::IS_INJECTED, Value::Null)
            .with_detail(keys::IS_ENCRYPTED, vec![1, 2])
            .with_detail("is_suspicious", true);
        assert_close(calculate_risk(&event), 48.0);
    }

    #[test]
    fn test_numeric_flags() {
        let event = SecurityEvent::new(EventType::File, Severity::Low, "n")
            .with_detail(keys::IS_REMOTE, 1)
            .with_detail(keys::IS_PERSISTENCE, 0);
        assert_close(calculate_risk(&event), 15.0);
    }

    #[test]
    fn test_cascade_gate_boundary() {
        assert!(!should_cascade(39.9, 40.0));
        assert!(should_cascade(40.0, 40.0));
    }

    #[test]
    fn test_risk_level() {
        assert_eq!(RiskLevel::classify(10.0, 40.0, 80.0), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(40.0, 40.0, 80.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(96.0, 40.0, 80.0), RiskLevel::High);
    }
}
