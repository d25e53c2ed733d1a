use super::{DetectionError, Detector};
use crate::logic::telemetry::{keys, SecurityEvent};

/// Per-event behavior note. Multi-event correlation is out of scope; this
/// stage only records what reached it.
#[derive(Debug, Default)]
pub struct BehaviorAnalyzer {
    analyzed: u64,
}

impl BehaviorAnalyzer {
    pub fn new() -> Self {
        Self { analyzed: 0 }
    }

    pub fn analyzed(&self) -> u64 {
        self.analyzed
    }
}

impl Detector for BehaviorAnalyzer {
    fn name(&self) -> &str {
        "behavior"
    }

    fn inspect(&mut self, event: &mut SecurityEvent) -> Result<(), DetectionError> {
        self.analyzed += 1;
        log::debug!("Behavior analysis for event: {}", event.message());

        let note = format!(
            "{} {} reached cascade at risk {:.1}",
            event.event_type().as_str(),
            event.severity().as_str(),
            event.risk_score()
        );
        event.insert_detail(keys::BEHAVIOR_NOTE, note);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::telemetry::{EventType, Severity};

    #[test]
    fn test_note_added() {
        let mut analyzer = BehaviorAnalyzer::new();
        let mut event = SecurityEvent::new(EventType::Network, Severity::Medium, "conn");
        event.set_risk_score(53.0);

        analyzer.inspect(&mut event).unwrap();
        assert_eq!(analyzer.analyzed(), 1);
        assert_eq!(
            event.detail_str(keys::BEHAVIOR_NOTE),
            Some("NETWORK MEDIUM reached cascade at risk 53.0")
        );
    }
}
