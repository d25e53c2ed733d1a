use super::{EventSink, ReportError};
use crate::logic::risk::RiskLevel;
use crate::logic::telemetry::SecurityEvent;

/// Emits a warning line for events at or above the high threshold
pub struct ConsoleAlertReporter {
    medium_threshold: f64,
    high_threshold: f64,
    alerts_raised: u64,
}

impl ConsoleAlertReporter {
    pub fn new(medium_threshold: f64, high_threshold: f64) -> Self {
        Self {
            medium_threshold,
            high_threshold,
            alerts_raised: 0,
        }
    }

    pub fn alerts_raised(&self) -> u64 {
        self.alerts_raised
    }
}

impl EventSink for ConsoleAlertReporter {
    fn name(&self) -> &str {
        "console"
    }

    fn handle(&mut self, event: &SecurityEvent) -> Result<(), ReportError> {
        match RiskLevel::classify(event.risk_score(), self.medium_threshold, self.high_threshold) {
            RiskLevel::High => {
                self.alerts_raised += 1;
                log::warn!(
                    "[ALERT] {} {} risk={:.1} msg={}",
                    event.event_type().as_str(),
                    event.severity().as_str(),
                    event.risk_score(),
                    event.message()
                );
            }
            RiskLevel::Medium => log::info!(
                "[{}] {} risk={:.1}",
                event.event_type().as_str(),
                event.message(),
                event.risk_score()
            ),
            RiskLevel::Low => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::telemetry::{EventType, Severity};

    #[test]
    fn test_alerts_only_at_high() {
        let mut reporter = ConsoleAlertReporter::new(40.0, 80.0);

        let mut low = SecurityEvent::new(EventType::File, Severity::Low, "low");
        low.set_risk_score(10.0);
        let mut high = SecurityEvent::new(EventType::Registry, Severity::High, "high");
        high.set_risk_score(80.0);

        reporter.handle(&low).unwrap();
        reporter.handle(&high).unwrap();
        assert_eq!(reporter.alerts_raised(), 1);
    }
}
