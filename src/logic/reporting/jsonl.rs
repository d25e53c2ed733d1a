use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{EventSink, ReportError};
use crate::constants::EVENTS_JSONL_FILE;
use crate::logic::telemetry::SecurityEvent;

/// Append-only JSONL stream; line order is processing order
pub struct JsonLinesReporter {
    path: PathBuf,
}

impl JsonLinesReporter {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join(EVENTS_JSONL_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonLinesReporter {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn handle(&mut self, event: &SecurityEvent) -> Result<(), ReportError> {
        let line = event.to_jsonl()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::telemetry::{EventType, Severity};
    use tempfile::TempDir;

    #[test]
    fn test_jsonl_format() {
        let temp_dir = TempDir::new().unwrap();
        let mut reporter = JsonLinesReporter::new(temp_dir.path());

        let mut ids = Vec::new();
        for i in 0..3 {
            let event = SecurityEvent::new(EventType::Network, Severity::Medium, &format!("conn {}", i));
            ids.push(event.id().to_string());
            reporter.handle(&event).unwrap();
        }

        let content = std::fs::read_to_string(reporter.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        for (line, id) in lines.iter().zip(ids.iter()) {
            let parsed: SecurityEvent = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.id(), id);
            assert!(line.contains("\"NETWORK\""));
        }
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut reporter = JsonLinesReporter::new(&temp_dir.path().join("nope"));
        let event = SecurityEvent::new(EventType::File, Severity::Low, "x");
        assert!(reporter.handle(&event).is_err());
    }
}
