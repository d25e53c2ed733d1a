use super::{DetectionError, Detector};
use crate::logic::telemetry::{keys, EventType, SecurityEvent};

/// Extensions left behind by common encryptors
pub const SUSPICIOUS_EXTENSIONS: &[&str] = &[".locked", ".crypt", ".crypted", ".enc"];

#[derive(Debug, Default)]
pub struct RansomwareDetector;

impl RansomwareDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn is_suspicious_path(path: &str) -> bool {
        let lower = path.to_lowercase();
        SUSPICIOUS_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
    }
}

impl Detector for RansomwareDetector {
    fn name(&self) -> &str {
        "ransomware"
    }

    fn inspect(&mut self, event: &mut SecurityEvent) -> Result<(), DetectionError> {
        if event.event_type() != EventType::File {
            return Ok(());
        }

        let Some(path) = event.detail_str(keys::PATH) else {
            return Ok(());
        };

        if Self::is_suspicious_path(path) {
            log::warn!("[ransomware] encrypted-file indicator on {}", path);
            event.insert_detail(keys::RANSOMWARE_INDICATOR, true);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::telemetry::Severity;

    fn file_event(path: &str) -> SecurityEvent {
        SecurityEvent::new(EventType::File, Severity::High, "changed").with_detail(keys::PATH, path)
    }

    #[test]
    fn test_extensions() {
        assert!(RansomwareDetector::is_suspicious_path("C:\\Users\\a\\tax.PDF.CRYPT"));
        assert!(RansomwareDetector::is_suspicious_path("/home/a/db.enc"));
        assert!(!RansomwareDetector::is_suspicious_path("/home/a/encrypted_notes.txt"));
    }

    #[test]
    fn test_only_file_events() {
        let mut detector = RansomwareDetector::new();

        let mut file = file_event("/home/a/photo.jpg.locked");
        detector.inspect(&mut file).unwrap();
        assert_eq!(file.detail(keys::RANSOMWARE_INDICATOR), Some(&serde_json::Value::Bool(true)));

        let mut process = SecurityEvent::new(EventType::Process, Severity::High, "p")
            .with_detail(keys::PATH, "/tmp/x.locked");
        detector.inspect(&mut process).unwrap();
        assert!(process.detail(keys::RANSOMWARE_INDICATOR).is_none());

        let mut clean = file_event("/home/a/photo.jpg");
        detector.inspect(&mut clean).unwrap();
        assert!(clean.detail(keys::RANSOMWARE_INDICATOR).is_none());
    }
}
