use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{EventSink, ReportError};
use crate::constants::{APP_NAME, DASHBOARD_FILE};
use crate::logic::telemetry::SecurityEvent;

/// Human-readable dashboard. The header is written once; rows are only
/// ever appended, so the table is left open-ended on purpose.
pub struct HtmlReporter {
    path: PathBuf,
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn header() -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{app} Dashboard</title>
<style>
body {{ font-family: sans-serif; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ccc; padding: 4px; font-size: 12px; }}
th {{ background: #eee; }}
</style>
</head>
<body>
<h1>{app} Security Events</h1>
<table>
<thead>
<tr><th>Time</th><th>Type</th><th>Severity</th><th>Risk</th><th>Message</th></tr>
</thead>
<tbody>
"#,
        app = APP_NAME
    )
}

impl HtmlReporter {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join(DASHBOARD_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn row(event: &SecurityEvent) -> String {
        format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.1}</td><td>{}</td></tr>\n",
            event.timestamp().format("%Y-%m-%d %H:%M:%S UTC"),
            event.event_type().as_str(),
            event.severity().as_str(),
            event.risk_score(),
            escape_html(event.message())
        )
    }
}

impl EventSink for HtmlReporter {
    fn name(&self) -> &str {
        "html"
    }

    fn handle(&mut self, event: &SecurityEvent) -> Result<(), ReportError> {
        if !self.path.exists() {
            fs::write(&self.path, header())?;
        }

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(Self::row(event).as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::telemetry::{EventType, Severity};
    use tempfile::TempDir;

    #[test]
    fn test_header_once_rows_appended() {
        let temp_dir = TempDir::new().unwrap();
        let mut reporter = HtmlReporter::new(temp_dir.path());

        let mut event = SecurityEvent::new(EventType::Registry, Severity::High, "first");
        event.set_risk_score(96.0);
        reporter.handle(&event).unwrap();
        reporter.handle(&SecurityEvent::new(EventType::File, Severity::Low, "second")).unwrap();

        let content = std::fs::read_to_string(reporter.path()).unwrap();
        assert_eq!(content.matches("<!DOCTYPE html>").count(), 1);
        assert_eq!(content.matches("<tr><td>").count(), 2);
        assert!(content.contains("<td>REGISTRY</td><td>HIGH</td><td>96.0</td>"));
        assert!(content.find("first").unwrap() < content.find("second").unwrap());
    }

    #[test]
    fn test_message_is_escaped() {
        let temp_dir = TempDir::new().unwrap();
        let mut reporter = HtmlReporter::new(temp_dir.path());
        let event = SecurityEvent::new(EventType::File, Severity::Low, "<script>alert(1)</script>");
        reporter.handle(&event).unwrap();

        let content = std::fs::read_to_string(reporter.path()).unwrap();
        assert!(!content.contains("<script>"));
        assert!(content.contains("&lt;script&gt;"));
    }
}
