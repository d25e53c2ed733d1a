//! Forensic Collector
//!
//! Append-only, obfuscated record of every event that reaches the pipeline.
//! The file is reopened in append mode for every record so rotation and
//! inspection tools always see a consistent, growing file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::cipher::ObfuscationKey;
use super::ForensicError;
use crate::constants::FORENSIC_LOG_FILE;
use crate::logic::telemetry::SecurityEvent;

/// Record separator
pub const RECORD_SEPARATOR: u8 = b'\n';

pub struct ForensicCollector {
    path: PathBuf,
    key: ObfuscationKey,
    records_written: u64,
    write_failures: u64,
}

impl ForensicCollector {
    /// Collector writing `<log_dir>/forensic.log.enc`
    pub fn new(log_dir: &Path, key: ObfuscationKey) -> Self {
        Self::with_path(log_dir.join(FORENSIC_LOG_FILE), key)
    }

    pub fn with_path(path: PathBuf, key: ObfuscationKey) -> Self {
        log::info!(
            "Forensic log: {:?} (key {}, obfuscation only)",
            path,
            key.fingerprint()
        );
        Self {
            path,
            key,
            records_written: 0,
            write_failures: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &ObfuscationKey {
        &self.key
    }

    /// Append one event. Failures are logged and counted, never returned.
    pub fn record(&mut self, event: &SecurityEvent) -> bool {
        match self.try_record(event) {
            Ok(()) => {
                self.records_written += 1;
                true
            }
            Err(e) => {
                self.write_failures += 1;
                log::error!("Failed to record forensic event {}: {}", event.id(), e);
                false
            }
        }
    }

    fn try_record(&self, event: &SecurityEvent) -> Result<(), ForensicError> {
        let raw = serde_json::to_vec(event)?;
        let mut record = self.key.apply(&raw);
        record.push(RECORD_SEPARATOR);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&record)?;
        file.flush()?;
        Ok(())
    }

    pub fn stats(&self) -> CollectorStats {
        CollectorStats {
            records_written: self.records_written,
            write_failures: self.write_failures,
            path: self.path.to_string_lossy().to_string(),
        }
    }
}

/// Statistics about the forensic log
#[derive(Debug, Clone, Serialize)]
pub struct CollectorStats {
    pub records_written: u64,
    pub write_failures: u64,
    pub path: String,
}
