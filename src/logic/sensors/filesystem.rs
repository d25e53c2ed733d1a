//! Filesystem sensor
//!
//! Recursive notify watch over critical paths. Unlike the polling sensors
//! this one is event driven: the watcher callback feeds a channel that the
//! sensor task drains.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};

use super::SensorError;
use crate::constants::{FS_DEBOUNCE, SEEN_CAPACITY};
use crate::logic::telemetry::{keys, EventPublisher, EventType, SecurityEvent, Severity};

/// Per-user autostart folder, relative to the home directory
const STARTUP_FOLDER: &str = "AppData/Roaming/Microsoft/Windows/Start Menu/Programs/Startup";

/// Default critical paths plus any configured extras, keeping only those
/// that exist
pub fn critical_paths(extra: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(STARTUP_FOLDER));
        paths.push(home);
    }
    paths.extend(extra.iter().cloned());

    paths.retain(|p| p.exists());
    paths
}

fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

pub struct FileSystemSensor {
    critical: Vec<PathBuf>,
    excluded: Vec<PathBuf>,
    last_reported: HashMap<PathBuf, Instant>,
}

impl FileSystemSensor {
    /// `excluded` paths are never reported even under a critical path
    /// (the agent's own output directory lives there)
    pub fn new(critical: Vec<PathBuf>, excluded: Vec<PathBuf>) -> Self {
        Self {
            critical: critical.iter().map(|p| normalize(p)).collect(),
            excluded: excluded.iter().map(|p| normalize(p)).collect(),
            last_reported: HashMap::new(),
        }
    }

    pub fn is_critical(&self, path: &Path) -> bool {
        self.critical.iter().any(|c| path.starts_with(c))
            && !self.excluded.iter().any(|e| path.starts_with(e))
    }

    /// Turn one modified path into an event, at most once per debounce window
    pub fn observe(&mut self, path: &Path, now: Instant) -> Option<SecurityEvent> {
        if !self.is_critical(path) {
            return None;
        }

        if let Some(last) = self.last_reported.get(path) {
            if now.duration_since(*last) < FS_DEBOUNCE {
                return None;
            }
        }

        if self.last_reported.len() >= SEEN_CAPACITY {
            self.last_reported
                .retain(|_, seen| now.duration_since(*seen) < FS_DEBOUNCE);
        }
        self.last_reported.insert(path.to_path_buf(), now);

        let shown = path.display().to_string();
        Some(
            SecurityEvent::new(
                EventType::File,
                Severity::High,
                &format!("Critical file modified: {}", shown),
            )
            .with_detail(keys::PATH, shown),
        )
    }

    fn start_watcher(
        &self,
        tx: mpsc::UnboundedSender<notify::Result<notify::Event>>,
    ) -> Result<notify::RecommendedWatcher, SensorError> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // Receiver gone means the sensor is shutting down
            let _ = tx.send(res);
        })?;

        for path in &self.critical {
            match watcher.watch(path, RecursiveMode::Recursive) {
                Ok(()) => log::info!("[filesystem] watching {}", path.display()),
                Err(e) => log::warn!("[filesystem] cannot watch {}: {}", path.display(), e),
            }
        }

        Ok(watcher)
    }

    pub async fn run(mut self, publisher: EventPublisher, mut shutdown: watch::Receiver<bool>) {
        if self.critical.is_empty() {
            log::warn!("[filesystem] no critical path exists, sensor idle");
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        // Dropping the watcher stops the OS watch, keep it for the loop's lifetime
        let _watcher = match self.start_watcher(tx) {
            Ok(watcher) => watcher,
            Err(e) => {
                log::error!("[filesystem] failed to start watcher: {}", e);
                return;
            }
        };

        log::info!("[filesystem] sensor started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                next = rx.recv() => match next {
                    Some(Ok(event)) => {
                        if !matches!(event.kind, EventKind::Modify(_)) {
                            continue;
                        }
                        let now = Instant::now();
                        for path in &event.paths {
                            if let Some(security_event) = self.observe(path, now) {
                                publisher.publish(security_event).await;
                            }
                        }
                    }
                    Some(Err(e)) => log::error!("[filesystem] watch error: {}", e),
                    None => break,
                },
            }
        }

        log::info!("[filesystem] sensor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::telemetry::EventBus;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_critical_and_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let logs = temp_dir.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();

        let sensor = FileSystemSensor::new(vec![temp_dir.path().to_path_buf()], vec![logs.clone()]);
        let root = normalize(temp_dir.path());

        assert!(sensor.is_critical(&root.join("notes.txt")));
        assert!(!sensor.is_critical(&normalize(&logs).join("events.jsonl")));
        assert!(!sensor.is_critical(Path::new("/definitely/elsewhere")));
    }

    #[test]
    fn test_observe_debounces() {
        let temp_dir = TempDir::new().unwrap();
        let mut sensor = FileSystemSensor::new(vec![temp_dir.path().to_path_buf()], vec![]);
        let target = normalize(temp_dir.path()).join("a.txt");
        let t0 = Instant::now();

        let event = sensor.observe(&target, t0).unwrap();
        assert_eq!(event.event_type(), EventType::File);
        assert_eq!(event.severity(), Severity::High);
        assert_eq!(event.detail_str(keys::PATH), Some(target.display().to_string().as_str()));

        assert!(sensor.observe(&target, t0 + Duration::from_millis(100)).is_none());
        assert!(sensor.observe(&target, t0 + FS_DEBOUNCE).is_some());
    }

    #[test]
    fn test_critical_paths_drop_missing() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        let paths = critical_paths(&[temp_dir.path().to_path_buf(), missing.clone()]);
        assert!(paths.contains(&temp_dir.path().to_path_buf()));
        assert!(!paths.contains(&missing));
    }

    #[tokio::test]
    async fn test_idle_without_paths_returns() {
        let bus = EventBus::unbounded();
        let (_tx, rx) = watch::channel(false);
        let sensor = FileSystemSensor::new(vec![], vec![]);
        tokio::time::timeout(Duration::from_secs(1), sensor.run(bus.publisher("filesystem"), rx))
            .await
            .unwrap();
    }
}
