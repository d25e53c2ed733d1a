//! Sensors Module - Independent event producers
//!
//! Each sensor runs in its own task at its own cadence and owns a private
//! dedup memory. Sensors only talk to the rest of the agent through their
//! `EventPublisher`.
//!
//! # Architecture
//! - `process.rs`: new processes scored by the heuristic engine
//! - `network.rs`: connection table reader and suspicious-peer policy
//! - `filesystem.rs`: notify-based watcher over critical paths
//! - `registry.rs`: autorun key snapshots (Windows only)
//! - `threat_intel.rs`: IP reputation lookup
//!
//! # Failure Strategy
//! Source errors are logged and the sensor retries on its next tick.
//! Every loop exits within one interval of the stop signal.

pub mod process;
pub mod network;
pub mod filesystem;
pub mod registry;
pub mod threat_intel;

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::constants::SEEN_CAPACITY;
use crate::logic::config::GuardianConfig;
use crate::logic::telemetry::{EventBus, EventPublisher, SecurityEvent};

pub use filesystem::FileSystemSensor;
pub use network::{collect_connections, Connection, NetworkSensor};
pub use process::ProcessSensor;
pub use registry::RegistrySensor;
pub use threat_intel::ThreatIntelClient;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum SensorError {
    IoError(std::io::Error),
    WatchError(notify::Error),
    SourceFailed(String),
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::IoError(e) => write!(f, "IO Error: {}", e),
            SensorError::WatchError(e) => write!(f, "Watch Error: {}", e),
            SensorError::SourceFailed(msg) => write!(f, "Source failed: {}", msg),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        SensorError::IoError(err)
    }
}

impl From<notify::Error> for SensorError {
    fn from(err: notify::Error) -> Self {
        SensorError::WatchError(err)
    }
}

// ============================================================================
// DEDUP MEMORY
// ============================================================================

/// Set of already-reported identities with FIFO eviction.
///
/// Once full, inserting a new key forgets the oldest one, so a condition
/// that was evicted may be reported again.
#[derive(Debug)]
pub struct SeenSet<K> {
    items: HashSet<K>,
    order: VecDeque<K>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone> SeenSet<K> {
    pub fn new() -> Self {
        Self::with_capacity(SEEN_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns true if the key was not remembered yet
    pub fn insert(&mut self, key: K) -> bool {
        if self.items.contains(&key) {
            return false;
        }

        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.items.remove(&oldest);
            }
        }

        self.order.push_back(key.clone());
        self.items.insert(key);
        true
    }

    pub fn contains(&self, key: &K) -> bool {
        self.items.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for SeenSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// POLLING DRIVER
// ============================================================================

/// A sensor that samples its source on a fixed cadence
pub trait PollingSensor: Send + 'static {
    fn name(&self) -> &'static str;
    fn interval(&self) -> Duration;
    /// One sampling pass; returns newly observed conditions only
    fn poll(&mut self) -> Result<Vec<SecurityEvent>, SensorError>;
}

/// Drive a polling sensor until the stop signal fires.
///
/// `poll` may block on the OS (process table, netstat), so it runs on the
/// blocking pool.
pub async fn run_polling<S: PollingSensor>(
    mut sensor: S,
    publisher: EventPublisher,
    mut shutdown: watch::Receiver<bool>,
) {
    let name = sensor.name();
    let interval = sensor.interval();
    log::info!("[{}] sensor started (interval {:?})", name, interval);

    loop {
        if *shutdown.borrow() {
            break;
        }

        let outcome = tokio::task::spawn_blocking(move || {
            let result = sensor.poll();
            (sensor, result)
        })
        .await;

        sensor = match outcome {
            Ok((sensor, Ok(events))) => {
                for event in events {
                    publisher.publish(event).await;
                }
                sensor
            }
            Ok((sensor, Err(e))) => {
                log::error!("[{}] sensor error: {}", name, e);
                sensor
            }
            Err(e) => {
                log::error!("[{}] sensor task failed, stopping: {}", name, e);
                return;
            }
        };

        tokio::select! {
            _ = shutdown.changed() => {}
            _ = tokio::time::sleep(interval) => {}
        }
    }

    log::info!("[{}] sensor stopped", name);
}

/// Running sensor task
pub struct SensorHandle {
    pub name: &'static str,
    pub handle: JoinHandle<()>,
}

/// Start every sensor available on this platform
pub fn spawn_all(
    config: &GuardianConfig,
    bus: &EventBus,
    shutdown: &watch::Receiver<bool>,
) -> Vec<SensorHandle> {
    let mut handles = Vec::new();

    let process = ProcessSensor::new();
    handles.push(SensorHandle {
        name: process.name(),
        handle: tokio::spawn(run_polling(
            process,
            bus.publisher("process"),
            shutdown.clone(),
        )),
    });

    let network = NetworkSensor::new(ThreatIntelClient::new());
    handles.push(SensorHandle {
        name: network.name(),
        handle: tokio::spawn(run_polling(
            network,
            bus.publisher("network"),
            shutdown.clone(),
        )),
    });

    let filesystem = FileSystemSensor::new(
        filesystem::critical_paths(&config.watch_paths),
        vec![config.log_dir.clone()],
    );
    handles.push(SensorHandle {
        name: "filesystem",
        handle: tokio::spawn(filesystem.run(bus.publisher("filesystem"), shutdown.clone())),
    });

    match RegistrySensor::new() {
        Some(registry) => handles.push(SensorHandle {
            name: registry.name(),
            handle: tokio::spawn(run_polling(
                registry,
                bus.publisher("registry"),
                shutdown.clone(),
            )),
        }),
        None => log::warn!("[registry] sensor disabled: autorun registry not available on this platform"),
    }

    handles
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::telemetry::{EventType, Received, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_seen_set_dedup() {
        let mut seen = SeenSet::with_capacity(4);
        assert!(seen.insert(1));
        assert!(!seen.insert(1));
        assert!(seen.insert(2));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_seen_set_evicts_oldest() {
        let mut seen = SeenSet::with_capacity(3);
        for k in 0..3 {
            seen.insert(k);
        }
        assert!(seen.insert(3));
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&0));
        assert!(seen.contains(&1));
        // Evicted key counts as new again
        assert!(seen.insert(0));
        assert!(!seen.contains(&1));
    }

    struct CountingSensor {
        polls: Arc<AtomicUsize>,
        fail_first: bool,
    }

    impl PollingSensor for CountingSensor {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn interval(&self) -> Duration {
            Duration::from_millis(10)
        }

        fn poll(&mut self) -> Result<Vec<SecurityEvent>, SensorError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(SensorError::SourceFailed("transient".to_string()));
            }
            Ok(vec![SecurityEvent::new(EventType::Generic, Severity::Low, "tick")])
        }
    }

    #[tokio::test]
    async fn test_polling_retries_and_stops_on_signal() {
        let mut bus = EventBus::unbounded();
        let (tx, rx) = watch::channel(false);
        let polls = Arc::new(AtomicUsize::new(0));

        let sensor = CountingSensor {
            polls: Arc::clone(&polls),
            fail_first: true,
        };
        let handle = tokio::spawn(run_polling(sensor, bus.publisher("counting"), rx));

        // First poll fails; a later one still delivers
        match bus.receive(Duration::from_secs(2)).await {
            Received::Event(event) => assert_eq!(event.source(), "counting"),
            Received::Empty => panic!("sensor did not recover after an error"),
        }

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sensor did not stop within one interval")
            .unwrap();
        assert!(polls.load(Ordering::SeqCst) >= 2);
    }
}
