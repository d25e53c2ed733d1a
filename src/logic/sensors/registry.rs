//! Registry sensor
//!
//! Periodic snapshot of the per-user autorun keys. The first snapshot is
//! the reference; later values that were not in the previous snapshot are
//! reported as persistence.

use std::collections::BTreeMap;
use std::time::Duration;

use super::{PollingSensor, SensorError};
use crate::constants::REGISTRY_INTERVAL;
use crate::logic::telemetry::{keys, EventType, SecurityEvent, Severity};

pub const AUTORUN_KEYS: &[&str] = &[
    "Software\\Microsoft\\Windows\\CurrentVersion\\Run",
    "Software\\Microsoft\\Windows\\CurrentVersion\\RunOnce",
];

/// (key path, value name) -> value data
pub type Snapshot = BTreeMap<(String, String), String>;

/// A value present in `current` but absent from `previous`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutorunEntry {
    pub key: String,
    pub name: String,
    pub value: String,
}

pub fn diff_snapshots(previous: &Snapshot, current: &Snapshot) -> Vec<AutorunEntry> {
    current
        .iter()
        .filter(|(id, _)| !previous.contains_key(*id))
        .map(|((key, name), value)| AutorunEntry {
            key: key.clone(),
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

fn build_event(entry: AutorunEntry) -> SecurityEvent {
    SecurityEvent::new(
        EventType::Registry,
        Severity::High,
        &format!(
            "New autorun entry detected: {}\\{} -> {}",
            entry.key, entry.name, entry.value
        ),
    )
    .with_detail(keys::KEY, entry.key)
    .with_detail(keys::NAME, entry.name)
    .with_detail(keys::VALUE, entry.value)
    .with_detail(keys::IS_PERSISTENCE, true)
}

#[cfg(windows)]
fn snapshot_autorun() -> Result<Snapshot, SensorError> {
    use winreg::enums::{HKEY_CURRENT_USER, KEY_READ};
    use winreg::RegKey;

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let mut snapshot = Snapshot::new();

    for path in AUTORUN_KEYS {
        // RunOnce is often absent
        let Ok(key) = hkcu.open_subkey_with_flags(path, KEY_READ) else {
            continue;
        };
        for (name, _) in key.enum_values().flatten() {
            let Ok(value) = key.get_value::<String, _>(&name) else {
                continue;
            };
            snapshot.insert((path.to_string(), name), value);
        }
    }

    Ok(snapshot)
}

pub struct RegistrySensor {
    snapshot: Option<Snapshot>,
}

impl RegistrySensor {
    /// `None` where there is no registry to watch
    pub fn new() -> Option<Self> {
        if cfg!(windows) {
            Some(Self { snapshot: None })
        } else {
            None
        }
    }

    /// Compare against the previous snapshot and keep `current` as the new
    /// reference. The first call only primes the reference.
    pub fn evaluate(&mut self, current: Snapshot) -> Vec<SecurityEvent> {
        let events = match &self.snapshot {
            Some(previous) => diff_snapshots(previous, &current)
                .into_iter()
                .map(build_event)
                .collect(),
            None => {
                log::info!("[registry] reference snapshot: {} autorun values", current.len());
                Vec::new()
            }
        };

        self.snapshot = Some(current);
        events
    }
}

impl PollingSensor for RegistrySensor {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn interval(&self) -> Duration {
        REGISTRY_INTERVAL
    }

    #[cfg(windows)]
    fn poll(&mut self) -> Result<Vec<SecurityEvent>, SensorError> {
        let current = snapshot_autorun()?;
        Ok(self.evaluate(current))
    }

    #[cfg(not(windows))]
    fn poll(&mut self) -> Result<Vec<SecurityEvent>, SensorError> {
        Err(SensorError::SourceFailed("registry not available".to_string()))
    }
}
