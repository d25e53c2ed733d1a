use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// BASELINE
// ============================================================================

/// Running averages of "normal" system load
///
/// Persisted as exactly three numeric fields. `samples` also accepts a
/// float on load (older files stored it as one).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub avg_processes: f64,
    pub avg_connections: f64,
    #[serde(deserialize_with = "deserialize_count")]
    pub samples: u64,
}

impl Baseline {
    /// Fold one observation into the running means
    pub fn observe(&mut self, processes: usize, connections: usize) {
        let n = self.samples as f64;
        let next = n + 1.0;
        self.avg_processes = (self.avg_processes * n + processes as f64) / next;
        self.avg_connections = (self.avg_connections * n + connections as f64) / next;
        self.samples += 1;
    }

    /// Reset stats to a fresh zero baseline
    pub fn reset_stats(&mut self) {
        *self = Self::default();
    }
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(serde::de::Error::custom(format!(
            "samples must be a non-negative whole number, got {}",
            value
        )));
    }
    Ok(value as u64)
}

/// One reading taken by a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSample {
    pub processes: usize,
    pub connections: usize,
}
