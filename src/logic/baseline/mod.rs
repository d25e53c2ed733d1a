//! Baseline Module - Adaptive load baseline
//!
//! Learns the rough "normal" process and connection counts of the host.
//! Only sampled while the analysis loop is idle.
//!
//! # Architecture
//! - `types.rs`: `Baseline`, `LoadSample`
//! - `validate.rs`: `BaselineError` and sanity checks
//! - `storage.rs`: Persistent storage with validation
//! - `sampler.rs`: `SystemSampler` trait and the sysinfo-backed sampler
//!
//! # Failure Strategy
//! Missing or corrupt file on load -> start from zeros. Sample or save
//! failures are returned to the caller, which logs and carries on.

pub mod types;
pub mod validate;
pub mod storage;
pub mod sampler;

use std::path::{Path, PathBuf};

pub use sampler::{SysinfoSampler, SystemSampler};
pub use types::{Baseline, LoadSample};
pub use validate::BaselineError;

pub struct AdaptiveBaseline {
    path: PathBuf,
    baseline: Baseline,
    sampler: Box<dyn SystemSampler>,
}

impl AdaptiveBaseline {
    /// Load once at startup; absent or corrupt file yields zeros
    pub fn load(path: &Path, sampler: Box<dyn SystemSampler>) -> Self {
        Self {
            path: path.to_path_buf(),
            baseline: storage::load_or_default(path),
            sampler,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> Baseline {
        self.baseline
    }

    /// Take one sample, fold it in and persist.
    ///
    /// A failed sample leaves the baseline untouched. A failed save keeps
    /// the in-memory update and reports the error.
    pub fn update(&mut self) -> Result<Baseline, BaselineError> {
        let sample = self.sampler.sample()?;
        self.baseline.observe(sample.processes, sample.connections);

        log::debug!(
            "Baseline sample #{}: processes={} connections={}",
            self.baseline.samples, sample.processes, sample.connections
        );

        storage::save_baseline(&self.baseline, &self.path)?;
        Ok(self.baseline)
    }

    /// Reset baseline to empty state and persist it
    pub fn reset(&mut self) -> Result<(), BaselineError> {
        self.baseline.reset_stats();
        storage::save_baseline(&self.baseline, &self.path)?;
        log::info!("Baseline has been reset");
        Ok(())
    }
}
