//! System load samplers feeding the adaptive baseline

use sysinfo::System;

use super::types::LoadSample;
use super::validate::BaselineError;
use crate::logic::sensors::network;

/// Source of process/connection counts
pub trait SystemSampler: Send {
    fn sample(&mut self) -> Result<LoadSample, BaselineError>;
}

/// Live sampler: process table via sysinfo, connection table via the
/// network sensor's reader
pub struct SysinfoSampler {
    system: System,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler for SysinfoSampler {
    fn sample(&mut self) -> Result<LoadSample, BaselineError> {
        self.system.refresh_processes();
        let processes = self.system.processes().len();

        let connections = network::count_connections()
            .map_err(|e| BaselineError::SampleFailed(e.to_string()))?;

        Ok(LoadSample {
            processes,
            connections,
        })
    }
}
