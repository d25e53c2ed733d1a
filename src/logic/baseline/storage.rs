use std::fs;
use std::path::Path;

use super::types::Baseline;
use super::validate::{validate_baseline, BaselineError};

/// Save baseline to disk
pub fn save_baseline(baseline: &Baseline, path: &Path) -> Result<(), BaselineError> {
    // Ensure directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(baseline)?;
    fs::write(path, json)?;
    Ok(())
}

/// Load baseline from disk with validation
pub fn load_baseline(path: &Path) -> Result<Baseline, BaselineError> {
    let data = fs::read(path)?;
    let baseline: Baseline = serde_json::from_slice(&data)?;

    validate_baseline(&baseline)?;

    Ok(baseline)
}

/// Load, or start from zeros when the file is absent or unusable
pub fn load_or_default(path: &Path) -> Baseline {
    if !path.exists() {
        log::info!("No baseline at {:?}, starting fresh", path);
        return Baseline::default();
    }

    match load_baseline(path) {
        Ok(b) => {
            log::info!(
                "Loaded baseline (samples: {}, avg_processes: {:.1}, avg_connections: {:.1})",
                b.samples, b.avg_processes, b.avg_connections
            );
            b
        }
        Err(e) => {
            log::error!("Baseline {:?} unreadable: {}. Starting fresh.", path, e);
            Baseline::default()
        }
    }
}
