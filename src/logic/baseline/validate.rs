use super::types::Baseline;

#[derive(Debug)]
pub enum BaselineError {
    IoError(std::io::Error),
    SerializationError(serde_json::Error),
    Invalid(String),
    SampleFailed(String),
}

impl std::fmt::Display for BaselineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaselineError::IoError(e) => write!(f, "IO Error: {}", e),
            BaselineError::SerializationError(e) => write!(f, "Serialization Error: {}", e),
            BaselineError::Invalid(msg) => write!(f, "Invalid baseline: {}", msg),
            BaselineError::SampleFailed(msg) => write!(f, "System sample failed: {}", msg),
        }
    }
}

impl std::error::Error for BaselineError {}

impl From<std::io::Error> for BaselineError {
    fn from(err: std::io::Error) -> Self {
        BaselineError::IoError(err)
    }
}

impl From<serde_json::Error> for BaselineError {
    fn from(err: serde_json::Error) -> Self {
        BaselineError::SerializationError(err)
    }
}

/// Reject averages that cannot come from real samples
pub fn validate_baseline(baseline: &Baseline) -> Result<(), BaselineError> {
    for (field, value) in [
        ("avg_processes", baseline.avg_processes),
        ("avg_connections", baseline.avg_connections),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(BaselineError::Invalid(format!("{} = {}", field, value)));
        }
    }
    Ok(())
}
