//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Command line flags win over environment variables, which win over these.

use std::time::Duration;

/// Default output directory for the forensic log and reports
pub const DEFAULT_LOG_DIR: &str = "./logs";

/// Default HIGH risk threshold (console alerts)
pub const DEFAULT_RISK_HIGH: f64 = 80.0;

/// Default MEDIUM risk threshold (detection cascade gate)
pub const DEFAULT_RISK_MEDIUM: f64 = 40.0;

/// Default bus poll timeout (milliseconds)
pub const DEFAULT_POLL_MS: u64 = 1000;

/// Baseline file name inside the log directory
pub const BASELINE_FILE: &str = "adaptive_baseline.json";

/// Forensic log file name inside the log directory
pub const FORENSIC_LOG_FILE: &str = "forensic.log.enc";

/// JSONL report file name
pub const EVENTS_JSONL_FILE: &str = "events.jsonl";

/// HTML dashboard file name
pub const DASHBOARD_FILE: &str = "dashboard.html";

/// Environment variable holding the forensic key seed
pub const FORENSIC_KEY_ENV: &str = "GUARDIAN_FORENSIC_KEY";

/// Process sensor poll interval
pub const PROCESS_INTERVAL: Duration = Duration::from_secs(5);

/// Network sensor poll interval
pub const NETWORK_INTERVAL: Duration = Duration::from_secs(5);

/// Registry sensor poll interval
pub const REGISTRY_INTERVAL: Duration = Duration::from_secs(30);

/// Repeated modifications of one path inside this window are reported once
pub const FS_DEBOUNCE: Duration = Duration::from_secs(2);

/// External commands (netstat) are killed after this long
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum entries a sensor remembers before evicting the oldest
pub const SEEN_CAPACITY: usize = 8192;

/// Period of the running-stats log line
pub const STATS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// How long the orchestrator waits for sensors after the stop signal
pub const SENSOR_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Guardian";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get the forensic key seed from the environment, if set
pub fn get_forensic_seed() -> Option<String> {
    std::env::var(FORENSIC_KEY_ENV)
        .ok()
        .filter(|s| !s.is_empty())
}

/// Get the log directory from environment or use default
pub fn get_log_dir() -> String {
    std::env::var("GUARDIAN_LOG_DIR")
        .unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string())
}

/// Get the host name used as the insecure fallback seed
pub fn get_host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "UNKNOWN_HOST".to_string())
}
