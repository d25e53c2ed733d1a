//! Runtime configuration
//!
//! Command line first, environment second, `constants.rs` defaults last.
//! Everything is validated before any sensor starts; a failure here is the
//! only kind of error that stops the agent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::constants::{
    get_forensic_seed, get_log_dir, BASELINE_FILE, DEFAULT_POLL_MS, DEFAULT_RISK_HIGH,
    DEFAULT_RISK_MEDIUM,
};

#[derive(Parser, Debug)]
#[command(name = "guardian", author, version, about = "Host intrusion monitoring agent", long_about = None)]
pub struct Cli {
    /// Signature rule file, or directory of .yar/.yara files
    #[arg(long, value_name = "PATH", help = "Signature rule file or directory of rule files")]
    pub rules: PathBuf,

    /// Output directory for the forensic log, reports and baseline
    #[arg(long, value_name = "DIR", help = "Output directory (env GUARDIAN_LOG_DIR, default ./logs)")]
    pub log_dir: Option<PathBuf>,

    /// Risk at or above which an alert is raised
    #[arg(long, default_value_t = DEFAULT_RISK_HIGH, help = "High risk threshold [0-100]")]
    pub risk_high: f64,

    /// Risk at or above which the detection cascade runs
    #[arg(long, default_value_t = DEFAULT_RISK_MEDIUM, help = "Medium risk threshold [0-100]")]
    pub risk_medium: f64,

    /// Baseline document path
    #[arg(long, value_name = "PATH", help = "Baseline file (default <log-dir>/adaptive_baseline.json)")]
    pub baseline: Option<PathBuf>,

    /// Forensic key seed
    #[arg(long, help = "Forensic key seed (env GUARDIAN_FORENSIC_KEY, default host name)")]
    pub forensic_key: Option<String>,

    /// Bus poll timeout; also the idle baseline sampling period
    #[arg(long, default_value_t = DEFAULT_POLL_MS, help = "Bus poll timeout in milliseconds")]
    pub poll_ms: u64,

    /// Extra directories watched by the filesystem sensor
    #[arg(long = "watch", value_name = "DIR", help = "Additional critical directory to watch (repeatable)")]
    pub watch: Vec<PathBuf>,

    /// Start from an empty baseline
    #[arg(long, help = "Reset the adaptive baseline before starting")]
    pub reset_baseline: bool,

    /// Verbose logging
    #[arg(long, help = "Enable debug logging")]
    pub debug: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidThreshold(String),
    RulesUnreadable(PathBuf, std::io::Error),
    InvalidPollInterval,
    LogDirUnavailable(PathBuf, std::io::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidThreshold(msg) => write!(f, "Invalid threshold: {}", msg),
            ConfigError::RulesUnreadable(path, e) => {
                write!(f, "Rules path {} not readable: {}", path.display(), e)
            }
            ConfigError::InvalidPollInterval => write!(f, "Poll interval must be > 0 ms"),
            ConfigError::LogDirUnavailable(path, e) => {
                write!(f, "Cannot create log dir {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct GuardianConfig {
    pub rules_path: PathBuf,
    pub log_dir: PathBuf,
    pub risk_high: f64,
    pub risk_medium: f64,
    pub baseline_path: PathBuf,
    pub forensic_seed: Option<String>,
    pub poll_interval: Duration,
    pub watch_paths: Vec<PathBuf>,
    pub reset_baseline: bool,
    pub debug: bool,
}

impl GuardianConfig {
    /// Defaults for everything but the rules path
    pub fn new(rules_path: impl Into<PathBuf>) -> Self {
        let log_dir = PathBuf::from(get_log_dir());
        Self {
            rules_path: rules_path.into(),
            baseline_path: log_dir.join(BASELINE_FILE),
            log_dir,
            risk_high: DEFAULT_RISK_HIGH,
            risk_medium: DEFAULT_RISK_MEDIUM,
            forensic_seed: get_forensic_seed(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            watch_paths: Vec::new(),
            reset_baseline: false,
            debug: false,
        }
    }

    pub fn from_cli(cli: Cli) -> Self {
        let log_dir = cli.log_dir.unwrap_or_else(|| PathBuf::from(get_log_dir()));
        let baseline_path = cli.baseline.unwrap_or_else(|| log_dir.join(BASELINE_FILE));
        let forensic_seed = cli
            .forensic_key
            .filter(|k| !k.is_empty())
            .or_else(get_forensic_seed);

        Self {
            rules_path: cli.rules,
            log_dir,
            risk_high: cli.risk_high,
            risk_medium: cli.risk_medium,
            baseline_path,
            forensic_seed,
            poll_interval: Duration::from_millis(cli.poll_ms),
            watch_paths: cli.watch,
            reset_baseline: cli.reset_baseline,
            debug: cli.debug,
        }
    }

    /// Default `env_logger` filter; `RUST_LOG` still overrides it
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    pub fn with_log_dir(mut self, log_dir: &Path) -> Self {
        self.log_dir = log_dir.to_path_buf();
        self.baseline_path = log_dir.join(BASELINE_FILE);
        self
    }

    pub fn with_thresholds(mut self, medium: f64, high: f64) -> Self {
        self.risk_medium = medium;
        self.risk_high = high;
        self
    }

    /// Check thresholds and the rules path, then create the output directory
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (label, value) in [("high", self.risk_high), ("medium", self.risk_medium)] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold(format!(
                    "{} = {} is outside [0, 100]",
                    label, value
                )));
            }
        }
        if self.risk_medium > self.risk_high {
            return Err(ConfigError::InvalidThreshold(format!(
                "medium ({}) must not exceed high ({})",
                self.risk_medium, self.risk_high
            )));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }

        let readable = if self.rules_path.is_dir() {
            std::fs::read_dir(&self.rules_path).map(|_| ())
        } else {
            std::fs::File::open(&self.rules_path).map(|_| ())
        };
        readable.map_err(|e| ConfigError::RulesUnreadable(self.rules_path.clone(), e))?;

        std::fs::create_dir_all(&self.log_dir)
            .map_err(|e| ConfigError::LogDirUnavailable(self.log_dir.clone(), e))?;

        Ok(())
    }
}
