//! Process heuristics
//!
//! Cheap name/command-line scoring used by the process sensor to decide
//! which new processes are worth an event.

use serde::{Deserialize, Serialize};

/// Tool names that are suspicious on sight
pub const SUSPICIOUS_NAMES: &[&str] = &["mimikatz.exe", "psexec.exe", "nc.exe", "powershell.exe"];

/// Office hosts that should never spawn a shell
const OFFICE_PARENTS: &[&str] = &["winword.exe", "excel.exe"];

const NAME_WEIGHT: f64 = 50.0;
const POWERSHELL_PAYLOAD_WEIGHT: f64 = 40.0;
const NO_IMAGE_WEIGHT: f64 = 20.0;
const OFFICE_PARENT_WEIGHT: f64 = 40.0;
const MAX_SCORE: f64 = 100.0;

/// What the heuristics look at for one process
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub exe: Option<String>,
    pub cmdline: Vec<String>,
    pub ppid: Option<u32>,
    pub parent_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicEngine;

impl HeuristicEngine {
    pub fn new() -> Self {
        Self
    }

    /// Score in [0, 100]
    pub fn score_process(&self, info: &ProcessInfo) -> f64 {
        let mut score = 0.0;
        let name = info.name.to_lowercase();
        let exe = info.exe.as_deref().unwrap_or("").to_lowercase();
        let cmd = info.cmdline.join(" ").to_lowercase();

        if SUSPICIOUS_NAMES.contains(&name.as_str()) {
            score += NAME_WEIGHT;
        }

        if (name.contains("powershell.exe") || cmd.contains("powershell"))
            && (cmd.contains("encodedcommand") || cmd.contains("downloadstring"))
        {
            score += POWERSHELL_PAYLOAD_WEIGHT;
        }

        // Fileless pattern: no backing image on disk
        if exe.is_empty() {
            score += NO_IMAGE_WEIGHT;
        }

        if let Some(parent) = info.parent_name.as_deref() {
            let parent = parent.to_lowercase();
            if name.contains("powershell") && OFFICE_PARENTS.iter().any(|p| parent.contains(p)) {
                score += OFFICE_PARENT_WEIGHT;
            }
        }

        f64::min(score, MAX_SCORE)
    }
}
