use std::time::Duration;

use sysinfo::System;

use super::{PollingSensor, SeenSet, SensorError};
use crate::constants::PROCESS_INTERVAL;
use crate::logic::detection::heuristic::{HeuristicEngine, ProcessInfo};
use crate::logic::telemetry::{keys, EventType, SecurityEvent, Severity};

/// Heuristic score at which a new process is reported
const REPORT_SCORE: f64 = 50.0;
/// Heuristic score at which the report is HIGH and flagged as injected
const HIGH_SCORE: f64 = 70.0;

/// Reports each new PID once if the heuristics dislike it
pub struct ProcessSensor {
    system: System,
    seen: SeenSet<u32>,
    engine: HeuristicEngine,
}

impl ProcessSensor {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            seen: SeenSet::new(),
            engine: HeuristicEngine::new(),
        }
    }

    fn snapshot(&mut self) -> Vec<ProcessInfo> {
        self.system.refresh_processes();
        let processes = self.system.processes();

        processes
            .iter()
            .map(|(pid, process)| {
                let ppid = process.parent();
                ProcessInfo {
                    pid: pid.as_u32(),
                    name: process.name().to_string(),
                    exe: process.exe().map(|p| p.to_string_lossy().to_string()),
                    cmdline: process.cmd().to_vec(),
                    ppid: ppid.map(|p| p.as_u32()),
                    parent_name: ppid
                        .and_then(|p| processes.get(&p))
                        .map(|parent| parent.name().to_string()),
                }
            })
            .collect()
    }

    pub fn evaluate(&mut self, processes: Vec<ProcessInfo>) -> Vec<SecurityEvent> {
        let mut events = Vec::new();

        for info in processes {
            if !self.seen.insert(info.pid) {
                continue;
            }

            let score = self.engine.score_process(&info);
            if score >= REPORT_SCORE {
                log::debug!("[process] {} (PID={}) heuristic score {:.0}", info.name, info.pid, score);
                events.push(build_event(info, score));
            }
        }

        events
    }
}

impl Default for ProcessSensor {
    fn default() -> Self {
        Self::new()
    }
}

fn build_event(info: ProcessInfo, score: f64) -> SecurityEvent {
    let severity = if score >= HIGH_SCORE {
        Severity::High
    } else {
        Severity::Medium
    };

    SecurityEvent::new(
        EventType::Process,
        severity,
        &format!("Suspicious process detected: {} (PID={})", info.name, info.pid),
    )
    .with_detail(keys::PID, info.pid)
    .with_detail(keys::NAME, info.name)
    .with_detail(keys::EXE, info.exe)
    .with_detail(keys::CMDLINE, info.cmdline)
    .with_detail(keys::PPID, info.ppid)
    .with_detail(keys::IS_INJECTED, score >= HIGH_SCORE)
}

impl PollingSensor for ProcessSensor {
    fn name(&self) -> &'static str {
        "process"
    }

    fn interval(&self) -> Duration {
        PROCESS_INTERVAL
    }

    fn poll(&mut self) -> Result<Vec<SecurityEvent>, SensorError> {
        let snapshot = self.snapshot();
        Ok(self.evaluate(snapshot))
    }
}
