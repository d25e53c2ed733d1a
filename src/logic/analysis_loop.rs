//! Analysis loop
//!
//! The single consumer of the event bus. Each iteration either drains one
//! event (score -> forensic record -> reporters -> gated cascade) or, when
//! the bus stayed empty for a poll interval, feeds the adaptive baseline.
//! Nothing is carried from one iteration to the next.
//!
//! Every stage does blocking file or process-table I/O, so the binary runs
//! the loop on its own `analysis-loop` thread (see [`Pipeline::spawn`]).

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::logic::baseline::AdaptiveBaseline;
use crate::logic::detection::DetectionCascade;
use crate::logic::forensic::ForensicCollector;
use crate::logic::reporting::EventSink;
use crate::logic::risk::{calculate_risk, should_cascade};
use crate::logic::telemetry::{EventBus, Received, SecurityEvent};

/// Counters reported when the loop exits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub events_processed: u64,
    pub idle_cycles: u64,
    pub cascades_run: u64,
    pub forensic_failures: u64,
    pub sink_failures: u64,
    pub cascade_failures: u64,
    pub baseline_failures: u64,
}

/// What one iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Drained,
    Idle,
}

pub struct Pipeline {
    bus: EventBus,
    collector: ForensicCollector,
    sinks: Vec<Box<dyn EventSink>>,
    cascade: DetectionCascade,
    baseline: AdaptiveBaseline,
    medium_threshold: f64,
    poll_timeout: Duration,
    stats: Arc<RwLock<PipelineStats>>,
}

impl Pipeline {
    pub fn new(
        bus: EventBus,
        collector: ForensicCollector,
        cascade: DetectionCascade,
        baseline: AdaptiveBaseline,
    ) -> Self {
        Self {
            bus,
            collector,
            sinks: Vec::new(),
            cascade,
            baseline,
            medium_threshold: crate::constants::DEFAULT_RISK_MEDIUM,
            poll_timeout: Duration::from_millis(crate::constants::DEFAULT_POLL_MS),
            stats: Arc::new(RwLock::new(PipelineStats::default())),
        }
    }

    /// Sinks are called in the order they were added
    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_medium_threshold(mut self, threshold: f64) -> Self {
        self.medium_threshold = threshold;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats.read().clone()
    }

    /// Shared view for observers outside the loop
    pub fn stats_handle(&self) -> Arc<RwLock<PipelineStats>> {
        Arc::clone(&self.stats)
    }

    pub fn baseline(&self) -> &AdaptiveBaseline {
        &self.baseline
    }

    pub fn collector(&self) -> &ForensicCollector {
        &self.collector
    }

    /// One DRAIN or IDLE iteration
    pub async fn step(&mut self) -> Step {
        let received = self.bus.receive(self.poll_timeout).await;
        self.handle(received)
    }

    fn handle(&mut self, received: Received) -> Step {
        match received {
            Received::Event(event) => {
                self.process(event);
                Step::Drained
            }
            Received::Empty => {
                self.idle();
                Step::Idle
            }
        }
    }

    /// Run every stage for one event and hand back the final event
    pub fn process(&mut self, mut event: SecurityEvent) -> SecurityEvent {
        let score = calculate_risk(&event);
        event.set_risk_score(score);

        if !self.collector.record(&event) {
            self.stats.write().forensic_failures += 1;
        }

        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.handle(&event) {
                log::error!("[pipeline] sink {} failed on event {}: {}", sink.name(), event.id(), e);
                self.stats.write().sink_failures += 1;
            }
        }

        if should_cascade(score, self.medium_threshold) {
            let severity_before = event.severity();
            let failures = self.cascade.run(&mut event);

            // Recorded risk and report lines keep the pre-cascade view
            if event.severity() != severity_before {
                log::warn!(
                    "[pipeline] cascade raised event {} from {} to {} (risk {:.1} kept)",
                    event.id(),
                    severity_before.as_str(),
                    event.severity().as_str(),
                    score
                );
            }

            let mut stats = self.stats.write();
            stats.cascades_run += 1;
            stats.cascade_failures += failures as u64;
        }

        self.stats.write().events_processed += 1;
        event
    }

    fn idle(&mut self) {
        self.stats.write().idle_cycles += 1;
        if let Err(e) = self.baseline.update() {
            log::warn!("[pipeline] baseline update failed: {}", e);
            self.stats.write().baseline_failures += 1;
        }
    }

    /// Loop until the stop signal; the current step always completes
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PipelineStats {
        log::info!(
            "Analysis loop started (medium threshold {:.1}, poll {:?}, {} sinks, {} detectors)",
            self.medium_threshold,
            self.poll_timeout,
            self.sinks.len(),
            self.cascade.len()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                _ = shutdown.changed() => break,
                received = self.bus.receive(self.poll_timeout) => received,
            };
            self.handle(received);
        }

        let bus = self.bus.stats();
        let stats = self.stats();
        log::info!(
            "Analysis loop stopped: processed={} idle={} published={} received={}",
            stats.events_processed, stats.idle_cycles, bus.published, bus.received
        );
        stats
    }

    /// Run the loop on a dedicated thread, waiting on the bus through `runtime`
    pub fn spawn(
        self,
        shutdown: watch::Receiver<bool>,
        runtime: Handle,
    ) -> std::io::Result<thread::JoinHandle<PipelineStats>> {
        thread::Builder::new()
            .name("analysis-loop".to_string())
            .spawn(move || runtime.block_on(self.run(shutdown)))
    }
}

// ============================================================================
// TESTS
// ============================================================================
