//! Event Bus
//!
//! Multi-producer, single-consumer hand-off between sensors and the
//! analysis loop.
//!
//! Ordering: events from one publisher are received in publish order.
//! There is NO global order across publishers; interleaving depends on
//! publish timing and callers must not rely on it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::event::SecurityEvent;

// ============================================================================
// TYPES
// ============================================================================

/// Outcome of a bounded wait on the bus
#[derive(Debug)]
pub enum Received {
    Event(SecurityEvent),
    Empty,
}

#[derive(Clone)]
enum BusSender {
    Unbounded(mpsc::UnboundedSender<SecurityEvent>),
    Bounded(mpsc::Sender<SecurityEvent>),
}

enum BusReceiver {
    Unbounded(mpsc::UnboundedReceiver<SecurityEvent>),
    Bounded(mpsc::Receiver<SecurityEvent>),
}

#[derive(Debug, Default)]
struct BusCounters {
    published: AtomicU64,
    received: AtomicU64,
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BusStats {
    pub published: u64,
    pub received: u64,
}

// ============================================================================
// BUS
// ============================================================================

/// Consumer side of the bus, owned by the analysis loop
pub struct EventBus {
    // Kept so the channel never reports closed while the bus is alive
    sender: BusSender,
    receiver: BusReceiver,
    counters: Arc<BusCounters>,
}

impl EventBus {
    /// Bus with unlimited buffering; publish never waits
    pub fn unbounded() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: BusSender::Unbounded(tx),
            receiver: BusReceiver::Unbounded(rx),
            counters: Arc::new(BusCounters::default()),
        }
    }

    /// Bus holding at most `capacity` undelivered events; publish waits
    /// for room instead of dropping
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            sender: BusSender::Bounded(tx),
            receiver: BusReceiver::Bounded(rx),
            counters: Arc::new(BusCounters::default()),
        }
    }

    /// Create a publishing handle for one producer
    pub fn publisher(&self, source: &str) -> EventPublisher {
        EventPublisher {
            sender: self.sender.clone(),
            source: Arc::from(source),
            counters: Arc::clone(&self.counters),
        }
    }

    /// Wait up to `timeout` for the next event
    pub async fn receive(&mut self, timeout: Duration) -> Received {
        let next = match &mut self.receiver {
            BusReceiver::Unbounded(rx) => tokio::time::timeout(timeout, rx.recv()).await,
            BusReceiver::Bounded(rx) => tokio::time::timeout(timeout, rx.recv()).await,
        };

        match next {
            Ok(Some(event)) => {
                self.counters.received.fetch_add(1, Ordering::Relaxed);
                Received::Event(event)
            }
            // Closed cannot happen while `sender` lives; treat as empty
            Ok(None) | Err(_) => Received::Empty,
        }
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.counters.published.load(Ordering::Relaxed),
            received: self.counters.received.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// PUBLISHER
// ============================================================================

/// Producer handle; cheap to clone, safe to use from any task
#[derive(Clone)]
pub struct EventPublisher {
    sender: BusSender,
    source: Arc<str>,
    counters: Arc<BusCounters>,
}

impl EventPublisher {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Hand an event to the consumer. Never fails towards the caller:
    /// after the consumer is gone the event is discarded with a debug line.
    pub async fn publish(&self, event: SecurityEvent) {
        let event = event.with_source(&self.source);
        let sent = match &self.sender {
            BusSender::Unbounded(tx) => tx.send(event).map_err(|e| e.0),
            BusSender::Bounded(tx) => tx.send(event).await.map_err(|e| e.0),
        };

        match sent {
            Ok(()) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(event) => {
                log::debug!(
                    "[{}] bus closed, event dropped: {}",
                    self.source,
                    event.message()
                );
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
