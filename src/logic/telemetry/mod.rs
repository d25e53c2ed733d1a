//! Telemetry Module
//!
//! The event record every component shares and the bus that carries it.
//!
//! ## Structure
//! - `event.rs` - SecurityEvent, EventType, Severity
//! - `bus.rs` - EventBus (single consumer) and EventPublisher (per sensor)

pub mod event;
pub mod bus;

pub use event::{keys, EventType, SecurityEvent, Severity};
pub use bus::{BusStats, EventBus, EventPublisher, Received};
