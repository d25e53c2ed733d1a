//! Logic Module - Agent engines
//!
//! ## Data flow
//! - `sensors/` - process, network, filesystem and registry producers
//! - `telemetry/` - event model and the event bus
//! - `analysis_loop` - single consumer: risk -> forensic -> reporting -> detection
//! - `baseline/` - idle-time load baseline

// Event model & transport
pub mod telemetry;

// Producers
pub mod sensors;

// Consumer stages
pub mod risk;
pub mod forensic;
pub mod reporting;
pub mod detection;
pub mod baseline;
pub mod analysis_loop;

// Runtime configuration
pub mod config;
