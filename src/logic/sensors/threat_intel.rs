//! IP reputation lookup
//!
//! No feed is wired in: every lookup answers "unknown".

use std::net::IpAddr;

#[derive(Debug, Clone, Default)]
pub struct ThreatIntelClient;

impl ThreatIntelClient {
    pub fn new() -> Self {
        Self
    }

    /// `Some(true)` known malicious, `Some(false)` known benign,
    /// `None` unknown
    pub fn is_malicious_ip(&self, ip: &IpAddr) -> Option<bool> {
        log::trace!("TI lookup for IP={}", ip);
        None
    }
}
