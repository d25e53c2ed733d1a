//! Network sensor
//!
//! Reads the TCP connection table (`/proc/net/tcp{,6}` on Linux, `netstat
//! -ano` elsewhere) and reports connections to suspicious remote peers.

use std::collections::HashMap;
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use super::threat_intel::ThreatIntelClient;
use super::{PollingSensor, SeenSet, SensorError};
use crate::constants::NETWORK_INTERVAL;
use crate::logic::telemetry::{keys, EventType, SecurityEvent, Severity};

/// Remote ports commonly used by reverse shells and C2 tooling
pub const SUSPICIOUS_PORTS: &[u16] = &[4444, 1337, 8081];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    pub laddr: SocketAddr,
    pub raddr: Option<SocketAddr>,
    pub status: String,
    pub pid: Option<u32>,
}

impl Connection {
    fn raddr_text(&self) -> String {
        self.raddr
            .map(|a| a.to_string())
            .unwrap_or_else(|| "?:?".to_string())
    }
}

// ============================================================================
// CONNECTION TABLE
// ============================================================================

/// Snapshot of the host's TCP connections
pub fn collect_connections() -> Result<Vec<Connection>, SensorError> {
    #[cfg(target_os = "linux")]
    {
        collect_from_proc(socket_owners())
    }

    #[cfg(not(target_os = "linux"))]
    {
        collect_from_netstat()
    }
}

/// Number of TCP connections, without resolving owning processes
pub fn count_connections() -> Result<usize, SensorError> {
    #[cfg(target_os = "linux")]
    {
        Ok(collect_from_proc(HashMap::new())?.len())
    }

    #[cfg(not(target_os = "linux"))]
    {
        Ok(collect_from_netstat()?.len())
    }
}

#[cfg(target_os = "linux")]
fn collect_from_proc(owners: HashMap<u64, u32>) -> Result<Vec<Connection>, SensorError> {
    let mut rows = Vec::new();

    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        match std::fs::read_to_string(table) {
            Ok(content) => rows.extend(parse_proc_net_tcp(&content, &owners)),
            // tcp6 is absent when IPv6 is disabled
            Err(e) if table.ends_with('6') => log::debug!("{} unreadable: {}", table, e),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(rows)
}

/// Map socket inode -> owning pid by walking `/proc/<pid>/fd`.
/// Processes we may not inspect are skipped.
#[cfg(target_os = "linux")]
fn socket_owners() -> HashMap<u64, u32> {
    let mut owners = HashMap::new();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return owners;
    };

    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let Ok(fds) = std::fs::read_dir(entry.path().join("fd")) else {
            continue;
        };
        for fd in fds.flatten() {
            let Ok(target) = std::fs::read_link(fd.path()) else {
                continue;
            };
            if let Some(inode) = parse_socket_link(&target.to_string_lossy()) {
                owners.insert(inode, pid);
            }
        }
    }

    owners
}

#[cfg(not(target_os = "linux"))]
fn collect_from_netstat() -> Result<Vec<Connection>, SensorError> {
    let mut command = Command::new("netstat");
    command.arg("-ano");

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        // CREATE_NO_WINDOW
        command.creation_flags(0x08000000);
    }

    let stdout = run_bounded(command, crate::constants::COMMAND_TIMEOUT)?;
    Ok(parse_netstat(&String::from_utf8_lossy(&stdout)))
}

/// Run a command and collect its stdout, killing it once `timeout` elapses
#[cfg_attr(target_os = "linux", allow(dead_code))]
fn run_bounded(mut command: Command, timeout: Duration) -> Result<Vec<u8>, SensorError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    // Drain stdout on its own thread so a full pipe cannot block the child
    let reader = child.stdout.take().map(|mut stdout| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        })
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if start.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SensorError::SourceFailed(format!(
                    "{:?} did not finish within {:?}",
                    command.get_program(),
                    timeout
                )));
            }
            None => std::thread::sleep(Duration::from_millis(50)),
        }
    };

    if !status.success() {
        return Err(SensorError::SourceFailed(format!(
            "{:?} exited with {}",
            command.get_program(),
            status
        )));
    }

    match reader.map(|handle| handle.join()) {
        Some(Ok(result)) => Ok(result?),
        Some(Err(_)) => Err(SensorError::SourceFailed("stdout reader panicked".to_string())),
        None => Ok(Vec::new()),
    }
}

// ============================================================================
// PARSERS
// ============================================================================

fn parse_socket_link(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

fn tcp_state_name(code: &str) -> &'static str {
    match code {
        "01" => "ESTABLISHED",
        "02" => "SYN_SENT",
        "03" => "SYN_RECV",
        "04" => "FIN_WAIT1",
        "05" => "FIN_WAIT2",
        "06" => "TIME_WAIT",
        "07" => "CLOSE",
        "08" => "CLOSE_WAIT",
        "09" => "LAST_ACK",
        "0A" => "LISTEN",
        "0B" => "CLOSING",
        _ => "UNKNOWN",
    }
}

/// Decode `HHHHHHHH:PPPP`. Address words are in host byte order
/// (little-endian on every platform we ship), the port is big-endian.
fn parse_proc_addr(text: &str) -> Option<SocketAddr> {
    let (addr_hex, port_hex) = text.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;

    let ip = match addr_hex.len() {
        8 => {
            let word = u32::from_str_radix(addr_hex, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(word.to_le_bytes()))
        }
        32 => {
            let mut octets = [0u8; 16];
            for i in 0..4 {
                let word = u32::from_str_radix(&addr_hex[i * 8..i * 8 + 8], 16).ok()?;
                octets[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };

    Some(SocketAddr::new(ip, port))
}

/// Peer address, or `None` when the socket has no remote end
fn remote_or_none(addr: SocketAddr) -> Option<SocketAddr> {
    if addr.ip().is_unspecified() && addr.port() == 0 {
        None
    } else {
        Some(addr)
    }
}

pub fn parse_proc_net_tcp(content: &str, owners: &HashMap<u64, u32>) -> Vec<Connection> {
    let mut rows = Vec::new();

    // First line is the column header
    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }

        let (Some(laddr), Some(raddr)) = (parse_proc_addr(fields[1]), parse_proc_addr(fields[2]))
        else {
            continue;
        };
        let inode = fields[9].parse::<u64>().ok();

        rows.push(Connection {
            laddr,
            raddr: remote_or_none(raddr),
            status: tcp_state_name(fields[3]).to_string(),
            pid: inode.and_then(|i| owners.get(&i).copied()),
        });
    }

    rows
}

/// Parse TCP rows of `netstat -ano` (Windows column layout)
pub fn parse_netstat(output: &str) -> Vec<Connection> {
    let mut rows = Vec::new();

    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 || !parts[0].eq_ignore_ascii_case("TCP") {
            continue;
        }

        let Ok(laddr) = parts[1].parse::<SocketAddr>() else {
            continue;
        };
        let raddr = parts[2].parse::<SocketAddr>().ok().and_then(remote_or_none);

        rows.push(Connection {
            laddr,
            raddr,
            status: parts[3].to_string(),
            pid: parts[4].parse::<u32>().ok(),
        });
    }

    rows
}

// ============================================================================
// SENSOR
// ============================================================================

pub struct NetworkSensor {
    seen: SeenSet<Connection>,
    ti_client: ThreatIntelClient,
}

impl NetworkSensor {
    pub fn new(ti_client: ThreatIntelClient) -> Self {
        Self {
            seen: SeenSet::new(),
            ti_client,
        }
    }

    /// Apply the suspicious-peer policy to one table snapshot
    pub fn evaluate(&mut self, connections: Vec<Connection>) -> Vec<SecurityEvent> {
        let mut events = Vec::new();

        for conn in connections {
            if !self.seen.insert(conn.clone()) {
                continue;
            }

            // Local-only sockets are never reported
            let Some(raddr) = conn.raddr else {
                continue;
            };

            let ti = self.ti_client.is_malicious_ip(&raddr.ip());
            if ti != Some(true) && !SUSPICIOUS_PORTS.contains(&raddr.port()) {
                continue;
            }

            let mut event = build_event(&conn);
            if ti == Some(true) {
                event.insert_detail(keys::TI_MALICIOUS_IP, raddr.ip().to_string());
            }
            events.push(event);
        }

        events
    }
}

fn build_event(conn: &Connection) -> SecurityEvent {
    let laddr = conn.laddr.to_string();
    let raddr = conn.raddr_text();

    SecurityEvent::new(
        EventType::Network,
        Severity::Medium,
        &format!("Suspicious network connection {} -> {} ({})", laddr, raddr, conn.status),
    )
    .with_detail(keys::LADDR, laddr)
    .with_detail(keys::RADDR, raddr)
    .with_detail(keys::STATUS, conn.status.clone())
    .with_detail(keys::PID, conn.pid)
    .with_detail(keys::IS_REMOTE, conn.raddr.is_some())
}

impl PollingSensor for NetworkSensor {
    fn name(&self) -> &'static str {
        "network"
    }

    fn interval(&self) -> Duration {
        NETWORK_INTERVAL
    }

    fn poll(&mut self) -> Result<Vec<SecurityEvent>, SensorError> {
        let connections = collect_connections()?;
        Ok(self.evaluate(connections))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::risk::calculate_risk;

    const PROC_TCP: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:0035 00000000:0000 0A 00000000:00000000 00:00000000 00000000   101        0 12345 1 0000000000000000 100 0 0 10 0
   1: 0F02000A:C350 2200A8C0:115C 01 00000000:00000000 00:00000000 00000000  1000        0 67890 1 0000000000000000 20 4 30 10 -1
";

    fn conn(raddr: Option<&str>) -> Connection {
        Connection {
            laddr: "10.0.2.15:50000".parse().unwrap(),
            raddr: raddr.map(|r| r.parse().unwrap()),
            status: "ESTABLISHED".to_string(),
            pid: Some(42),
        }
    }

    #[test]
    fn test_parse_proc_net_tcp() {
        let mut owners = HashMap::new();
        owners.insert(67890u64, 4242u32);

        let rows = parse_proc_net_tcp(PROC_TCP, &owners);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].laddr, "127.0.0.1:53".parse().unwrap());
        assert_eq!(rows[0].raddr, None);
        assert_eq!(rows[0].status, "LISTEN");
        assert_eq!(rows[0].pid, None);

        assert_eq!(rows[1].laddr, "10.0.2.15:50000".parse().unwrap());
        assert_eq!(rows[1].raddr, Some("192.168.0.34:4444".parse().unwrap()));
        assert_eq!(rows[1].status, "ESTABLISHED");
        assert_eq!(rows[1].pid, Some(4242));
    }

    #[test]
    fn test_counting_needs_no_owners() {
        let rows = parse_proc_net_tcp(PROC_TCP, &HashMap::new());
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.pid.is_none()));
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_command_is_killed() {
        let mut command = Command::new("sleep");
        command.arg("30");

        let start = Instant::now();
        let result = run_bounded(command, Duration::from_millis(200));
        assert!(matches!(result, Err(SensorError::SourceFailed(_))));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_output_collected() {
        let mut command = Command::new("echo");
        command.arg("TCP 0.0.0.0:135 0.0.0.0:0 LISTENING 1032");

        let stdout = run_bounded(command, Duration::from_secs(10)).unwrap();
        let rows = parse_netstat(&String::from_utf8_lossy(&stdout));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pid, Some(1032));
    }

    #[test]
    fn test_parse_socket_link() {
        assert_eq!(parse_socket_link("socket:[67890]"), Some(67890));
        assert_eq!(parse_socket_link("/dev/null"), None);
    }

    #[test]
    fn test_parse_proc_ipv6_addr() {
        let addr = parse_proc_addr("00000000000000000000000001000000:0016").unwrap();
        assert_eq!(addr, "[::1]:22".parse().unwrap());
    }

    #[test]
    fn test_parse_netstat() {
        let output = "
Active Connections

  Proto  Local Address          Foreign Address        State           PID
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1032
  TCP    192.168.1.20:51000     203.0.113.9:1337       ESTABLISHED     5120
  TCP    [::1]:49670            [::1]:49671            ESTABLISHED     3000
  UDP    0.0.0.0:5353           *:*                                    2200
";
        let rows = parse_netstat(output);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].raddr, None);
        assert_eq!(rows[1].raddr, Some("203.0.113.9:1337".parse().unwrap()));
        assert_eq!(rows[1].pid, Some(5120));
        assert_eq!(rows[2].laddr, "[::1]:49670".parse().unwrap());
    }

    #[test]
    fn test_suspicious_port_reported_once() {
        let mut sensor = NetworkSensor::new(ThreatIntelClient::new());

        let events = sensor.evaluate(vec![conn(Some("198.51.100.1:4444")), conn(Some("198.51.100.1:443"))]);
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.event_type(), EventType::Network);
        assert_eq!(event.severity(), Severity::Medium);
        assert_eq!(event.detail_str(keys::RADDR), Some("198.51.100.1:4444"));
        assert_eq!(event.detail(keys::IS_REMOTE), Some(&serde_json::Value::Bool(true)));
        assert_eq!(event.detail(keys::PID), Some(&serde_json::json!(42)));
        // NETWORK MEDIUM with is_remote: 40 * 1.2 + 5
        assert!((calculate_risk(event) - 53.0).abs() < 1e-9);

        // Same identity on the next pass is remembered
        assert!(sensor.evaluate(vec![conn(Some("198.51.100.1:4444"))]).is_empty());
    }

    #[test]
    fn test_local_only_ignored() {
        let mut sensor = NetworkSensor::new(ThreatIntelClient::new());
        assert!(sensor.evaluate(vec![conn(None)]).is_empty());
    }
}
