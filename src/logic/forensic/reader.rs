//! Forensic log reader
//!
//! Inverts the collector's transform. An obfuscated byte can itself be the
//! separator (0x0A), so lines are not records: fragments are rejoined until
//! the accumulated bytes decode to a JSON document.

use std::fs;
use std::path::Path;

use serde_json::Value;

use super::cipher::ObfuscationKey;
use super::collector::RECORD_SEPARATOR;
use super::ForensicError;
use crate::logic::telemetry::SecurityEvent;

/// Decoded log contents
#[derive(Debug, Default)]
pub struct ForensicLog {
    /// JSON payload of each record, in file order
    pub records: Vec<Value>,
    /// Byte runs that never decoded (damaged record or truncated tail)
    pub corrupt_runs: usize,
}

fn decode(key: &ObfuscationKey, obfuscated: &[u8]) -> Option<Value> {
    if obfuscated.is_empty() {
        return None;
    }
    serde_json::from_slice::<Value>(&key.apply(obfuscated))
        .ok()
        .filter(Value::is_object)
}

/// Longest run of fragments a single record may span before the oldest
/// fragment is given up as damaged
const MAX_RUN_FRAGMENTS: usize = 64;

fn join_fragments(run: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (i, fragment) in run.iter().enumerate() {
        if i > 0 {
            buf.push(RECORD_SEPARATOR);
        }
        buf.extend_from_slice(fragment);
    }
    buf
}

/// Decode raw log bytes
pub fn decode_records(data: &[u8], key: &ObfuscationKey) -> ForensicLog {
    let mut log = ForensicLog::default();
    if data.is_empty() {
        return log;
    }

    let fragments: Vec<&[u8]> = data.split(|b| *b == RECORD_SEPARATOR).collect();
    let last = fragments.len() - 1;
    let mut run: Vec<&[u8]> = Vec::new();

    for (i, fragment) in fragments.iter().enumerate() {
        if i == last && fragment.is_empty() && run.is_empty() {
            break;
        }
        run.push(*fragment);

        // Earliest start first: a record spanning the whole run wins,
        // a later start means the fragments before it were damaged
        let decoded = (0..run.len())
            .find_map(|start| decode(key, &join_fragments(&run[start..])).map(|v| (start, v)));

        match decoded {
            Some((start, value)) => {
                if start > 0 {
                    log.corrupt_runs += 1;
                }
                log.records.push(value);
                run.clear();
            }
            None if run.len() > MAX_RUN_FRAGMENTS => {
                log.corrupt_runs += 1;
                run.remove(0);
            }
            None => {}
        }
    }

    if !run.is_empty() {
        log.corrupt_runs += 1;
    }

    log
}

/// Read and decode a forensic log file
pub fn read_records(path: &Path, key: &ObfuscationKey) -> Result<ForensicLog, ForensicError> {
    let data = fs::read(path)?;
    let log = decode_records(&data, key);
    if log.corrupt_runs > 0 {
        log::warn!(
            "Forensic log {:?}: {} undecodable run(s) skipped",
            path,
            log.corrupt_runs
        );
    }
    Ok(log)
}

/// Read a forensic log back into events, skipping payloads that no longer
/// match the event schema
pub fn read_events(path: &Path, key: &ObfuscationKey) -> Result<Vec<SecurityEvent>, ForensicError> {
    let log = read_records(path, key)?;
    let mut events = Vec::with_capacity(log.records.len());

    for record in log.records {
        match serde_json::from_value::<SecurityEvent>(record) {
            Ok(event) => events.push(event),
            Err(e) => log::warn!("Skipping forensic record with unexpected shape: {}", e),
        }
    }

    Ok(events)
}
