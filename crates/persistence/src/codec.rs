//! Payload encoding for log entries.
//!
//! Payloads are JSON so reporter passthrough fields (arbitrary JSON) survive
//! the round trip unchanged.

use crate::error::{PersistenceError, Result};
use crate::wal::LogEntry;
use busline_kernel::LocationReport;

pub fn encode_report(report: &LocationReport) -> Result<Vec<u8>> {
    serde_json::to_vec(report).map_err(|e| PersistenceError::InvalidFormat(e.to_string()))
}

pub fn decode_report(payload: &[u8]) -> Result<LocationReport> {
    serde_json::from_slice(payload).map_err(|e| PersistenceError::InvalidFormat(e.to_string()))
}

/// Decodes an entry and checks that the frame and payload agree on the id.
pub fn decode_entry(entry: &LogEntry) -> Result<LocationReport> {
    let report = decode_report(&entry.payload)?;
    if report.id.0 != entry.header.record_id {
        return Err(PersistenceError::InvalidFormat(format!(
            "entry at offset {} frames record {} but holds record {}",
            entry.offset, entry.header.record_id, report.id.0
        )));
    }
    Ok(report)
}
