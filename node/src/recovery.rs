// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Crash Recovery
//!
//! Rebuilds the store from the record log at startup. Replay is
//! deterministic: the same log always yields the same state digest.
//! A torn final entry is dropped; anything else that fails to decode or
//! apply aborts startup rather than serving a partial history.

use std::path::Path;
use std::time::Instant;

use busline_kernel::verify::{digest_hex, state_digest};
use busline_kernel::TrackState;
use busline_persistence::codec::decode_entry;
use busline_persistence::wal::{scan, LogScan};
use busline_persistence::LogWriter;

use crate::errors::NodeError;
use crate::store::RecordStore;
use crate::telemetry::REPLAY_DURATION;

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryReport {
    pub records: usize,
    pub devices: usize,
    /// Bytes of incomplete tail discarded.
    pub torn_bytes: u64,
    pub digest: [u8; 32],
}

/// Replays every entry of `scan` into a fresh state.
pub fn replay_log(scan: &LogScan) -> Result<TrackState, NodeError> {
    let mut state = TrackState::new();
    for entry in &scan.entries {
        let report = decode_entry(entry)?;
        state.apply(report).map_err(|e| {
            NodeError::Recovery(format!("entry at offset {} rejected: {}", entry.offset, e))
        })?;
    }
    Ok(state)
}

/// Opens the log at `path` (creating it if absent) and returns a durable
/// store holding everything it contained.
pub fn open_store(path: &Path) -> Result<(RecordStore, RecoveryReport), NodeError> {
    let start = Instant::now();
    let scan = scan(path)?;
    let state = replay_log(&scan)?;
    metrics::histogram!(REPLAY_DURATION, start.elapsed().as_secs_f64());

    let report = RecoveryReport {
        records: state.len(),
        devices: state.device_count(),
        torn_bytes: scan.torn_bytes,
        digest: state_digest(&state),
    };
    if scan.torn_bytes > 0 {
        tracing::warn!("discarding {} bytes of torn tail in {:?}", scan.torn_bytes, path);
    }
    tracing::info!(
        "replayed {} records for {} devices from {:?} in {:?} (digest {})",
        report.records,
        report.devices,
        path,
        start.elapsed(),
        digest_hex(&report.digest)
    );

    let writer = LogWriter::resume(path, &scan)?;
    Ok((RecordStore::from_parts(state, Some(Box::new(writer))), report))
}
