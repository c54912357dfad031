// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Deterministic hashing of track state.

use crate::state::kernel::TrackState;
use crate::types::report::LocationReport;

/// BLAKE3 digest of the record log.
///
/// Covers every field of every record in log order. The index is derived
/// from the log and therefore not hashed separately. Two states replayed
/// from the same log always produce the same digest, which is how recovery
/// is checked.
pub fn state_digest(state: &TrackState) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(state.len() as u64).to_le_bytes());
    for record in state.records() {
        hash_record(&mut hasher, record);
    }
    *hasher.finalize().as_bytes()
}

fn hash_bytes(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u32).to_le_bytes());
    hasher.update(bytes);
}

fn hash_record(hasher: &mut blake3::Hasher, record: &LocationReport) {
    hasher.update(&record.id.0.to_le_bytes());
    hash_bytes(hasher, record.device_id.as_str().as_bytes());

    hasher.update(&record.latitude.to_bits().to_le_bytes());
    hasher.update(&record.longitude.to_bits().to_le_bytes());

    match record.timestamp {
        Some(ts) => {
            hasher.update(&[1]);
            hasher.update(&ts.to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }

    match record.accuracy {
        Some(acc) => {
            hasher.update(&[1]);
            hasher.update(&acc.to_bits().to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }

    match &record.provider {
        Some(provider) => {
            hasher.update(&[1]);
            hash_bytes(hasher, provider.as_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }

    hasher.update(&record.received_at.timestamp_micros().to_le_bytes());

    // serde_json maps iterate in key order, so this encoding is canonical.
    let raw = serde_json::to_vec(&record.raw_fields).unwrap_or_default();
    hash_bytes(hasher, &raw);
}

/// Lowercase hex rendering used by logs and the CLI.
pub fn digest_hex(digest: &[u8; 32]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
