use crate::codec::encode_report;
use crate::error::Result;
use crate::wal::LogWriter;

use busline_kernel::{ReportDraft, TrackState};
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub struct TestPaths {
    pub log: PathBuf,
}

/// Fixed origin so fixture logs hash identically across runs.
pub fn fixture_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_763_652_000, 0).unwrap_or_default()
}

/// Writes `rounds` reports for each of `devices` buses, interleaved, each bus
/// drifting north-east from its own start point.
pub fn generate_fleet_log(dir: &Path, devices: usize, rounds: usize) -> Result<TestPaths> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    let log_path = dir.join("locations.log");
    let mut writer = LogWriter::open(&log_path)?;
    let mut state = TrackState::new();
    let epoch = fixture_epoch();

    for round in 0..rounds {
        for bus in 0..devices {
            let mut draft = ReportDraft::new(
                format!("bus{:02}", bus + 1),
                17.60 + bus as f64 * 0.01 + round as f64 * 0.001,
                75.90 + bus as f64 * 0.01 + round as f64 * 0.001,
            )
            .with_timestamp(epoch.timestamp() + round as i64 * 30);
            draft.provider = Some("fixture".to_string());

            let received_at = epoch + Duration::seconds((round * devices + bus) as i64);
            let report = state
                .prepare(draft, received_at)
                .map_err(|e| crate::error::PersistenceError::InvalidFormat(e.to_string()))?;
            writer.append(report.id.0, &encode_report(&report)?)?;
            state
                .apply(report)
                .map_err(|e| crate::error::PersistenceError::InvalidFormat(e.to_string()))?;
        }
    }

    Ok(TestPaths { log: log_path })
}
