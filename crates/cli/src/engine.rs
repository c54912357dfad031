use anyhow::{Context, Result};

use busline_kernel::TrackState;
use busline_persistence::codec::decode_entry;
use busline_persistence::wal;

/// Replays a record log into a fresh [`TrackState`], optionally stopping
/// early, to show the fleet as it stood at some point in the past.
pub struct ForensicEngine {
    pub state: TrackState,
    pub current_id: u64,
    pub applied: usize,
}

impl ForensicEngine {
    pub fn new() -> Self {
        Self {
            state: TrackState::new(),
            current_id: 0,
            applied: 0,
        }
    }

    /// Applies entries up to and including `target` (all of them when `None`).
    ///
    /// Fails closed: the first unreadable or rejected entry stops the replay.
    pub fn replay_to(&mut self, log_path: &str, target: Option<u64>) -> Result<usize> {
        let reader = wal::read_stream(log_path).context("Failed to open record log")?;
        let mut replayed = 0;

        for entry_result in reader {
            let entry = entry_result?;
            let rid = entry.header.record_id;

            if rid <= self.current_id {
                continue;
            }
            if target.is_some_and(|t| rid > t) {
                break;
            }

            let report = decode_entry(&entry)?;
            self.state
                .apply(report)
                .map_err(|e| anyhow::anyhow!("Kernel rejected record {}: {}", rid, e))?;

            self.current_id = rid;
            self.applied += 1;
            replayed += 1;
        }

        Ok(replayed)
    }
}

impl Default for ForensicEngine {
    fn default() -> Self {
        Self::new()
    }
}
