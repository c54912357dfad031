// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Track state: the record log and its latest-position index.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{KernelError, KernelResult};
use crate::state::index::LatestIndex;
use crate::types::id::RecordId;
use crate::types::report::{LocationReport, ReportDraft};
use crate::validate::{validate_draft, validate_report};

/// Append-only log plus derived index.
///
/// Mutation goes through `apply` only, which pushes to the log and updates
/// the index in one step, so a caller holding `&TrackState` never sees one
/// without the other.
#[derive(Clone, Debug, Default)]
pub struct TrackState {
    records: Vec<Arc<LocationReport>>,
    latest: LatestIndex,
    last_id: RecordId,
}

impl TrackState {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Read APIs ---

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn device_count(&self) -> usize {
        self.latest.len()
    }

    /// Id of the last committed record, `RecordId(0)` when empty.
    pub fn last_id(&self) -> RecordId {
        self.last_id
    }

    pub fn next_id(&self) -> RecordId {
        self.last_id.next()
    }

    pub fn get_latest(&self, device_id: &str) -> KernelResult<&Arc<LocationReport>> {
        self.latest
            .get(device_id)
            .map(|pos| &self.records[pos])
            .ok_or_else(|| KernelError::NotFound(device_id.to_string()))
    }

    /// One report per device. `None` or `Some(0)` means no limit.
    pub fn all_latest(&self, limit: Option<usize>) -> Vec<Arc<LocationReport>> {
        let take = match limit {
            Some(n) if n > 0 => n,
            _ => usize::MAX,
        };
        self.latest
            .iter()
            .take(take)
            .map(|(_, pos)| Arc::clone(&self.records[pos]))
            .collect()
    }

    /// The whole log in append order.
    pub fn records(&self) -> &[Arc<LocationReport>] {
        &self.records
    }

    /// The last `limit` records in append order.
    pub fn recent(&self, limit: usize) -> &[Arc<LocationReport>] {
        let start = self.records.len().saturating_sub(limit);
        &self.records[start..]
    }

    pub fn last_record(&self) -> Option<&Arc<LocationReport>> {
        self.records.last()
    }

    pub fn latest_index(&self) -> &LatestIndex {
        &self.latest
    }

    // --- Write Logic ---

    /// Validates `draft` and builds the report that `apply` would accept next.
    /// Does not mutate; callers persist the result before applying it.
    pub fn prepare(&self, draft: ReportDraft, received_at: DateTime<Utc>) -> KernelResult<LocationReport> {
        Ok(validate_draft(draft, self.next_id(), received_at)?)
    }

    /// Commits a prepared (or replayed) report.
    pub fn apply(&mut self, report: LocationReport) -> KernelResult<Arc<LocationReport>> {
        validate_report(&report)?;
        if report.id <= self.last_id {
            return Err(KernelError::OutOfOrder {
                last: self.last_id.0,
                found: report.id.0,
            });
        }

        let position = self.records.len();
        let report = Arc::new(report);
        self.last_id = report.id;
        self.latest.update(&report.device_id, position);
        self.records.push(Arc::clone(&report));
        Ok(report)
    }

    /// `prepare` + `apply` for purely in-memory use.
    pub fn append(&mut self, draft: ReportDraft, received_at: DateTime<Utc>) -> KernelResult<Arc<LocationReport>> {
        let report = self.prepare(draft, received_at)?;
        self.apply(report)
    }
}
