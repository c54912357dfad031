// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Shared record store.
//!
//! Wraps the kernel's [`TrackState`] behind a reader/writer lock together
//! with the durable sink. An append holds the write lock from persist to
//! commit callback, so readers observe either the whole append or none of it,
//! and commits (and therefore notifications) are totally ordered.
//!
//! Every method blocks, on the lock and for appends on fsync. Async code
//! reads through [`crate::query::QueryService`], which runs them on the
//! blocking pool.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use busline_kernel::verify::state_digest;
use busline_kernel::{LocationReport, ReportDraft, TrackState};
use busline_persistence::codec::encode_report;
use busline_persistence::{LogWriter, PersistenceError};
use chrono::Utc;

use crate::errors::NodeError;
use crate::telemetry::DEVICES_TRACKED;

/// Durable destination for committed reports.
pub trait RecordSink: Send + Sync {
    /// Must return only once the report is durable.
    fn persist(&mut self, report: &LocationReport) -> Result<(), PersistenceError>;
}

impl RecordSink for LogWriter {
    fn persist(&mut self, report: &LocationReport) -> Result<(), PersistenceError> {
        let payload = encode_report(report)?;
        self.append(report.id.0, &payload)?;
        Ok(())
    }
}

/// Counters reported by `/health`, taken under one read lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub records: usize,
    pub devices: usize,
    pub durable: bool,
}

struct StoreInner {
    state: TrackState,
    sink: Option<Box<dyn RecordSink>>,
}

pub struct RecordStore {
    inner: RwLock<StoreInner>,
}

impl RecordStore {
    /// Store without durability. Contents are lost on restart.
    pub fn in_memory() -> Self {
        Self::from_parts(TrackState::new(), None)
    }

    /// Store resuming from `state` and persisting through `sink`.
    pub fn from_parts(state: TrackState, sink: Option<Box<dyn RecordSink>>) -> Self {
        metrics::gauge!(DEVICES_TRACKED, state.device_count() as f64);
        Self {
            inner: RwLock::new(StoreInner { state, sink }),
        }
    }

    pub fn is_durable(&self) -> bool {
        self.read().sink.is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, draft: ReportDraft) -> Result<Arc<LocationReport>, NodeError> {
        self.append_with(draft, |_| {})
    }

    /// Validates, persists and commits `draft`, then runs `on_commit` while
    /// the write lock is still held.
    ///
    /// Nothing in memory changes unless the sink accepted the report.
    pub fn append_with<F>(&self, draft: ReportDraft, on_commit: F) -> Result<Arc<LocationReport>, NodeError>
    where
        F: FnOnce(&Arc<LocationReport>),
    {
        let mut guard = self.write();
        let inner = &mut *guard;

        let report = inner.state.prepare(draft, Utc::now())?;
        if let Some(sink) = inner.sink.as_mut() {
            sink.persist(&report)?;
        }
        let stored = inner.state.apply(report)?;

        metrics::gauge!(DEVICES_TRACKED, inner.state.device_count() as f64);
        on_commit(&stored);
        Ok(stored)
    }

    pub fn get_latest(&self, device_id: &str) -> Result<Arc<LocationReport>, NodeError> {
        let inner = self.read();
        let report = inner.state.get_latest(device_id)?;
        Ok(Arc::clone(report))
    }

    /// `None` or `Some(0)` returns every device.
    pub fn all_latest(&self, limit: Option<usize>) -> Vec<Arc<LocationReport>> {
        self.read().state.all_latest(limit)
    }

    pub fn all_records(&self) -> Vec<Arc<LocationReport>> {
        self.read().state.records().to_vec()
    }

    pub fn recent(&self, limit: usize) -> Vec<Arc<LocationReport>> {
        self.read().state.recent(limit).to_vec()
    }

    pub fn last_record(&self) -> Option<Arc<LocationReport>> {
        self.read().state.last_record().cloned()
    }

    pub fn len(&self) -> usize {
        self.read().state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().state.is_empty()
    }

    pub fn device_count(&self) -> usize {
        self.read().state.device_count()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.read();
        StoreStats {
            records: inner.state.len(),
            devices: inner.state.device_count(),
            durable: inner.sink.is_some(),
        }
    }

    pub fn digest(&self) -> [u8; 32] {
        state_digest(&self.read().state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use busline_kernel::ValidationError;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakySink {
        fail: Arc<AtomicBool>,
        persisted: Vec<u64>,
    }

    impl RecordSink for FlakySink {
        fn persist(&mut self, report: &LocationReport) -> Result<(), PersistenceError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PersistenceError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.persisted.push(report.id.0);
            Ok(())
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let store = RecordStore::in_memory();
        store.append(ReportDraft::new("bus01", 17.66, 78.31)).unwrap();
        store.append(ReportDraft::new("bus02", 17.70, 78.40)).unwrap();
        let latest = store.append(ReportDraft::new("bus01", 17.67, 78.32)).unwrap();

        assert_eq!(latest.id.0, 3);
        assert_eq!(store.len(), 3);
        assert_eq!(store.device_count(), 2);
        assert_eq!(store.get_latest("bus01").unwrap().latitude, 17.67);
        assert_eq!(store.all_latest(None).len(), 2);
        assert_eq!(store.all_latest(Some(1)).len(), 1);
        assert_eq!(store.recent(2).len(), 2);
        assert_eq!(store.last_record().unwrap().id.0, 3);
        assert_eq!(
            store.stats(),
            StoreStats {
                records: 3,
                devices: 2,
                durable: false
            }
        );
    }

    #[test]
    fn test_unknown_device_is_not_found() {
        let store = RecordStore::in_memory();
        assert!(matches!(store.get_latest("ghost"), Err(NodeError::NotFound(_))));
    }

    #[test]
    fn test_invalid_report_changes_nothing() {
        let store = RecordStore::in_memory();
        store.append(ReportDraft::new("bus01", 17.0, 78.0)).unwrap();
        let before = store.digest();

        let err = store.append(ReportDraft::new("bus01", 999.0, 78.0)).unwrap_err();
        assert!(matches!(
            err,
            NodeError::Validation(ValidationError::LatitudeOutOfRange(_))
        ));
        assert_eq!(store.digest(), before);
        assert_eq!(store.get_latest("bus01").unwrap().latitude, 17.0);
    }

    #[test]
    fn test_storage_failure_leaves_memory_untouched() {
        let fail = Arc::new(AtomicBool::new(false));
        let sink = FlakySink {
            fail: Arc::clone(&fail),
            persisted: Vec::new(),
        };
        let store = RecordStore::from_parts(TrackState::new(), Some(Box::new(sink)));
        store.append(ReportDraft::new("bus01", 17.0, 78.0)).unwrap();

        fail.store(true, Ordering::SeqCst);
        let mut committed = false;
        let err = store
            .append_with(ReportDraft::new("bus01", 18.0, 79.0), |_| committed = true)
            .unwrap_err();
        assert!(matches!(err, NodeError::Storage(_)));
        assert!(!committed);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_latest("bus01").unwrap().latitude, 17.0);

        // The failed id is reused by the next successful append.
        fail.store(false, Ordering::SeqCst);
        let next = store.append(ReportDraft::new("bus01", 18.0, 79.0)).unwrap();
        assert_eq!(next.id.0, 2);
    }

    #[test]
    fn test_concurrent_appends_keep_index_consistent() {
        let store = Arc::new(RecordStore::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let device = if t % 2 == 0 { "shared".to_string() } else { format!("bus{}", t) };
                        store
                            .append(ReportDraft::new(device, (i % 90) as f64, t as f64))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(), 400);
        // 4 threads write "shared", 4 write their own device.
        assert_eq!(store.device_count(), 5);

        let records = store.all_records();
        let ids: Vec<u64> = records.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, (1..=400).collect::<Vec<u64>>());

        // Latest for each device is its last record in log order.
        for latest in store.all_latest(None) {
            let last_in_log = records
                .iter()
                .rev()
                .find(|r| r.device_id == latest.device_id)
                .unwrap();
            assert_eq!(last_in_log.id, latest.id);
        }
    }
}
