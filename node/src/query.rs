// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use busline_kernel::LocationReport;

use crate::api::VehicleView;
use crate::errors::NodeError;
use crate::store::{RecordStore, StoreStats};

pub const DEFAULT_RECENT_LIMIT: usize = 100;

/// Read-side shaping of store contents for viewers.
///
/// Reads run on the blocking pool, so an append waiting on fsync never
/// parks an async worker.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<RecordStore>,
}

impl QueryService {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    async fn read<T, F>(&self, f: F) -> Result<T, NodeError>
    where
        F: FnOnce(&RecordStore) -> T + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store)).await.map_err(|e| {
            tracing::error!("store read task failed: {}", e);
            NodeError::Internal
        })
    }

    /// Latest view per device. `None` or `Some(0)` returns all of them.
    pub async fn vehicles(&self, limit: Option<usize>) -> Result<Vec<VehicleView>, NodeError> {
        self.read(move |store| {
            store
                .all_latest(limit)
                .iter()
                .map(|r| VehicleView::from(r.as_ref()))
                .collect()
        })
        .await
    }

    pub async fn vehicle(&self, device_id: &str) -> Result<VehicleView, NodeError> {
        let device_id = device_id.to_string();
        let report = self.read(move |store| store.get_latest(&device_id)).await??;
        Ok(VehicleView::from(report.as_ref()))
    }

    pub async fn all_records(&self) -> Result<Vec<Arc<LocationReport>>, NodeError> {
        self.read(RecordStore::all_records).await
    }

    pub async fn recent(&self, limit: Option<usize>) -> Result<Vec<Arc<LocationReport>>, NodeError> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        self.read(move |store| store.recent(limit)).await
    }

    pub async fn last_record(&self) -> Result<Option<Arc<LocationReport>>, NodeError> {
        self.read(RecordStore::last_record).await
    }

    pub async fn stats(&self) -> Result<StoreStats, NodeError> {
        self.read(RecordStore::stats).await
    }
}
