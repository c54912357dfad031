// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Location report definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::id::{DeviceId, RecordId};

/// A normalized but not yet validated report, as produced by the ingest
/// normalizer. Nothing about it has been checked except that the fields
/// were found.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportDraft {
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Option<i64>,
    pub accuracy: Option<f64>,
    pub provider: Option<String>,
    pub raw_fields: Map<String, Value>,
}

impl ReportDraft {
    pub fn new(device_id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            device_id: device_id.into(),
            latitude,
            longitude,
            timestamp: None,
            accuracy: None,
            provider: None,
            raw_fields: Map::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// A stored report. Immutable once appended to the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    pub id: RecordId,
    pub device_id: DeviceId,
    pub latitude: f64,
    pub longitude: f64,
    /// Reporter-supplied epoch seconds. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub raw_fields: Map<String, Value>,
}
