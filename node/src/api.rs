// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use busline_kernel::LocationReport;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A vehicle's position as shown to viewers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VehicleView {
    pub id: u64,
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Reporter timestamp rendered as RFC 3339 (UTC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_iso: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub received_at: String,
    #[serde(default)]
    pub raw_fields: Map<String, Value>,
}

impl From<&LocationReport> for VehicleView {
    fn from(report: &LocationReport) -> Self {
        Self {
            id: report.id.0,
            device_id: report.device_id.to_string(),
            latitude: report.latitude,
            longitude: report.longitude,
            timestamp: report.timestamp,
            timestamp_iso: report
                .timestamp
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            accuracy: report.accuracy,
            provider: report.provider.clone(),
            received_at: report.received_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            raw_fields: report.raw_fields.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct IngestResponse {
    pub status: String,
}

impl IngestResponse {
    pub fn stored() -> Self {
        Self { status: "ok".to_string() }
    }

    pub fn ignored() -> Self {
        Self { status: "ignored".to_string() }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub records: usize,
    pub devices: usize,
    pub subscribers: usize,
    pub durable: bool,
}
