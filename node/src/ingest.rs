// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Reporter payload normalization and the ingest path.
//!
//! Reporters do not agree on field names. OwnTracks sends `tid`/`lat`/`lon`/
//! `tst`, hand-rolled trackers send `device_id`/`latitude`/`longitude`. The
//! first alias present wins; the untouched payload is kept as `raw_fields`.

use std::sync::Arc;

use busline_kernel::{LocationReport, ReportDraft, ValidationError};
use chrono::DateTime;
use serde_json::{Map, Value};

use crate::errors::NodeError;
use crate::notifier::ChangeNotifier;
use crate::store::RecordStore;
use crate::telemetry::{REPORTS_INGESTED, REPORTS_REJECTED};

const DEVICE_KEYS: &[&str] = &["device_id", "tid", "topic"];
const LATITUDE_KEYS: &[&str] = &["lat", "latitude"];
const LONGITUDE_KEYS: &[&str] = &["lon", "longitude"];
const ACCURACY_KEYS: &[&str] = &["accuracy", "acc"];
const PROVIDER_KEYS: &[&str] = &["provider", "t", "source"];

#[derive(Debug)]
pub enum IngestOutcome {
    Stored(Arc<LocationReport>),
    /// Status pings carry no position and are acknowledged without storing.
    Ignored,
}

/// `Ok(None)` for payloads that are acknowledged but not stored.
pub fn normalize(payload: Value) -> Result<Option<ReportDraft>, ValidationError> {
    let Value::Object(fields) = payload else {
        return Err(ValidationError::NotAnObject);
    };

    if fields.get("_type").and_then(Value::as_str) == Some("status") {
        return Ok(None);
    }

    let device_id = first_present(&fields, DEVICE_KEYS)
        .and_then(text_of)
        .filter(|s| !s.trim().is_empty())
        .ok_or(ValidationError::MissingDeviceId)?;

    let latitude = coordinate(&fields, LATITUDE_KEYS, "latitude")?;
    let longitude = coordinate(&fields, LONGITUDE_KEYS, "longitude")?;

    Ok(Some(ReportDraft {
        device_id,
        latitude,
        longitude,
        timestamp: timestamp(&fields),
        accuracy: first_present(&fields, ACCURACY_KEYS).and_then(number_of),
        provider: first_present(&fields, PROVIDER_KEYS)
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.is_empty()),
        raw_fields: fields,
    }))
}

fn first_present<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find(|v| !v.is_null())
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coordinate(fields: &Map<String, Value>, keys: &[&str], field: &'static str) -> Result<f64, ValidationError> {
    let value = first_present(fields, keys).ok_or(ValidationError::MissingCoordinate(field))?;
    number_of(value).ok_or_else(|| ValidationError::NonNumericCoordinate {
        field,
        value: value.to_string(),
    })
}

/// `tst` (epoch seconds) first, then `timestamp` as epoch seconds or RFC 3339.
fn timestamp(fields: &Map<String, Value>) -> Option<i64> {
    let epoch = |v: &Value| match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    };

    if let Some(ts) = fields.get("tst").and_then(epoch) {
        return Some(ts);
    }
    match fields.get("timestamp")? {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.timestamp())
            .or_else(|| s.trim().parse().ok()),
        other => epoch(other),
    }
}

/// Entry point for reporter submissions: normalize, store, notify.
#[derive(Clone)]
pub struct IngestHandler {
    store: Arc<RecordStore>,
    notifier: ChangeNotifier,
}

impl IngestHandler {
    pub fn new(store: Arc<RecordStore>, notifier: ChangeNotifier) -> Self {
        Self { store, notifier }
    }

    pub fn ingest(&self, payload: Value) -> Result<IngestOutcome, NodeError> {
        let draft = match normalize(payload) {
            Ok(Some(draft)) => draft,
            Ok(None) => {
                tracing::debug!("status payload acknowledged");
                return Ok(IngestOutcome::Ignored);
            }
            Err(e) => return Err(self.rejected(e.into())),
        };

        let notifier = &self.notifier;
        let stored = self
            .store
            .append_with(draft, |report| {
                notifier.publish(report);
            })
            .map_err(|e| self.rejected(e))?;

        metrics::counter!(REPORTS_INGESTED, 1);
        tracing::debug!(
            "stored report {} for {} at ({}, {})",
            stored.id,
            stored.device_id,
            stored.latitude,
            stored.longitude
        );
        Ok(IngestOutcome::Stored(stored))
    }

    /// Raw request body; anything that is not JSON is a validation failure.
    pub fn ingest_bytes(&self, body: &[u8]) -> Result<IngestOutcome, NodeError> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| self.rejected(NodeError::MalformedPayload(e.to_string())))?;
        self.ingest(payload)
    }

    fn rejected(&self, err: NodeError) -> NodeError {
        if matches!(err, NodeError::Validation(_) | NodeError::MalformedPayload(_)) {
            metrics::counter!(REPORTS_REJECTED, 1);
            tracing::warn!("rejected report: {}", err);
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_owntracks_payload() {
        let draft = normalize(json!({
            "_type": "location",
            "tid": "b7",
            "lat": 17.66,
            "lon": 78.31,
            "tst": 1763652000,
            "acc": 12,
            "t": "u"
        }))
        .unwrap()
        .unwrap();

        assert_eq!(draft.device_id, "b7");
        assert_eq!(draft.latitude, 17.66);
        assert_eq!(draft.longitude, 78.31);
        assert_eq!(draft.timestamp, Some(1763652000));
        assert_eq!(draft.accuracy, Some(12.0));
        assert_eq!(draft.provider.as_deref(), Some("u"));
        assert_eq!(draft.raw_fields.get("_type"), Some(&json!("location")));
    }

    #[test]
    fn test_long_names_and_string_numbers() {
        let draft = normalize(json!({
            "device_id": "bus01",
            "latitude": "17.5",
            "longitude": " 78.25 ",
            "timestamp": "2025-11-20T15:20:00Z",
            "provider": "gps"
        }))
        .unwrap()
        .unwrap();

        assert_eq!(draft.latitude, 17.5);
        assert_eq!(draft.longitude, 78.25);
        assert_eq!(draft.timestamp, Some(1763652000));
        assert_eq!(draft.provider.as_deref(), Some("gps"));
    }

    #[test]
    fn test_device_id_alias_priority() {
        let draft = normalize(json!({"device_id": "a", "tid": "b", "lat": 0, "lon": 0}))
            .unwrap()
            .unwrap();
        assert_eq!(draft.device_id, "a");

        // Zero is a real coordinate, not a missing one.
        assert_eq!(draft.latitude, 0.0);
    }

    #[test]
    fn test_status_is_ignored() {
        assert_eq!(normalize(json!({"_type": "status", "tid": "b7"})).unwrap(), None);
    }

    #[test]
    fn test_rejections() {
        assert_eq!(normalize(json!([1, 2])), Err(ValidationError::NotAnObject));
        assert_eq!(
            normalize(json!({"lat": 1, "lon": 2})),
            Err(ValidationError::MissingDeviceId)
        );
        assert_eq!(
            normalize(json!({"tid": "  ", "lat": 1, "lon": 2})),
            Err(ValidationError::MissingDeviceId)
        );
        assert_eq!(
            normalize(json!({"tid": "b7", "lon": 2})),
            Err(ValidationError::MissingCoordinate("latitude"))
        );
        assert!(matches!(
            normalize(json!({"tid": "b7", "lat": "north", "lon": 2})),
            Err(ValidationError::NonNumericCoordinate { field: "latitude", .. })
        ));
    }

    #[test]
    fn test_ingest_stores_and_notifies() {
        let store = Arc::new(RecordStore::in_memory());
        let notifier = ChangeNotifier::default();
        let mut sub = notifier.subscribe();
        let handler = IngestHandler::new(Arc::clone(&store), notifier);

        let outcome = handler
            .ingest_bytes(br#"{"tid":"bus01","lat":17.66,"lon":78.31}"#)
            .unwrap();
        let IngestOutcome::Stored(report) = outcome else {
            panic!("expected a stored report");
        };
        assert_eq!(report.id.0, 1);
        assert_eq!(sub.try_recv().unwrap().id, report.id);

        assert!(matches!(
            handler.ingest_bytes(b"not json"),
            Err(NodeError::MalformedPayload(_))
        ));
        assert!(matches!(
            handler.ingest(json!({"tid": "bus01", "lat": 999, "lon": 0})),
            Err(NodeError::Validation(ValidationError::LatitudeOutOfRange(_)))
        ));
        assert!(sub.try_recv().is_none());
        assert_eq!(store.len(), 1);
    }
}
