// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Report validation.
//!
//! Every report passes through here twice: once when a reporter submits it
//! and once more when the log is replayed on startup, so a hand-edited log
//! can never smuggle an out-of-range position into the index.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::types::id::{DeviceId, RecordId};
use crate::types::report::{LocationReport, ReportDraft};

pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

pub fn check_latitude(lat: f64) -> Result<f64, ValidationError> {
    if !lat.is_finite() {
        return Err(ValidationError::NonFinite("latitude"));
    }
    if lat < LATITUDE_RANGE.0 || lat > LATITUDE_RANGE.1 {
        return Err(ValidationError::LatitudeOutOfRange(lat));
    }
    Ok(lat)
}

pub fn check_longitude(lon: f64) -> Result<f64, ValidationError> {
    if !lon.is_finite() {
        return Err(ValidationError::NonFinite("longitude"));
    }
    if lon < LONGITUDE_RANGE.0 || lon > LONGITUDE_RANGE.1 {
        return Err(ValidationError::LongitudeOutOfRange(lon));
    }
    Ok(lon)
}

/// Turns a draft into a storable report carrying `id` and `received_at`.
pub fn validate_draft(
    draft: ReportDraft,
    id: RecordId,
    received_at: DateTime<Utc>,
) -> Result<LocationReport, ValidationError> {
    let device_id = DeviceId::new(draft.device_id)?;
    let latitude = check_latitude(draft.latitude)?;
    let longitude = check_longitude(draft.longitude)?;

    // Non-finite accuracy is dropped rather than refused; it is advisory.
    let accuracy = draft.accuracy.filter(|a| a.is_finite());

    Ok(LocationReport {
        id,
        device_id,
        latitude,
        longitude,
        timestamp: draft.timestamp,
        accuracy,
        provider: draft.provider.filter(|p| !p.is_empty()),
        received_at,
        raw_fields: draft.raw_fields,
    })
}

/// Re-checks a report that was already stored (replay path).
pub fn validate_report(report: &LocationReport) -> Result<(), ValidationError> {
    if report.device_id.as_str().trim().is_empty() {
        return Err(ValidationError::MissingDeviceId);
    }
    check_latitude(report.latitude)?;
    check_longitude(report.longitude)?;
    Ok(())
}
