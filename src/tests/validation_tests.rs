// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use chrono::Utc;

use crate::error::ValidationError;
use crate::types::id::{DeviceId, RecordId};
use crate::types::report::ReportDraft;
use crate::validate::{check_latitude, check_longitude, validate_draft};

#[test]
fn test_coordinate_bounds() {
    assert!(check_latitude(90.0).is_ok());
    assert!(check_latitude(-90.0).is_ok());
    assert_eq!(check_latitude(90.0001), Err(ValidationError::LatitudeOutOfRange(90.0001)));
    assert!(check_longitude(180.0).is_ok());
    assert!(check_longitude(-180.0).is_ok());
    assert_eq!(check_longitude(-181.0), Err(ValidationError::LongitudeOutOfRange(-181.0)));
}

#[test]
fn test_non_finite_coordinates() {
    assert_eq!(check_latitude(f64::NAN), Err(ValidationError::NonFinite("latitude")));
    assert_eq!(check_longitude(f64::INFINITY), Err(ValidationError::NonFinite("longitude")));
}

#[test]
fn test_device_id_trimmed() {
    assert_eq!(DeviceId::new("  bus01 ").unwrap().as_str(), "bus01");
    assert_eq!(DeviceId::new(""), Err(ValidationError::MissingDeviceId));
    assert_eq!(DeviceId::new("\t"), Err(ValidationError::MissingDeviceId));
}

#[test]
fn test_device_id_serde_rejects_empty() {
    let ok: DeviceId = serde_json::from_str("\"bus01\"").unwrap();
    assert_eq!(ok.as_str(), "bus01");
    assert!(serde_json::from_str::<DeviceId>("\"\"").is_err());
}

#[test]
fn test_validate_draft_carries_optional_fields() {
    let mut draft = ReportDraft::new("bus01", 17.66, 75.90).with_timestamp(1763652003);
    draft.accuracy = Some(f64::NAN);
    draft.provider = Some(String::new());

    let report = validate_draft(draft, RecordId(7), Utc::now()).unwrap();
    assert_eq!(report.id, RecordId(7));
    assert_eq!(report.timestamp, Some(1763652003));
    assert_eq!(report.accuracy, None);
    assert_eq!(report.provider, None);
}
