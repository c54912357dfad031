// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use chrono::Utc;

use crate::state::kernel::TrackState;
use crate::types::report::ReportDraft;
use crate::verify::{digest_hex, state_digest};

#[test]
fn test_digest_matches_after_replay() {
    let mut original = TrackState::new();
    let now = Utc::now();
    for i in 0..10 {
        original
            .append(ReportDraft::new(format!("bus{}", i % 2), i as f64, -(i as f64)), now)
            .unwrap();
    }

    let mut replayed = TrackState::new();
    for record in original.records() {
        replayed.apply((**record).clone()).unwrap();
    }

    assert_eq!(state_digest(&original), state_digest(&replayed));
}

#[test]
fn test_digest_changes_with_content() {
    let now = Utc::now();
    let mut a = TrackState::new();
    let mut b = TrackState::new();
    a.append(ReportDraft::new("bus01", 1.0, 1.0), now).unwrap();
    b.append(ReportDraft::new("bus01", 1.0, 1.5), now).unwrap();

    assert_ne!(state_digest(&a), state_digest(&b));
    assert_ne!(state_digest(&a), state_digest(&TrackState::new()));
    assert_eq!(digest_hex(&state_digest(&a)).len(), 64);
}

#[test]
fn test_digest_covers_optional_fields() {
    let now = Utc::now();
    let digest_of = |draft: ReportDraft| {
        let mut state = TrackState::new();
        state.append(draft, now).unwrap();
        state_digest(&state)
    };

    let plain = digest_of(ReportDraft::new("bus01", 17.0, 78.0));

    let mut with_accuracy = ReportDraft::new("bus01", 17.0, 78.0);
    with_accuracy.accuracy = Some(12.5);
    let mut with_provider = ReportDraft::new("bus01", 17.0, 78.0);
    with_provider.provider = Some("gps".to_string());
    let mut with_raw = ReportDraft::new("bus01", 17.0, 78.0);
    with_raw.raw_fields.insert("batt".to_string(), serde_json::json!(87));
    let mut other_raw = ReportDraft::new("bus01", 17.0, 78.0);
    other_raw.raw_fields.insert("batt".to_string(), serde_json::json!(86));

    let digests = [
        plain,
        digest_of(with_accuracy),
        digest_of(with_provider),
        digest_of(with_raw.clone()),
        digest_of(other_raw),
    ];
    for (i, a) in digests.iter().enumerate() {
        for b in &digests[i + 1..] {
            assert_ne!(a, b);
        }
    }
    assert_eq!(digest_of(with_raw.clone()), digest_of(with_raw));
}
