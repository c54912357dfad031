// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

/// Reasons a location report is refused before it touches any state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("payload must be a JSON object")]
    NotAnObject,
    #[error("missing device id (expected one of device_id, tid, topic)")]
    MissingDeviceId,
    #[error("missing {0}")]
    MissingCoordinate(&'static str),
    #[error("{field} is not a number: {value}")]
    NonNumericCoordinate { field: &'static str, value: String },
    #[error("{0} must be a finite number")]
    NonFinite(&'static str),
    #[error("latitude {0} out of range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} out of range [-180, 180]")]
    LongitudeOutOfRange(f64),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("invalid report: {0}")]
    Validation(#[from] ValidationError),
    /// The device has never reported.
    #[error("device not found: {0}")]
    NotFound(String),
    /// A record id that does not advance past the last committed one.
    #[error("record id {found} does not follow {last}")]
    OutOfOrder { last: u64, found: u64 },
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
