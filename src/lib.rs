// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! busline-kernel: the synchronous core of the vehicle tracker.
//!
//! Holds the append-only log of location reports and the derived
//! latest-position index. No I/O and no locking happens here; the node crate
//! wraps [`state::TrackState`] with its concurrency and durability layers.

pub mod error;
pub mod types;
pub mod validate;
pub mod state;
pub mod verify;

pub use error::{KernelError, KernelResult, ValidationError};
pub use state::TrackState;
pub use types::id::{DeviceId, RecordId};
pub use types::report::{LocationReport, ReportDraft};

#[cfg(test)]
pub mod tests;
