// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod index;
pub mod kernel;

pub use index::LatestIndex;
pub use kernel::TrackState;
