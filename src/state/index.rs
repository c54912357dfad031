// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Latest-position index.

use rustc_hash::FxHashMap;

use crate::types::id::DeviceId;

/// Maps each device to the log position of its most recently received report.
///
/// Devices are also kept in first-seen order so `iter` is stable between
/// calls; nothing outside this crate should rely on that order.
#[derive(Clone, Debug, Default)]
pub struct LatestIndex {
    positions: FxHashMap<DeviceId, usize>,
    order: Vec<DeviceId>,
}

impl LatestIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, device_id: &str) -> Option<usize> {
        self.positions.get(device_id).copied()
    }

    /// Points `device_id` at `position`, registering the device if unseen.
    pub fn update(&mut self, device_id: &DeviceId, position: usize) {
        match self.positions.get_mut(device_id.as_str()) {
            Some(slot) => *slot = position,
            None => {
                self.positions.insert(device_id.clone(), position);
                self.order.push(device_id.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(device, log position)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, usize)> + '_ {
        self.order
            .iter()
            .filter_map(move |d| self.positions.get(d.as_str()).map(|p| (d, *p)))
    }
}
