//! Read-only views over the sample rings.
//!
//! A reader pins the registry layout for the duration of one call, so a
//! concurrent add/remove never mixes two storage blocks into one result.

use serde::Serialize;
use std::sync::Arc;

use crate::models::{Host, Sample};
use crate::registry::{HostRegistry, Layout, RegistryError};
use crate::storage::StoreError;
use crate::tick::TickReader;

/// Direction of a returned window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostSeries {
    pub host: Host,
    pub samples: Vec<Sample>,
}

#[derive(Clone)]
pub struct SeriesReader {
    registry: Arc<HostRegistry>,
    ticks: TickReader,
}

impl SeriesReader {
    pub fn new(registry: Arc<HostRegistry>, ticks: TickReader) -> Self {
        Self { registry, ticks }
    }

    /// Slot of the newest published tick.
    pub fn current_tick(&self) -> usize {
        self.ticks.current()
    }

    /// Up to `count` samples for `address`, walking backward from slot `from`
    /// (inclusive, default the current tick). `count` defaults to, and is
    /// capped at, the ring capacity.
    pub fn read(
        &self,
        address: &str,
        count: Option<usize>,
        from: Option<usize>,
        order: Order,
    ) -> Result<Vec<Sample>, RegistryError> {
        let layout = self.registry.layout();
        let address = address.trim();
        let index = layout
            .index_of(address)
            .ok_or_else(|| RegistryError::HostNotFound(address.to_string()))?;
        Ok(self.window(&layout, index, count, from, order)?)
    }

    /// One series per host, in registry order, all taken from the same layout.
    pub fn read_all(&self, count: Option<usize>, from: Option<usize>, order: Order) -> Result<Vec<HostSeries>, RegistryError> {
        let layout = self.registry.layout();
        let mut series = Vec::with_capacity(layout.hosts().len());
        for (index, host) in layout.hosts().iter().enumerate() {
            series.push(HostSeries {
                host: host.clone(),
                samples: self.window(&layout, index, count, from, order)?,
            });
        }
        Ok(series)
    }

    /// Sample of the newest completed tick, one slot behind the cursor.
    pub fn latest(&self, address: &str) -> Result<Sample, RegistryError> {
        let capacity = self.registry.capacity();
        let from = (self.ticks.current() + capacity - 1) % capacity;
        let samples = self.read(address, Some(1), Some(from), Order::NewestFirst)?;
        Ok(samples.into_iter().next().unwrap_or_default())
    }

    fn window(
        &self,
        layout: &Layout,
        index: usize,
        count: Option<usize>,
        from: Option<usize>,
        order: Order,
    ) -> Result<Vec<Sample>, StoreError> {
        let store = layout.store();
        let capacity = store.capacity();
        let count = count.unwrap_or(capacity).min(capacity);
        let from = from.unwrap_or_else(|| self.ticks.current()) % capacity;

        let mut samples = (0..count)
            .map(|step| store.read(index, (from + capacity - step) % capacity))
            .collect::<Result<Vec<_>, _>>()?;
        if order == Order::OldestFirst {
            samples.reverse();
        }
        Ok(samples)
    }
}
