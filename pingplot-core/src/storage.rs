//! Sample storage shared by every host ring.
//!
//! One contiguous block of `host_count × capacity` atomic slots, addressed by
//! `host_index * capacity + slot`. The block is never resized: a membership
//! change builds a new one and the old history is dropped with it.

use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering::Relaxed;

use crate::models::Sample;

/// Largest ring a store accepts, in ticks.
pub const MAX_CAPACITY: usize = 1 << 20;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("ring capacity must be at least 1")]
    ZeroCapacity,
    #[error("{hosts} hosts x {capacity} slots is too large (capacity is capped at {max})", max = MAX_CAPACITY)]
    TooLarge { hosts: usize, capacity: usize },
    #[error("slot ({host_index}, {slot}) is outside a {hosts}x{capacity} block")]
    OutOfBounds {
        host_index: usize,
        slot: usize,
        hosts: usize,
        capacity: usize,
    },
}

#[derive(Debug)]
pub struct SampleStore {
    capacity: usize,
    hosts: usize,
    slots: Box<[AtomicI32]>,
}

impl SampleStore {
    /// Allocate a block with every slot set to `Pending`.
    pub fn new(hosts: usize, capacity: usize) -> Result<Self, StoreError> {
        if capacity == 0 {
            return Err(StoreError::ZeroCapacity);
        }
        let total = hosts
            .checked_mul(capacity)
            .filter(|_| capacity <= MAX_CAPACITY)
            .ok_or(StoreError::TooLarge { hosts, capacity })?;
        let slots = (0..total)
            .map(|_| AtomicI32::new(Sample::PENDING_RAW))
            .collect();
        Ok(Self {
            capacity,
            hosts,
            slots,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn host_count(&self) -> usize {
        self.hosts
    }

    /// Total number of slots (`host_count × capacity`).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn index(&self, host_index: usize, slot: usize) -> Result<usize, StoreError> {
        if host_index >= self.hosts || slot >= self.capacity {
            return Err(StoreError::OutOfBounds {
                host_index,
                slot,
                hosts: self.hosts,
                capacity: self.capacity,
            });
        }
        Ok(host_index * self.capacity + slot)
    }

    pub fn write(&self, host_index: usize, slot: usize, sample: Sample) -> Result<(), StoreError> {
        let index = self.index(host_index, slot)?;
        self.slots[index].store(sample.to_raw(), Relaxed);
        Ok(())
    }

    pub fn read(&self, host_index: usize, slot: usize) -> Result<Sample, StoreError> {
        let index = self.index(host_index, slot)?;
        Ok(Sample::from_raw(self.slots[index].load(Relaxed)))
    }

    /// Set `slot` back to `Pending` for every host.
    pub fn reset_slot(&self, slot: usize) -> Result<(), StoreError> {
        if slot >= self.capacity {
            return Err(StoreError::OutOfBounds {
                host_index: 0,
                slot,
                hosts: self.hosts,
                capacity: self.capacity,
            });
        }
        for host_index in 0..self.hosts {
            self.slots[host_index * self.capacity + slot].store(Sample::PENDING_RAW, Relaxed);
        }
        Ok(())
    }
}
