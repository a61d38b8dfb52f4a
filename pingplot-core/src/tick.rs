//! The shared tick cursor.
//!
//! The scheduler is the only writer; everything else holds a [`TickReader`].
//! The counter keeps the absolute tick number so it stays monotonic across
//! scheduler restarts, and readers derive the ring slot from it.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::{Acquire, Release};
use std::sync::Arc;

/// Read side of the tick cursor.
#[derive(Debug, Clone)]
pub struct TickReader {
    absolute: Arc<AtomicU64>,
    capacity: usize,
}

impl TickReader {
    /// Ring slot written by the newest tick.
    pub fn current(&self) -> usize {
        (self.absolute() % self.capacity as u64) as usize
    }

    /// Number of ticks published since the cursor was created.
    pub fn absolute(&self) -> u64 {
        self.absolute.load(Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Write side of the tick cursor, owned by the scheduler.
#[derive(Debug)]
pub(crate) struct TickPublisher {
    absolute: Arc<AtomicU64>,
    capacity: usize,
}

impl TickPublisher {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            absolute: Arc::new(AtomicU64::new(0)),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn reader(&self) -> TickReader {
        TickReader {
            absolute: self.absolute.clone(),
            capacity: self.capacity,
        }
    }

    pub(crate) fn absolute(&self) -> u64 {
        self.absolute.load(Acquire)
    }

    /// Publish `absolute` as the newest tick. Going backwards is ignored.
    pub(crate) fn publish(&self, absolute: u64) {
        self.absolute.fetch_max(absolute, Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_follows_publisher() {
        let publisher = TickPublisher::new(4);
        let reader = publisher.reader();
        assert_eq!(reader.current(), 0);

        publisher.publish(1);
        assert_eq!(reader.current(), 1);
        publisher.publish(6);
        assert_eq!(reader.current(), 2);
        assert_eq!(reader.absolute(), 6);
    }

    #[test]
    fn test_publish_never_moves_backwards() {
        let publisher = TickPublisher::new(10);
        let reader = publisher.reader();
        publisher.publish(7);
        publisher.publish(3);
        assert_eq!(reader.absolute(), 7);
    }
}
