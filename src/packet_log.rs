//! Bounded history of raw notifications for diagnostics.
//!
//! Owned by whoever drives the transport; the parser never writes to it.
//! Raw bytes are kept (not parsed [`Packet`](crate::Packet)s) so rejected
//! notifications show up too.

use std::collections::VecDeque;
use std::fmt::Write as _;

use crate::codec;

/// Default number of notifications kept.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LogEntry {
    pub timestamp_ms: u64,
    pub bytes: Vec<u8>,
}

/// Ring buffer of the most recent notifications. Oldest entries are evicted
/// once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct PacketLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    dropped: u64,
}

impl Default for PacketLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PacketLog {
    /// A zero capacity keeps nothing and counts every push as dropped.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, timestamp_ms: u64, bytes: &[u8]) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(LogEntry {
            timestamp_ms,
            bytes: bytes.to_vec(),
        });
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries evicted (or refused) since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// One line per entry: `"@1234ms B0 12 34"`.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for e in &self.entries {
            let _ = writeln!(out, "@{}ms {}", e.timestamp_ms, codec::hex_dump(&e.bytes));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest() {
        let mut log = PacketLog::new(2);
        log.push(1, &[0xB0, 0x01]);
        log.push(2, &[0xB1, 0x02]);
        log.push(3, &[0xB2, 0x03]);
        assert_eq!(log.len(), 2);
        assert_eq!(log.dropped(), 1);
        let ts: Vec<u64> = log.iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(ts, vec![2, 3]);
        assert_eq!(log.dump(), "@2ms B1 02\n@3ms B2 03\n");
    }

    #[test]
    fn large_capacity_grows_on_demand() {
        let mut log = PacketLog::new(usize::MAX);
        log.push(1, &[0xB0, 0x01]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.capacity(), usize::MAX);
        assert_eq!(log.dropped(), 0);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut log = PacketLog::new(0);
        log.push(1, &[0xB0, 0x01]);
        assert!(log.is_empty());
        assert_eq!(log.dropped(), 1);
    }

    #[test]
    fn clear_keeps_drop_count() {
        let mut log = PacketLog::new(1);
        log.push(1, &[0xB0]);
        log.push(2, &[0xB1]);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.dropped(), 1);
        assert_eq!(log.dump(), "");
    }
}
