// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol counters for one participant
//!
//! Tracks what the behaviours emit (data, gaps, heartbeats, acknacks,
//! repairs) and what they refuse (stale heartbeats/acknacks, stale data).
//!
//! # Thread Safety
//!
//! All methods use atomic operations (Relaxed ordering) for lock-free
//! updates, so one instance is shared by every endpoint of a participant.
//!
//! # Example
//!
//! ```rust
//! use hdds_rtps::metrics::ReliableMetrics;
//!
//! let metrics = ReliableMetrics::new();
//! metrics.increment_heartbeats_sent(1);
//! metrics.record_missing(3);
//! let snap = metrics.snapshot();
//! assert_eq!(snap.heartbeats_sent, 1);
//! assert_eq!(snap.max_missing, 3);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared protocol counters.
#[derive(Debug, Default)]
pub struct ReliableMetrics {
    data_sent: AtomicU64,
    /// Data re-sent in answer to an AckNack.
    retransmit_sent: AtomicU64,
    gaps_sent: AtomicU64,
    gaps_received: AtomicU64,
    heartbeats_sent: AtomicU64,
    acknacks_sent: AtomicU64,
    /// Data accepted into a reader cache.
    data_received: AtomicU64,
    /// Old or duplicate data, replayed heartbeat/acknack counts.
    stale_events: AtomicU64,
    /// AckNacks ignored inside the nack suppression window.
    suppressed_acknacks: AtomicU64,
    /// High-water mark of missing changes announced in one AckNack.
    max_missing: AtomicU64,
}

/// Point-in-time copy of [`ReliableMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub data_sent: u64,
    pub retransmit_sent: u64,
    pub gaps_sent: u64,
    pub gaps_received: u64,
    pub heartbeats_sent: u64,
    pub acknacks_sent: u64,
    pub data_received: u64,
    pub stale_events: u64,
    pub suppressed_acknacks: u64,
    pub max_missing: u64,
}

impl ReliableMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_data_sent(&self, count: u64) {
        self.data_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retransmit_sent(&self, count: u64) {
        self.retransmit_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_gaps_sent(&self, count: u64) {
        self.gaps_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_gaps_received(&self, count: u64) {
        self.gaps_received.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_heartbeats_sent(&self, count: u64) {
        self.heartbeats_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_acknacks_sent(&self, count: u64) {
        self.acknacks_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_data_received(&self, count: u64) {
        self.data_received.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_stale(&self, count: u64) {
        self.stale_events.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_suppressed_acknacks(&self, count: u64) {
        self.suppressed_acknacks.fetch_add(count, Ordering::Relaxed);
    }

    /// Update the missing-set high-water mark.
    ///
    /// Uses compare-exchange loop to ensure we only update if new size is larger.
    pub fn record_missing(&self, missing: u64) {
        let mut current = self.max_missing.load(Ordering::Relaxed);
        while missing > current {
            match self.max_missing.compare_exchange_weak(
                current,
                missing,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            data_sent: self.data_sent.load(Ordering::Relaxed),
            retransmit_sent: self.retransmit_sent.load(Ordering::Relaxed),
            gaps_sent: self.gaps_sent.load(Ordering::Relaxed),
            gaps_received: self.gaps_received.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            acknacks_sent: self.acknacks_sent.load(Ordering::Relaxed),
            data_received: self.data_received.load(Ordering::Relaxed),
            stale_events: self.stale_events.load(Ordering::Relaxed),
            suppressed_acknacks: self.suppressed_acknacks.load(Ordering::Relaxed),
            max_missing: self.max_missing.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_new() {
        assert_eq!(ReliableMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_record_missing_keeps_max() {
        let m = ReliableMetrics::new();
        m.record_missing(3);
        m.record_missing(7);
        m.record_missing(2);
        assert_eq!(m.snapshot().max_missing, 7);
    }

    #[test]
    fn test_concurrent_increments() {
        let m = Arc::new(ReliableMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&m);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        m.increment_heartbeats_sent(1);
                        m.record_missing(5);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread panicked");
        }
        let snap = m.snapshot();
        assert_eq!(snap.heartbeats_sent, 4000);
        assert_eq!(snap.max_missing, 5);
    }
}
