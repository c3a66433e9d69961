use std::sync::atomic::{AtomicU64, Ordering};

/// Event counters for the reassembly subsystem. Drops are classified by the
/// policy that caused them; none of these conditions is an error for the
/// process, only for the datagram.
#[derive(Debug, Default)]
pub(super) struct ReassemblyStats {
    pub fragments_received: Counter,
    pub datagrams_reassembled: Counter,
    /// Jumbo payloads, misaligned lengths, first fragments without their
    /// upper-layer header
    pub dropped_malformed: Counter,
    /// Fragments that would push the reassembled datagram past 65535 bytes
    pub dropped_overflow: Counter,
    /// Queues poisoned by an overlapping fragment
    pub dropped_overlap: Counter,
    /// Exact duplicates, ignored without prejudice
    pub dropped_duplicate: Counter,
    /// Fragments whose ECN codepoint failed to merge
    pub dropped_ecn: Counter,
    /// Queues evicted by the timeout sweep
    pub dropped_timeout: Counter,
    /// Fragments or queues refused by resource admission
    pub dropped_resource: Counter,
}

impl ReassemblyStats {
    pub fn snapshot(&self, live_queues: usize, live_fragments: usize) -> StatsSnapshot {
        StatsSnapshot {
            fragments_received: self.fragments_received.get(),
            datagrams_reassembled: self.datagrams_reassembled.get(),
            dropped_malformed: self.dropped_malformed.get(),
            dropped_overflow: self.dropped_overflow.get(),
            dropped_overlap: self.dropped_overlap.get(),
            dropped_duplicate: self.dropped_duplicate.get(),
            dropped_ecn: self.dropped_ecn.get(),
            dropped_timeout: self.dropped_timeout.get(),
            dropped_resource: self.dropped_resource.get(),
            live_queues,
            live_fragments,
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct Counter(AtomicU64);

impl Counter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A point-in-time copy of the counters plus the live-population gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub fragments_received: u64,
    pub datagrams_reassembled: u64,
    pub dropped_malformed: u64,
    pub dropped_overflow: u64,
    pub dropped_overlap: u64,
    pub dropped_duplicate: u64,
    pub dropped_ecn: u64,
    pub dropped_timeout: u64,
    pub dropped_resource: u64,
    pub live_queues: usize,
    pub live_fragments: usize,
}
