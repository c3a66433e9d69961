use std::sync::atomic::{AtomicUsize, Ordering};

/// Sentinel for a limit that is never enforced.
pub const UNLIMITED: usize = usize::MAX;

/// Runtime-adjustable resource limits, the moral equivalent of the stack's
/// sysctl knobs.
///
/// Limits may be tightened below the live population at any time; nothing is
/// evicted synchronously to satisfy the new cap. The sweeper brings the
/// population back under the limit on its next pass. Setting a limit to zero
/// suspends admission entirely: every arriving fragment is counted and
/// dropped, and no new queue is created.
#[derive(Debug)]
pub struct ReassemblyConfig {
    max_queues: AtomicUsize,
    max_fragments: AtomicUsize,
    max_fragments_per_queue: AtomicUsize,
}

impl ReassemblyConfig {
    pub const DEFAULT_MAX_QUEUES: usize = 64;
    pub const DEFAULT_MAX_FRAGMENTS: usize = 1024;
    /// A single datagram split absurdly fine is its own attack; cap the
    /// fragments one queue may hold.
    pub const DEFAULT_MAX_FRAGMENTS_PER_QUEUE: usize = 64;

    pub fn new(max_queues: usize, max_fragments: usize) -> Self {
        Self {
            max_queues: AtomicUsize::new(max_queues),
            max_fragments: AtomicUsize::new(max_fragments),
            max_fragments_per_queue: AtomicUsize::new(Self::DEFAULT_MAX_FRAGMENTS_PER_QUEUE),
        }
    }

    pub fn max_queues(&self) -> usize {
        self.max_queues.load(Ordering::Relaxed)
    }

    pub fn set_max_queues(&self, max_queues: usize) {
        self.max_queues.store(max_queues, Ordering::Relaxed);
    }

    pub fn max_fragments(&self) -> usize {
        self.max_fragments.load(Ordering::Relaxed)
    }

    pub fn set_max_fragments(&self, max_fragments: usize) {
        self.max_fragments.store(max_fragments, Ordering::Relaxed);
    }

    pub fn max_fragments_per_queue(&self) -> usize {
        self.max_fragments_per_queue.load(Ordering::Relaxed)
    }

    pub fn set_max_fragments_per_queue(&self, max: usize) {
        self.max_fragments_per_queue.store(max, Ordering::Relaxed);
    }
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_QUEUES, Self::DEFAULT_MAX_FRAGMENTS)
    }
}
