//! Implements the fragment reassembly procedure from RFC 8200, section 4.5,
//! hardened per RFC 8900: overlapping fragments poison the whole datagram,
//! admission counters bound the queues and fragments held live, and a timer
//! sweep evicts whatever never completes.
//!
//! All reassembly state hangs off a [`Reassembly`] context owned by the
//! embedding stack. One mutex serializes every mutation; the only work done
//! under it is bounded bookkeeping. Error notifications raised while the
//! lock is held are collected into a local list and dispatched to the
//! [`IcmpSink`] collaborator strictly after release, since the ICMP layer
//! may reenter the stack.

use crate::protocols::ipv6::icmpv6::{IcmpError, IcmpSink};
use crate::protocols::ipv6::ipv6_parsing::{FIXED_HEADER_OCTETS, MAX_PAYLOAD};
use crate::protocols::ipv6::{next_header, FragmentHeader, Ipv6Header, ScopeId};
use crate::shutdown::Shutdown;
use crate::Message;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

mod config;
pub use config::{ReassemblyConfig, UNLIMITED};

mod fragment;
use fragment::FragmentRecord;

mod queue;
use queue::{InsertOutcome, ReassemblyQueue};

mod queue_key;
pub use queue_key::FragmentKey;

mod stats;
use stats::ReassemblyStats;
pub use stats::StatsSnapshot;

mod test_fragment_builder;

/// How often the sweeper runs while queues are live.
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// Sweep ticks a queue lives before eviction. 120 ticks at the 500 ms sweep
/// interval is the RFC 8200 60 second reassembly deadline.
pub const TTL_TICKS: u8 = 120;

/// Parameter-problem pointer to the fixed header's payload length field.
const PAYLOAD_LENGTH_FIELD: u32 = 4;

/// Parameter-problem pointer used when a first fragment omits its upper
/// layer header, following the stack convention for RFC 7112 violations.
const INCOMPLETE_HEADER_CHAIN: u32 = 0;

/// A validated fragment handed in by the receive path. The caller has parsed
/// the fixed header and walked the extension chain up to the Fragment
/// header; `payload` owns the fragmentable bytes that follow it.
#[derive(Debug, Clone)]
pub struct InboundFragment {
    /// The packet's fixed header
    pub header: Ipv6Header,
    /// The Fragment extension header
    pub fragment: FragmentHeader,
    /// Zone of the source address
    pub src_scope: ScopeId,
    /// Zone of the destination address
    pub dst_scope: ScopeId,
    /// Bytes of extension headers between the fixed header and the Fragment
    /// header
    pub unfragmentable_len: u16,
    /// Hardware-offload partial checksum over `payload`, when available
    pub partial_checksum: Option<u32>,
    /// The fragment's payload bytes, exclusively owned
    pub payload: Message,
}

impl InboundFragment {
    fn key(&self) -> FragmentKey {
        FragmentKey {
            src: self.header.source,
            src_scope: self.src_scope,
            dst: self.header.destination,
            dst_scope: self.dst_scope,
            identification: self.fragment.identification,
        }
    }
}

/// What became of an inbound fragment.
#[derive(Debug)]
pub enum ReceiveResult {
    /// Consumed: queued, or dropped by policy. The statistics tell which.
    Consumed,
    /// The fragment completed its datagram.
    Delivered(Assembled),
    /// The fragment was malformed. The caller must synthesize the given
    /// ICMP error for it.
    Rejected(IcmpError),
}

/// A reassembled datagram ready for the upstream protocol dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    /// The fixed header with the Fragment header's next-header value
    /// spliced in, the payload length corrected, and the merged ECN marking
    /// written back
    pub header: Ipv6Header,
    /// The reassembled payload, concatenated without copying
    pub payload: Message,
    /// Folded partial checksum, present when every fragment carried one
    pub checksum: Option<u16>,
}

#[derive(Debug, Default)]
struct Directory {
    queues: FxHashMap<FragmentKey, ReassemblyQueue>,
    /// Live fragment records across every queue
    fragment_count: usize,
}

/// The reassembly engine. One per stack; construct at stack init, call
/// [`receive`](Self::receive) for every arriving fragment, drive
/// [`sweep`](Self::sweep) from a timer or let [`start`](Self::start) spawn
/// the sweeper task, and [`drain`](Self::drain) at shutdown.
pub struct Reassembly {
    directory: Mutex<Directory>,
    config: ReassemblyConfig,
    stats: ReassemblyStats,
    /// Rearms the parked sweeper when the directory goes from empty to
    /// occupied
    wake: Notify,
    icmp: Option<Arc<dyn IcmpSink>>,
}

impl Reassembly {
    /// Creates an engine that discards deferred error notifications.
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            directory: Default::default(),
            config,
            stats: Default::default(),
            wake: Notify::new(),
            icmp: None,
        }
    }

    /// Creates an engine that reports deferred errors to the given ICMP
    /// collaborator.
    pub fn with_icmp(config: ReassemblyConfig, icmp: Arc<dyn IcmpSink>) -> Self {
        Self {
            icmp: Some(icmp),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &ReassemblyConfig {
        &self.config
    }

    /// Copies out the counters and live-population gauges.
    pub fn stats(&self) -> StatsSnapshot {
        let directory = self.lock();
        self.stats
            .snapshot(directory.queues.len(), directory.fragment_count)
    }

    /// Processes one arriving fragment.
    pub fn receive(&self, inbound: InboundFragment) -> ReceiveResult {
        self.stats.fragments_received.increment();

        // A zero payload length means a Jumbo Payload option, which cannot
        // legally coexist with a Fragment header. Reject before touching any
        // state.
        if inbound.header.payload_length == 0 {
            self.stats.dropped_malformed.increment();
            return ReceiveResult::Rejected(IcmpError::ParameterProblem {
                pointer: PAYLOAD_LENGTH_FIELD,
            });
        }
        // Every fragment except the final one must carry a multiple of
        // eight bytes
        if inbound.fragment.more_fragments && inbound.payload.len() % 8 != 0 {
            self.stats.dropped_malformed.increment();
            return ReceiveResult::Rejected(IcmpError::ParameterProblem {
                pointer: PAYLOAD_LENGTH_FIELD,
            });
        }
        // No legal packet's payload exceeds what its length field can say
        if inbound.payload.len() > MAX_PAYLOAD as usize {
            self.stats.dropped_malformed.increment();
            return ReceiveResult::Rejected(IcmpError::ParameterProblem {
                pointer: PAYLOAD_LENGTH_FIELD,
            });
        }

        let mut directory = self.lock();
        let (result, arm_sweeper) = self.receive_locked(&mut directory, inbound);
        drop(directory);
        if arm_sweeper {
            self.wake.notify_one();
        }
        result
    }

    fn receive_locked(
        &self,
        directory: &mut Directory,
        inbound: InboundFragment,
    ) -> (ReceiveResult, bool) {
        // Admission happens before lookup, so a suspended engine
        // (max_fragments of zero) never creates state at all
        if directory.fragment_count >= self.config.max_fragments() {
            self.stats.dropped_resource.increment();
            tracing::trace!("fragment refused, fragment limit reached");
            return (ReceiveResult::Consumed, false);
        }

        let key = inbound.key();
        let offset = inbound.fragment.offset_bytes();
        let live_queues = directory.queues.len();
        let mut created = false;
        let queue = match directory.queues.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                if live_queues >= self.config.max_queues() {
                    self.stats.dropped_resource.increment();
                    tracing::trace!("fragment refused, queue limit reached");
                    return (ReceiveResult::Consumed, false);
                }
                created = true;
                entry.insert(ReassemblyQueue::new(TTL_TICKS, inbound.header.ecn()))
            }
        };
        let arm_sweeper = created && live_queues == 0;

        // A poisoned queue only holds its key until the sweeper reaps it
        if queue.is_dirty() {
            self.stats.dropped_overlap.increment();
            tracing::trace!(?key, "fragment dropped into dirty queue");
            return (ReceiveResult::Consumed, arm_sweeper);
        }

        if offset == 0 {
            // RFC 8200: the first fragment must carry the whole header
            // chain through the upper-layer header. The caller consumed the
            // extension headers, so judge by whether the payload can hold
            // the upper-layer header at all. Violations void the entire
            // datagram, queued state included.
            if queue.unfragmentable_len().is_none()
                && inbound.fragment.more_fragments
                && (inbound.payload.len() as u32)
                    < upper_layer_min_len(inbound.fragment.next_header)
            {
                self.stats.dropped_malformed.increment();
                tracing::debug!(?key, "first fragment omits its upper-layer header");
                let released = queue.purge();
                directory.fragment_count -= released;
                directory.queues.remove(&key);
                return (
                    ReceiveResult::Rejected(IcmpError::ParameterProblem {
                        pointer: INCOMPLETE_HEADER_CHAIN,
                    }),
                    false,
                );
            }
            queue.record_first_fragment(
                inbound.unfragmentable_len,
                inbound.fragment.next_header,
                inbound.header,
            );
            // Fragments accepted before the unfragmentable length was known
            // may turn out to be too large now
            let purged = queue.purge_oversize();
            if purged > 0 {
                directory.fragment_count -= purged;
                self.stats.dropped_overflow.add(purged as u64);
                tracing::debug!(?key, purged, "dropped oversize fragments on late first fragment");
            }
        }

        let record = FragmentRecord::new(offset, inbound.fragment.more_fragments, inbound.payload);

        if queue.would_overflow(&record) {
            self.stats.dropped_overflow.increment();
            let pointer = FIXED_HEADER_OCTETS as u32
                + queue.unfragmentable_len().unwrap_or(0) as u32
                + 2;
            return (
                ReceiveResult::Rejected(IcmpError::ParameterProblem { pointer }),
                arm_sweeper,
            );
        }

        if !queue.merge_ecn(inbound.header.ecn()) {
            self.stats.dropped_ecn.increment();
            tracing::trace!(?key, "fragment dropped, incompatible ECN marking");
            return (ReceiveResult::Consumed, arm_sweeper);
        }

        match queue.insert(record, inbound.partial_checksum) {
            InsertOutcome::Duplicate => {
                self.stats.dropped_duplicate.increment();
                (ReceiveResult::Consumed, arm_sweeper)
            }
            InsertOutcome::Overlap => {
                // The hard invariant: an overlapping fragment voids the
                // whole queue, not just itself. The key stays occupied and
                // dirty until TTL expiry so the sender cannot immediately
                // rebuild state under the same identification.
                self.stats.dropped_overlap.increment();
                tracing::debug!(?key, offset, "overlapping fragment, purging queue");
                let released = queue.purge();
                directory.fragment_count -= released;
                (ReceiveResult::Consumed, arm_sweeper)
            }
            InsertOutcome::Inserted => {
                directory.fragment_count += 1;
                if queue.fragment_count() > self.config.max_fragments_per_queue() {
                    self.stats.dropped_resource.increment();
                    tracing::debug!(?key, "queue exceeded per-datagram fragment cap");
                    let released = queue.fragment_count();
                    directory.queues.remove(&key);
                    directory.fragment_count -= released;
                    return (ReceiveResult::Consumed, false);
                }
                if queue.is_complete() {
                    let released = queue.fragment_count();
                    directory.fragment_count -= released;
                    let Some(queue) = directory.queues.remove(&key) else {
                        return (ReceiveResult::Consumed, false);
                    };
                    match queue.assemble() {
                        Some(assembled) => {
                            self.stats.datagrams_reassembled.increment();
                            tracing::trace!(
                                ?key,
                                payload_length = assembled.header.payload_length,
                                "datagram reassembled",
                            );
                            (ReceiveResult::Delivered(assembled), false)
                        }
                        None => {
                            tracing::error!(?key, "complete queue failed to assemble");
                            (ReceiveResult::Consumed, false)
                        }
                    }
                } else {
                    (ReceiveResult::Consumed, arm_sweeper)
                }
            }
        }
    }

    /// Ages every queue by one tick and evicts the expired, then enforces
    /// the (possibly just tightened) admission limits by evicting the
    /// queues closest to expiry. Deferred time-exceeded notifications go
    /// out after the lock is dropped.
    pub fn sweep(&self) {
        let mut deferred = Vec::new();
        {
            let mut guard = self.lock();
            let directory = &mut *guard;

            let expired: Vec<FragmentKey> = directory
                .queues
                .iter_mut()
                .filter_map(|(key, queue)| queue.tick().then(|| *key))
                .collect();
            for key in expired {
                Self::evict(directory, &key, &mut deferred);
                self.stats.dropped_timeout.increment();
            }

            while directory.queues.len() > self.config.max_queues()
                || directory.fragment_count > self.config.max_fragments()
            {
                let oldest = directory
                    .queues
                    .iter()
                    .min_by_key(|(_, queue)| queue.ttl())
                    .map(|(key, _)| *key);
                let Some(key) = oldest else {
                    break;
                };
                Self::evict(directory, &key, &mut deferred);
                self.stats.dropped_resource.increment();
            }
        }

        if let Some(icmp) = &self.icmp {
            for (header, fragment) in deferred {
                icmp.icmp_error(IcmpError::TimeExceeded, header, fragment);
            }
        }
    }

    /// Evicts every queue without notification. For stack shutdown.
    pub fn drain(&self) {
        let mut directory = self.lock();
        let released = directory.queues.len();
        directory.queues.clear();
        directory.fragment_count = 0;
        if released > 0 {
            tracing::debug!(queues = released, "drained reassembly directory");
        }
    }

    /// Spawns the sweeper task. It runs a sweep every [`SWEEP_INTERVAL`]
    /// while queues are live, parks itself when the directory is empty, and
    /// is rearmed by the next admitted queue. Shutdown drains the directory.
    pub fn start(self: &Arc<Self>, shutdown: Shutdown) -> JoinHandle<()> {
        let reassembly = Arc::clone(self);
        let mut listener = shutdown.listen();
        tokio::spawn(async move {
            loop {
                if reassembly.lock().queues.is_empty() {
                    tokio::select! {
                        _ = reassembly.wake.notified() => {}
                        _ = listener.wait() => break,
                    }
                }
                tokio::select! {
                    _ = tokio::time::sleep(SWEEP_INTERVAL) => reassembly.sweep(),
                    _ = listener.wait() => break,
                }
            }
            reassembly.drain();
        })
    }

    fn evict(
        directory: &mut Directory,
        key: &FragmentKey,
        deferred: &mut Vec<(Ipv6Header, Message)>,
    ) {
        if let Some(queue) = directory.queues.remove(key) {
            directory.fragment_count -= queue.fragment_count();
            // A queue poisoned by overlap expires in silence
            if !queue.is_dirty() {
                if let Some(context) = queue.timeout_context() {
                    deferred.push(context);
                }
            }
            tracing::debug!(?key, "evicted reassembly queue");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Directory> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The smallest header the given protocol could begin with. Used to decide
/// whether a first fragment can possibly contain its upper-layer header;
/// unknown protocols are given the benefit of the doubt.
fn upper_layer_min_len(protocol: u8) -> u32 {
    match protocol {
        next_header::TCP => 20,
        next_header::UDP | next_header::ICMPV6 => 8,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::test_fragment_builder::TestFragmentBuilder;
    use super::*;
    use crate::protocols::ipv6::Ecn;
    use std::sync::Mutex;

    /// Records every deferred notification for inspection.
    #[derive(Default)]
    struct CollectingSink {
        errors: Mutex<Vec<(IcmpError, Ipv6Header, Message)>>,
    }

    impl IcmpSink for CollectingSink {
        fn icmp_error(&self, error: IcmpError, header: Ipv6Header, fragment: Message) {
            self.errors.lock().unwrap().push((error, header, fragment));
        }
    }

    fn engine() -> Reassembly {
        Reassembly::new(ReassemblyConfig::default())
    }

    fn assert_consumed(result: ReceiveResult) {
        assert!(matches!(result, ReceiveResult::Consumed));
    }

    #[test]
    fn reassembles_out_of_order() {
        let engine = engine();
        let pieces: Vec<InboundFragment> = vec![
            TestFragmentBuilder::new(7)
                .offset(0)
                .more_fragments()
                .payload(vec![1; 1200])
                .build(),
            TestFragmentBuilder::new(7)
                .offset(1200)
                .more_fragments()
                .payload(vec![2; 1200])
                .build(),
            TestFragmentBuilder::new(7).offset(2400).payload(vec![3; 600]).build(),
        ];

        assert_consumed(engine.receive(pieces[2].clone()));
        assert_consumed(engine.receive(pieces[0].clone()));
        let assembled = match engine.receive(pieces[1].clone()) {
            ReceiveResult::Delivered(assembled) => assembled,
            other => panic!("expected delivery, got {other:?}"),
        };

        assert_eq!(assembled.payload.len(), 3000);
        assert_eq!(assembled.header.next_header, next_header::UDP);
        assert_eq!(assembled.header.payload_length, 3000);
        let bytes = assembled.payload.to_vec();
        assert!(bytes[..1200].iter().all(|b| *b == 1));
        assert!(bytes[1200..2400].iter().all(|b| *b == 2));
        assert!(bytes[2400..].iter().all(|b| *b == 3));

        let stats = engine.stats();
        assert_eq!(stats.datagrams_reassembled, 1);
        assert_eq!(stats.live_queues, 0);
        assert_eq!(stats.live_fragments, 0);
    }

    #[test]
    fn jumbo_payload_is_rejected_before_lookup() {
        let engine = engine();
        let inbound = TestFragmentBuilder::new(1)
            .offset(0)
            .more_fragments()
            .payload(vec![0; 8])
            .jumbo()
            .build();
        match engine.receive(inbound) {
            ReceiveResult::Rejected(IcmpError::ParameterProblem { pointer }) => {
                assert_eq!(pointer, 4)
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(engine.stats().live_queues, 0);
        assert_eq!(engine.stats().dropped_malformed, 1);
    }

    #[test]
    fn misaligned_fragment_is_rejected() {
        let engine = engine();
        let inbound = TestFragmentBuilder::new(1)
            .offset(0)
            .more_fragments()
            .payload(vec![0; 21])
            .build();
        match engine.receive(inbound) {
            ReceiveResult::Rejected(IcmpError::ParameterProblem { pointer }) => {
                assert_eq!(pointer, 4)
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(engine.stats().live_queues, 0);
    }

    #[test]
    fn overlap_poisons_queue_until_expiry() {
        let engine = engine();
        assert_consumed(engine.receive(
            TestFragmentBuilder::new(9).offset(0).more_fragments().payload(vec![0; 96]).build(),
        ));
        assert_consumed(engine.receive(
            TestFragmentBuilder::new(9).offset(48).more_fragments().payload(vec![0; 96]).build(),
        ));

        let stats = engine.stats();
        assert_eq!(stats.dropped_overlap, 1);
        assert_eq!(stats.live_fragments, 0);
        // key stays occupied and refuses further fragments
        assert_eq!(stats.live_queues, 1);
        assert_consumed(engine.receive(
            TestFragmentBuilder::new(9).offset(96).payload(vec![0; 8]).build(),
        ));
        assert_eq!(engine.stats().dropped_overlap, 2);
        assert_eq!(engine.stats().live_fragments, 0);
        assert_eq!(engine.stats().datagrams_reassembled, 0);
    }

    #[test]
    fn duplicate_is_idempotent() {
        let engine = engine();
        let first = TestFragmentBuilder::new(3)
            .offset(0)
            .more_fragments()
            .payload(vec![5; 16])
            .build();
        assert_consumed(engine.receive(first.clone()));
        assert_consumed(engine.receive(first));
        assert_eq!(engine.stats().dropped_duplicate, 1);
        assert_eq!(engine.stats().live_fragments, 1);

        match engine.receive(
            TestFragmentBuilder::new(3).offset(16).payload(vec![6; 8]).build(),
        ) {
            ReceiveResult::Delivered(assembled) => assert_eq!(assembled.payload.len(), 24),
            other => panic!("expected delivery, got {other:?}"),
        }
    }

    #[test]
    fn suspended_admission_creates_no_state() {
        let engine = Reassembly::new(ReassemblyConfig::new(ReassemblyConfig::DEFAULT_MAX_QUEUES, 0));
        for offset in [0u16, 8, 16] {
            assert_consumed(engine.receive(
                TestFragmentBuilder::new(4)
                    .offset(offset)
                    .more_fragments()
                    .payload(vec![0; 8])
                    .build(),
            ));
        }
        let stats = engine.stats();
        assert_eq!(stats.live_queues, 0);
        assert_eq!(stats.live_fragments, 0);
        assert_eq!(stats.dropped_resource, 3);
    }

    #[test]
    fn queue_limit_is_enforced_at_creation() {
        let engine = Reassembly::new(ReassemblyConfig::new(2, UNLIMITED));
        for identification in 0..4u32 {
            engine.receive(
                TestFragmentBuilder::new(identification)
                    .offset(0)
                    .more_fragments()
                    .payload(vec![0; 8])
                    .build(),
            );
        }
        let stats = engine.stats();
        assert_eq!(stats.live_queues, 2);
        assert_eq!(stats.dropped_resource, 2);
    }

    #[test]
    fn per_queue_fragment_cap_evicts_queue() {
        let engine = engine();
        engine.config().set_max_fragments_per_queue(4);
        for i in 0..5u16 {
            engine.receive(
                TestFragmentBuilder::new(11)
                    .offset(i * 8)
                    .more_fragments()
                    .payload(vec![0; 8])
                    .build(),
            );
        }
        let stats = engine.stats();
        assert_eq!(stats.live_queues, 0);
        assert_eq!(stats.live_fragments, 0);
        assert_eq!(stats.dropped_resource, 1);
    }

    #[test]
    fn oversize_fragment_is_rejected_with_pointer() {
        let engine = engine();
        assert_consumed(engine.receive(
            TestFragmentBuilder::new(12)
                .offset(0)
                .more_fragments()
                .unfragmentable_len(16)
                .payload(vec![0; 8])
                .build(),
        ));
        // 16 + 65528 + 8 > 65535
        let inbound = TestFragmentBuilder::new(12).offset(65528).payload(vec![0; 8]).build();
        match engine.receive(inbound) {
            ReceiveResult::Rejected(IcmpError::ParameterProblem { pointer }) => {
                assert_eq!(pointer, 40 + 16 + 2)
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(engine.stats().dropped_overflow, 1);
    }

    #[test]
    fn late_first_fragment_purges_oversize_silently() {
        let engine = engine();
        assert_consumed(engine.receive(
            TestFragmentBuilder::new(13).offset(65528).payload(vec![0; 8]).build(),
        ));
        assert_eq!(engine.stats().live_fragments, 1);
        // the first fragment reveals a 16-byte unfragmentable part, making
        // the queued fragment oversize
        assert_consumed(engine.receive(
            TestFragmentBuilder::new(13)
                .offset(0)
                .more_fragments()
                .unfragmentable_len(16)
                .payload(vec![0; 8])
                .build(),
        ));
        let stats = engine.stats();
        assert_eq!(stats.dropped_overflow, 1);
        assert_eq!(stats.live_fragments, 1);
    }

    #[test]
    fn first_fragment_must_contain_upper_layer_header() {
        let engine = engine();
        // an unrelated fragment of the same datagram is queued first
        assert_consumed(engine.receive(
            TestFragmentBuilder::new(14).offset(64).more_fragments().payload(vec![0; 8]).build(),
        ));
        // a 16-byte first fragment cannot hold a TCP header
        let inbound = TestFragmentBuilder::new(14)
            .offset(0)
            .more_fragments()
            .next_header(next_header::TCP)
            .payload(vec![0; 16])
            .build();
        match engine.receive(inbound) {
            ReceiveResult::Rejected(IcmpError::ParameterProblem { pointer }) => {
                assert_eq!(pointer, 0)
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        // the whole datagram's state is gone
        let stats = engine.stats();
        assert_eq!(stats.live_queues, 0);
        assert_eq!(stats.live_fragments, 0);
    }

    #[test]
    fn ttl_expiry_reports_time_exceeded() {
        let sink = Arc::new(CollectingSink::default());
        let engine = Reassembly::with_icmp(ReassemblyConfig::default(), sink.clone());
        assert_consumed(engine.receive(
            TestFragmentBuilder::new(15).offset(0).more_fragments().payload(vec![9; 8]).build(),
        ));
        for _ in 0..TTL_TICKS {
            engine.sweep();
        }
        let stats = engine.stats();
        assert_eq!(stats.live_queues, 0);
        assert_eq!(stats.live_fragments, 0);
        assert_eq!(stats.dropped_timeout, 1);

        let errors = sink.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        let (error, _, fragment) = &errors[0];
        assert_eq!(*error, IcmpError::TimeExceeded);
        assert_eq!(fragment.to_vec(), vec![9; 8]);
    }

    #[test]
    fn dirty_queue_expires_in_silence() {
        let sink = Arc::new(CollectingSink::default());
        let engine = Reassembly::with_icmp(ReassemblyConfig::default(), sink.clone());
        engine.receive(
            TestFragmentBuilder::new(16).offset(0).more_fragments().payload(vec![0; 96]).build(),
        );
        engine.receive(
            TestFragmentBuilder::new(16).offset(48).more_fragments().payload(vec![0; 96]).build(),
        );
        for _ in 0..TTL_TICKS {
            engine.sweep();
        }
        assert_eq!(engine.stats().live_queues, 0);
        assert!(sink.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn tightened_limit_takes_effect_on_sweep() {
        let sink = Arc::new(CollectingSink::default());
        let engine = Reassembly::with_icmp(ReassemblyConfig::new(8, UNLIMITED), sink.clone());
        for identification in 0..3u32 {
            engine.receive(
                TestFragmentBuilder::new(identification)
                    .offset(0)
                    .more_fragments()
                    .payload(vec![0; 8])
                    .build(),
            );
        }
        assert_eq!(engine.stats().live_queues, 3);

        // tightening never evicts synchronously
        engine.config().set_max_queues(1);
        assert_eq!(engine.stats().live_queues, 3);

        engine.sweep();
        let stats = engine.stats();
        assert_eq!(stats.live_queues, 1);
        assert_eq!(stats.dropped_resource, 2);
        assert_eq!(sink.errors.lock().unwrap().len(), 2);
    }

    #[test]
    fn ecn_mismatch_drops_fragment() {
        let engine = engine();
        assert_consumed(engine.receive(
            TestFragmentBuilder::new(17)
                .offset(0)
                .more_fragments()
                .ecn(Ecn::Ect0)
                .payload(vec![0; 8])
                .build(),
        ));
        assert_consumed(engine.receive(
            TestFragmentBuilder::new(17)
                .offset(8)
                .ecn(Ecn::NotEct)
                .payload(vec![0; 8])
                .build(),
        ));
        let stats = engine.stats();
        assert_eq!(stats.dropped_ecn, 1);
        assert_eq!(stats.live_fragments, 1);
    }

    #[test]
    fn congestion_marking_survives_reassembly() {
        let engine = engine();
        engine.receive(
            TestFragmentBuilder::new(18)
                .offset(0)
                .more_fragments()
                .ecn(Ecn::Ect0)
                .payload(vec![0; 8])
                .build(),
        );
        match engine.receive(
            TestFragmentBuilder::new(18).offset(8).ecn(Ecn::Ce).payload(vec![0; 8]).build(),
        ) {
            ReceiveResult::Delivered(assembled) => {
                assert_eq!(assembled.header.ecn(), Ecn::Ce)
            }
            other => panic!("expected delivery, got {other:?}"),
        }
    }

    #[test]
    fn partial_checksums_fold_across_fragments() {
        let engine = engine();
        engine.receive(
            TestFragmentBuilder::new(19)
                .offset(0)
                .more_fragments()
                .partial_checksum(0xffff)
                .payload(vec![0; 8])
                .build(),
        );
        match engine.receive(
            TestFragmentBuilder::new(19)
                .offset(8)
                .partial_checksum(0x2)
                .payload(vec![0; 8])
                .build(),
        ) {
            // 0xffff + 0x2 folds with an end-around carry to 0x2
            ReceiveResult::Delivered(assembled) => assert_eq!(assembled.checksum, Some(0x2)),
            other => panic!("expected delivery, got {other:?}"),
        }
    }

    #[test]
    fn atomic_fragment_completes_immediately() {
        let engine = engine();
        match engine.receive(
            TestFragmentBuilder::new(20).offset(0).payload(vec![1; 100]).build(),
        ) {
            ReceiveResult::Delivered(assembled) => {
                assert_eq!(assembled.payload.len(), 100);
                assert_eq!(assembled.header.payload_length, 100);
            }
            other => panic!("expected delivery, got {other:?}"),
        }
        assert_eq!(engine.stats().live_queues, 0);
    }

    #[tokio::test]
    async fn sweeper_task_drains_on_shutdown() {
        let engine = Arc::new(Reassembly::new(ReassemblyConfig::default()));
        let shutdown = Shutdown::new();
        let handle = engine.start(shutdown.clone());

        assert!(matches!(
            engine.receive(
                TestFragmentBuilder::new(21).offset(0).more_fragments().payload(vec![0; 8]).build(),
            ),
            ReceiveResult::Consumed,
        ));
        assert_eq!(engine.stats().live_queues, 1);

        shutdown.shut_down();
        handle.await.expect("sweeper task panicked");
        assert_eq!(engine.stats().live_queues, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_evicts_after_deadline() {
        let sink = Arc::new(CollectingSink::default());
        let engine = Arc::new(Reassembly::with_icmp(ReassemblyConfig::default(), sink.clone()));
        let shutdown = Shutdown::new();
        let handle = engine.start(shutdown.clone());
        // let the task reach its parked state before arming it
        tokio::task::yield_now().await;

        engine.receive(
            TestFragmentBuilder::new(22).offset(0).more_fragments().payload(vec![0; 8]).build(),
        );
        // paused time fast-forwards through the sweep intervals
        tokio::time::sleep(SWEEP_INTERVAL * (TTL_TICKS as u32 + 1)).await;

        assert_eq!(engine.stats().live_queues, 0);
        assert_eq!(engine.stats().dropped_timeout, 1);
        assert_eq!(sink.errors.lock().unwrap().len(), 1);

        shutdown.shut_down();
        handle.await.expect("sweeper task panicked");
    }
}
