use super::{fragment::FragmentRecord, Assembled};
use crate::protocols::ipv6::ipv6_parsing::MAX_PAYLOAD;
use crate::protocols::ipv6::{Ecn, Ipv6Header};
use crate::protocols::utility::Checksum;
use crate::Message;

/// Reassembly state for one in-progress datagram.
///
/// Fragments are kept sorted by offset in a plain vector; with the overlap
/// policy below the list is also non-overlapping, so completion is a single
/// front-to-back walk and assembly a single concatenation pass.
#[derive(Debug, Clone)]
pub(super) struct ReassemblyQueue {
    /// Sorted by offset, pairwise disjoint once accepted
    fragments: Vec<FragmentRecord>,
    /// Bytes of extension headers preceding the Fragment header, learned
    /// from the first-observed offset-zero fragment
    unfragmentable_len: Option<u16>,
    /// What the Fragment header's next-header field said on the offset-zero
    /// fragment; meaningless until `unfragmentable_len` is set
    next_header: u8,
    /// The offset-zero fragment's outer header, kept for the reassembled
    /// datagram and for the deferred time-exceeded notification
    zero_header: Option<Ipv6Header>,
    /// ECN marking merged across every accepted fragment
    ecn: Ecn,
    /// Sweep ticks remaining before eviction
    ttl: u8,
    /// Sticky violation flag. A dirty queue accepts nothing and exists only
    /// to hold its key until the sweeper reaps it.
    dirty: bool,
    checksum: Checksum,
    /// True while every accepted fragment carried a partial checksum
    checksum_valid: bool,
}

/// What [`ReassemblyQueue::insert`] decided about a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum InsertOutcome {
    Inserted,
    /// Same offset and length as a queued record; dropped without prejudice
    Duplicate,
    /// Intersecting, non-identical range; the whole queue must be purged
    Overlap,
}

impl ReassemblyQueue {
    pub fn new(ttl: u8, ecn: Ecn) -> Self {
        Self {
            fragments: Vec::new(),
            unfragmentable_len: None,
            next_header: 0,
            zero_header: None,
            ecn,
            ttl,
            dirty: false,
            checksum: Checksum::new(),
            checksum_valid: true,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn unfragmentable_len(&self) -> Option<u16> {
        self.unfragmentable_len
    }

    /// Captures the derived state only the offset-zero fragment carries.
    /// First arrival is authoritative; later offset-zero fragments fall
    /// through to the ordinary duplicate/overlap policy.
    pub fn record_first_fragment(
        &mut self,
        unfragmentable_len: u16,
        next_header: u8,
        header: Ipv6Header,
    ) {
        if self.unfragmentable_len.is_none() {
            self.unfragmentable_len = Some(unfragmentable_len);
            self.next_header = next_header;
            self.zero_header = Some(header);
        }
    }

    /// Places a record into the sorted list, enforcing the overlap rule.
    /// On [`InsertOutcome::Overlap`] the caller purges the queue; the record
    /// itself is never inserted.
    pub fn insert(
        &mut self,
        record: FragmentRecord,
        partial_checksum: Option<u32>,
    ) -> InsertOutcome {
        let position = self
            .fragments
            .binary_search_by(|queued| queued.offset.cmp(&record.offset));
        let index = match position {
            Ok(i) => {
                if self.fragments[i].len == record.len {
                    return InsertOutcome::Duplicate;
                }
                if self.fragments[i].overlaps(&record) {
                    return InsertOutcome::Overlap;
                }
                // A zero-length twin at the same offset adds nothing
                return InsertOutcome::Duplicate;
            }
            Err(i) => i,
        };
        if index > 0 && self.fragments[index - 1].overlaps(&record) {
            return InsertOutcome::Overlap;
        }
        if index < self.fragments.len() && self.fragments[index].overlaps(&record) {
            return InsertOutcome::Overlap;
        }

        match partial_checksum {
            Some(sum) if self.checksum_valid => self.checksum.add_partial(sum),
            _ => self.checksum_valid = false,
        }
        self.fragments.insert(index, record);
        InsertOutcome::Inserted
    }

    /// Frees every held fragment and poisons the queue. Returns how many
    /// records were released so the caller can settle the global count.
    pub fn purge(&mut self) -> usize {
        self.dirty = true;
        let released = self.fragments.len();
        self.fragments.clear();
        released
    }

    /// Silently drops queued fragments that would push the reassembled
    /// datagram past the maximum size. Only meaningful once the offset-zero
    /// fragment has revealed the unfragmentable length.
    pub fn purge_oversize(&mut self) -> usize {
        let Some(unfragmentable_len) = self.unfragmentable_len else {
            return 0;
        };
        let before = self.fragments.len();
        self.fragments
            .retain(|record| unfragmentable_len as u32 + record.end() <= MAX_PAYLOAD);
        before - self.fragments.len()
    }

    /// Whether the reassembled size of this record would exceed the maximum
    /// datagram size, judged against the known unfragmentable length.
    pub fn would_overflow(&self, record: &FragmentRecord) -> bool {
        match self.unfragmentable_len {
            Some(unfragmentable_len) => unfragmentable_len as u32 + record.end() > MAX_PAYLOAD,
            None => false,
        }
    }

    /// Merges a fragment's ECN codepoint into the datagram's marking.
    /// Returns false when the merge fails and the fragment must be dropped.
    pub fn merge_ecn(&mut self, incoming: Ecn) -> bool {
        match self.ecn.merge(incoming) {
            Some(merged) => {
                self.ecn = merged;
                true
            }
            None => false,
        }
    }

    /// The fragment list is complete when it covers `[0, N)` without gaps
    /// and the final record has the more-fragments bit clear.
    pub fn is_complete(&self) -> bool {
        if self.dirty || self.unfragmentable_len.is_none() {
            return false;
        }
        let mut expected = 0u32;
        for record in &self.fragments {
            if record.offset as u32 != expected {
                return false;
            }
            expected += record.len as u32;
        }
        match self.fragments.last() {
            Some(last) => !last.more_fragments,
            None => false,
        }
    }

    /// Ages the queue by one sweep tick. Returns true once expired.
    pub fn tick(&mut self) -> bool {
        self.ttl = self.ttl.saturating_sub(1);
        self.ttl == 0
    }

    /// The context for a deferred time-exceeded notification: the
    /// offset-zero fragment's outer header and payload, when held.
    pub fn timeout_context(&self) -> Option<(Ipv6Header, Message)> {
        let header = self.zero_header?;
        let first = self.fragments.first()?;
        if first.offset != 0 {
            return None;
        }
        Some((header, first.payload.clone()))
    }

    /// Stitches a complete queue into one datagram. The caller has already
    /// checked [`is_complete`](Self::is_complete) and removed the queue from
    /// the directory; `None` only means the invariant was violated.
    pub fn assemble(mut self) -> Option<Assembled> {
        let mut header = self.zero_header.take()?;
        let unfragmentable_len = self.unfragmentable_len?;
        let total: u32 = self.fragments.iter().map(|record| record.len as u32).sum();

        header.next_header = self.next_header;
        header.payload_length = (unfragmentable_len as u32 + total) as u16;
        header.set_ecn(self.ecn);

        let checksum = if self.checksum_valid && !self.fragments.is_empty() {
            Some(self.checksum.fold())
        } else {
            None
        };

        let mut payload = Message::new(vec![]);
        for record in self.fragments {
            payload.concatenate(record.into_payload());
        }

        Some(Assembled {
            header,
            payload,
            checksum,
        })
    }
}
