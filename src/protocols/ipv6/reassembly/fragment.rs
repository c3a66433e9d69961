use crate::Message;

/// One accepted wire fragment's place in the datagram being assembled.
/// Records live in the queue's offset-sorted list; once the list is
/// contiguous and terminated, popping them front to back and concatenating
/// the payloads reproduces the original bytes.
#[derive(Debug, Clone)]
pub struct FragmentRecord {
    /// Byte offset into the reassembled payload. A multiple of eight for
    /// every fragment except, possibly, the final one.
    pub offset: u16,
    /// Payload bytes carried
    pub len: u16,
    /// Whether more fragments follow this one
    pub more_fragments: bool,
    /// The fragment's payload
    pub payload: Message,
}

impl FragmentRecord {
    pub fn new(offset: u16, more_fragments: bool, payload: Message) -> Self {
        Self {
            offset,
            len: payload.len() as u16,
            more_fragments,
            payload,
        }
    }

    /// One past the last byte this fragment covers.
    pub fn end(&self) -> u32 {
        self.offset as u32 + self.len as u32
    }

    /// Whether this record's byte range intersects another's. Empty ranges
    /// never overlap anything.
    pub fn overlaps(&self, other: &Self) -> bool {
        (self.offset as u32) < other.end() && (other.offset as u32) < self.end()
    }

    pub fn into_payload(self) -> Message {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(offset: u16, len: usize) -> FragmentRecord {
        FragmentRecord::new(offset, true, Message::new(vec![0u8; len]))
    }

    #[test]
    fn overlap_detection() {
        assert!(record(0, 100).overlaps(&record(50, 100)));
        assert!(record(50, 100).overlaps(&record(0, 100)));
        assert!(record(0, 100).overlaps(&record(0, 100)));
        assert!(!record(0, 100).overlaps(&record(100, 100)));
        assert!(!record(200, 8).overlaps(&record(0, 8)));
    }

    #[test]
    fn empty_never_overlaps() {
        assert!(!record(50, 0).overlaps(&record(0, 100)));
        assert!(!record(0, 100).overlaps(&record(50, 0)));
    }
}
