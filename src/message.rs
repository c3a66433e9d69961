//! Byte collections with efficient operations for protocols.
//!
//! This module primarily implements the [`Message`] collection.

use std::{collections::VecDeque, fmt::Display, ops::Range};

mod chunk;
pub use chunk::Chunk;

/// A byte collection built for fragment handling.
///
/// Reassembly wants to strip headers off incoming fragments and stitch their
/// payloads back together without copying any of the bytes. A message is a
/// sequence of reference-counted chunks, so slicing off a header or appending
/// another fragment's payload only adjusts chunk bookkeeping. Cloning a
/// message is cheap for the same reason, which is what lets an evicted
/// queue's first fragment be handed to the ICMP layer without a copy.
#[derive(Debug, Clone, Default)]
pub struct Message {
    chunks: VecDeque<Chunk>,
    len: usize,
}

impl Message {
    /// Creates a new message with the given body content.
    pub fn new(body: impl Into<Chunk>) -> Self {
        let body = body.into();
        let len = body.len();
        let mut chunks = VecDeque::new();
        chunks.push_back(body);
        Self { chunks, len }
    }

    /// Creates a new message with the given header prepended.
    pub fn header(&mut self, header: impl Into<Chunk>) {
        let header = header.into();
        self.len += header.len();
        self.chunks.push_front(header);
    }

    /// Adds the given message to the end of this one without copying either.
    pub fn concatenate(&mut self, other: Message) {
        self.len += other.len;
        self.chunks.extend(other.chunks);
    }

    /// Removes the first `len` bytes from the message and returns them as a
    /// new message. Used to carve fragment-sized pieces off a datagram.
    pub fn cut(&mut self, len: usize) -> Self {
        assert!(len <= self.len);
        self.len -= len;

        let mut chunks = VecDeque::new();
        let mut to_remove = len;
        while let Some(mut head) = self.chunks.pop_front() {
            let head_len = head.len();
            if head_len <= to_remove {
                to_remove -= head_len;
                chunks.push_back(head);
            } else {
                if to_remove > 0 {
                    let mut taken = head.clone();
                    taken.end = taken.start + to_remove;
                    chunks.push_back(taken);
                }
                head.start += to_remove;
                self.chunks.push_front(head);
                break;
            }
        }

        Self { chunks, len }
    }

    /// Drops the first `len` bytes of the message, typically a header that
    /// has been parsed and is no longer needed.
    pub fn remove_front(&mut self, len: usize) {
        assert!(len <= self.len);
        self.len -= len;

        let mut to_remove = len;
        while let Some(head) = self.chunks.front_mut() {
            let head_len = head.len();
            if head_len <= to_remove {
                to_remove -= head_len;
                self.chunks.pop_front();
            } else {
                head.start += to_remove;
                break;
            }
        }
    }

    /// Reduces the message to the given byte range.
    pub fn slice(&mut self, range: Range<usize>) {
        assert!(range.end <= self.len && range.start <= range.end);
        let keep = range.len();
        self.remove_front(range.start);

        // Trim chunks past the end of the range
        self.len = keep;
        let mut remaining = keep;
        let mut used = 0;
        for chunk in self.chunks.iter_mut() {
            used += 1;
            let chunk_len = chunk.len();
            if remaining >= chunk_len {
                remaining -= chunk_len;
            } else {
                chunk.end = chunk.start + remaining;
                break;
            }
        }
        self.chunks.drain(used..);
    }

    /// The length of the message.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the message contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns an iterator over the bytes of the entire message.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.chunks
            .iter()
            .flat_map(|chunk| chunk.as_slice().iter().copied())
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.iter().collect()
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.iter() {
            write!(f, "{byte:x} ")?;
        }
        Ok(())
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl Eq for Message {}

impl From<Vec<u8>> for Message {
    fn from(val: Vec<u8>) -> Self {
        Message::new(val)
    }
}

impl From<&[u8]> for Message {
    fn from(val: &[u8]) -> Self {
        Message::new(val)
    }
}

impl<const L: usize> From<[u8; L]> for Message {
    fn from(val: [u8; L]) -> Self {
        Message::new(val)
    }
}
