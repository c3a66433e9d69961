//! A utility for building inbound fragments in tests.
#![allow(unused)]

use super::InboundFragment;
use crate::protocols::ipv6::{
    next_header, Ecn, FragmentHeader, Ipv6Address, Ipv6Header, ScopeId,
};
use crate::Message;

/// Builds an [`InboundFragment`] the way the receive path would after
/// parsing a wire packet, with sane defaults for everything a test does not
/// care about.
pub struct TestFragmentBuilder {
    source: Ipv6Address,
    destination: Ipv6Address,
    src_scope: ScopeId,
    dst_scope: ScopeId,
    identification: u32,
    offset_bytes: u16,
    more_fragments: bool,
    next_header: u8,
    unfragmentable_len: u16,
    ecn: Ecn,
    partial_checksum: Option<u32>,
    payload: Vec<u8>,
    jumbo: bool,
}

impl TestFragmentBuilder {
    pub fn new(identification: u32) -> Self {
        Self {
            source: Ipv6Address::from(0x2001_0db8_0000_0000_0000_0000_0000_0001u128),
            destination: Ipv6Address::from(0x2001_0db8_0000_0000_0000_0000_0000_0002u128),
            src_scope: ScopeId(0),
            dst_scope: ScopeId(0),
            identification,
            offset_bytes: 0,
            more_fragments: false,
            next_header: next_header::UDP,
            unfragmentable_len: 0,
            ecn: Ecn::NotEct,
            partial_checksum: None,
            payload: Vec::new(),
            jumbo: false,
        }
    }

    pub fn addresses(mut self, source: Ipv6Address, destination: Ipv6Address) -> Self {
        self.source = source;
        self.destination = destination;
        self
    }

    pub fn scopes(mut self, src_scope: u32, dst_scope: u32) -> Self {
        self.src_scope = ScopeId(src_scope);
        self.dst_scope = ScopeId(dst_scope);
        self
    }

    /// Byte offset into the reassembled payload; a multiple of eight.
    pub fn offset(mut self, offset_bytes: u16) -> Self {
        self.offset_bytes = offset_bytes;
        self
    }

    pub fn more_fragments(mut self) -> Self {
        self.more_fragments = true;
        self
    }

    pub fn next_header(mut self, next_header: u8) -> Self {
        self.next_header = next_header;
        self
    }

    pub fn unfragmentable_len(mut self, unfragmentable_len: u16) -> Self {
        self.unfragmentable_len = unfragmentable_len;
        self
    }

    pub fn ecn(mut self, ecn: Ecn) -> Self {
        self.ecn = ecn;
        self
    }

    pub fn partial_checksum(mut self, sum: u32) -> Self {
        self.partial_checksum = Some(sum);
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Zeroes the payload length field, as a Jumbo Payload option would.
    pub fn jumbo(mut self) -> Self {
        self.jumbo = true;
        self
    }

    pub fn build(self) -> InboundFragment {
        let payload_length = if self.jumbo {
            0
        } else {
            self.unfragmentable_len + 8 + self.payload.len() as u16
        };
        let header = Ipv6Header {
            traffic_class: self.ecn.as_bits(),
            flow_label: 0,
            payload_length,
            next_header: if self.unfragmentable_len == 0 {
                next_header::FRAGMENT
            } else {
                0
            },
            hop_limit: 64,
            source: self.source,
            destination: self.destination,
        };
        let fragment = FragmentHeader {
            next_header: self.next_header,
            offset_units: self.offset_bytes >> 3,
            more_fragments: self.more_fragments,
            identification: self.identification,
        };
        InboundFragment {
            header,
            fragment,
            src_scope: self.src_scope,
            dst_scope: self.dst_scope,
            unfragmentable_len: self.unfragmentable_len,
            partial_checksum: self.partial_checksum,
            payload: Message::new(self.payload),
        }
    }
}
