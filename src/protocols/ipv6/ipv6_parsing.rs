use super::{Ecn, Ipv6Address};
use crate::protocols::utility::BytesExt;
use thiserror::Error as ThisError;

/// The number of bytes in the fixed IPv6 header
pub const FIXED_HEADER_OCTETS: u16 = 40;
/// The number of bytes in a Fragment extension header
pub const FRAGMENT_HEADER_OCTETS: u16 = 8;
/// The largest payload an IPv6 packet can describe with its 16-bit payload
/// length field. Reassembly must never produce a datagram beyond this.
pub const MAX_PAYLOAD: u32 = 65535;

/// This is bitwise anded with the `u16` containing the fragment offset and
/// more-fragments bit to extract the offset part.
const FRAGMENT_OFFSET_MASK: u16 = 0xfff8;

/// The fixed IPv6 header, RFC 8200 section 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv6Header {
    /// Traffic class; the low two bits are the ECN codepoint
    pub traffic_class: u8,
    /// Flow label, 20 bits
    pub flow_label: u32,
    /// The length in bytes of everything following the fixed header
    pub payload_length: u16,
    /// The type of the header immediately following the fixed header
    pub next_header: u8,
    /// Decremented at each forwarding hop
    pub hop_limit: u8,
    /// The source address
    pub source: Ipv6Address,
    /// The destination address
    pub destination: Ipv6Address,
}

impl Ipv6Header {
    /// Parses a fixed header from a byte iterator.
    pub fn from_bytes(mut bytes: impl Iterator<Item = u8>) -> Result<Self, ParseError> {
        let first_word = bytes.next_u32_be().ok_or(ParseError::HeaderTooShort)?;
        let version = (first_word >> 28) as u8;
        if version != 6 {
            Err(ParseError::IncorrectIpv6Version(version))?
        }
        let traffic_class = (first_word >> 20) as u8;
        let flow_label = first_word & 0xf_ffff;

        let payload_length = bytes.next_u16_be().ok_or(ParseError::HeaderTooShort)?;
        let next_header = bytes.next_u8().ok_or(ParseError::HeaderTooShort)?;
        let hop_limit = bytes.next_u8().ok_or(ParseError::HeaderTooShort)?;
        let source = bytes.next_ipv6addr().ok_or(ParseError::HeaderTooShort)?;
        let destination = bytes.next_ipv6addr().ok_or(ParseError::HeaderTooShort)?;

        Ok(Self {
            traffic_class,
            flow_label,
            payload_length,
            next_header,
            hop_limit,
            source,
            destination,
        })
    }

    /// The ECN codepoint carried in the traffic class.
    pub fn ecn(&self) -> Ecn {
        Ecn::from_traffic_class(self.traffic_class)
    }

    /// Overwrites the ECN bits of the traffic class.
    pub fn set_ecn(&mut self, ecn: Ecn) {
        self.traffic_class = (self.traffic_class & !0b11) | ecn.as_bits();
    }
}

/// The Fragment extension header, RFC 8200 section 4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentHeader {
    /// The type of the first header of the fragmentable part
    pub next_header: u8,
    /// Where this fragment's payload belongs, in units of 8 bytes
    pub offset_units: u16,
    /// Whether more fragments follow this one
    pub more_fragments: bool,
    /// Shared by every fragment of one original datagram
    pub identification: u32,
}

impl FragmentHeader {
    /// Parses a Fragment header from a byte iterator. The reserved byte and
    /// the two reserved flag bits are ignored, as RFC 8200 requires.
    pub fn from_bytes(mut bytes: impl Iterator<Item = u8>) -> Result<Self, ParseError> {
        let next_header = bytes.next_u8().ok_or(ParseError::HeaderTooShort)?;
        let _reserved = bytes.next_u8().ok_or(ParseError::HeaderTooShort)?;
        let offset_and_flags = bytes.next_u16_be().ok_or(ParseError::HeaderTooShort)?;
        let identification = bytes.next_u32_be().ok_or(ParseError::HeaderTooShort)?;
        Ok(Self {
            next_header,
            offset_units: (offset_and_flags & FRAGMENT_OFFSET_MASK) >> 3,
            more_fragments: offset_and_flags & 1 == 1,
            identification,
        })
    }

    /// This fragment's byte offset into the reassembled payload. The
    /// thirteen-bit offset field shifted up by three always fits a `u16`.
    pub fn offset_bytes(&self) -> u16 {
        self.offset_units << 3
    }

    /// Serializes the header.
    pub fn build(&self) -> [u8; FRAGMENT_HEADER_OCTETS as usize] {
        let offset_and_flags = (self.offset_units << 3) | self.more_fragments as u16;
        let mut out = [0u8; FRAGMENT_HEADER_OCTETS as usize];
        out[0] = self.next_header;
        out[2..4].copy_from_slice(&offset_and_flags.to_be_bytes());
        out[4..8].copy_from_slice(&self.identification.to_be_bytes());
        out
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("The IPv6 header is incomplete")]
    HeaderTooShort,
    #[error("Expected version 6 in IPv6 header, got {0}")]
    IncorrectIpv6Version(u8),
}

/// A builder for serialized IPv6 fixed headers. The fields align with those
/// found on [`Ipv6Header`].
pub struct Ipv6HeaderBuilder {
    traffic_class: u8,
    flow_label: u32,
    payload_length: u16,
    next_header: u8,
    hop_limit: u8,
    source: Ipv6Address,
    destination: Ipv6Address,
}

impl Ipv6HeaderBuilder {
    /// Creates a new builder.
    pub fn new(
        source: Ipv6Address,
        destination: Ipv6Address,
        next_header: u8,
        payload_length: u16,
    ) -> Self {
        Self {
            traffic_class: 0,
            flow_label: 0,
            payload_length,
            next_header,
            hop_limit: 64,
            source,
            destination,
        }
    }

    /// Sets the traffic class
    pub fn traffic_class(mut self, traffic_class: u8) -> Self {
        self.traffic_class = traffic_class;
        self
    }

    /// Sets the flow label
    pub fn flow_label(mut self, flow_label: u32) -> Self {
        self.flow_label = flow_label;
        self
    }

    /// Sets the hop limit
    pub fn hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    /// Creates a serialized header from the configuration provided
    pub fn build(self) -> Result<Vec<u8>, HeaderBuildError> {
        if self.flow_label > 0xf_ffff {
            Err(HeaderBuildError::OverlyLongFlowLabel)?
        }
        let first_word =
            (6u32 << 28) | ((self.traffic_class as u32) << 20) | self.flow_label;

        let mut out = Vec::with_capacity(FIXED_HEADER_OCTETS as usize);
        out.extend_from_slice(&first_word.to_be_bytes());
        out.extend_from_slice(&self.payload_length.to_be_bytes());
        out.push(self.next_header);
        out.push(self.hop_limit);
        out.extend_from_slice(&self.source.to_bytes());
        out.extend_from_slice(&self.destination.to_bytes());
        Ok(out)
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum HeaderBuildError {
    #[error("The flow label does not fit in 20 bits")]
    OverlyLongFlowLabel,
}
