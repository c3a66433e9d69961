//! Splits a datagram's fragmentable part into Fragment-header-sized pieces,
//! RFC 8200 section 4.5. The receive side of this exchange lives in
//! [`reassembly`](super::reassembly).

use super::ipv6_parsing::{FragmentHeader, FIXED_HEADER_OCTETS, FRAGMENT_HEADER_OCTETS};
use crate::Message;

/// A piece of a datagram
pub type Fragment = (FragmentHeader, Message);

/// The result of datagram fragmentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragments {
    /// The datagram was fragmented
    Fragmented(Vec<Fragment>),
    /// The datagram fits the MTU and requires no fragment header
    DontFragment(Message),
    /// The MTU cannot even fit one eight-byte block of payload per fragment.
    /// IPv6 guarantees a minimum link MTU of 1280, so this only happens with
    /// nonsense input.
    MtuTooSmall,
}

/// Divides a datagram's fragmentable part into pieces that fit within the
/// path MTU once the fixed and Fragment headers are prepended. Every
/// fragment except the last carries a multiple of eight bytes, as the
/// receiver will enforce.
pub fn fragment(
    next_header: u8,
    identification: u32,
    mut body: Message,
    mtu: u16,
) -> Fragments {
    if FIXED_HEADER_OCTETS as usize + body.len() <= mtu as usize {
        return Fragments::DontFragment(body);
    }
    let Some(capacity) = (mtu as usize)
        .checked_sub((FIXED_HEADER_OCTETS + FRAGMENT_HEADER_OCTETS) as usize)
        .map(|capacity| capacity / 8 * 8)
        .filter(|capacity| *capacity > 0)
    else {
        return Fragments::MtuTooSmall;
    };

    let mut fragments = vec![];
    let mut offset_units = 0u16;
    while body.len() > capacity {
        let piece = body.cut(capacity);
        fragments.push((
            FragmentHeader {
                next_header,
                offset_units,
                more_fragments: true,
                identification,
            },
            piece,
        ));
        offset_units += (capacity / 8) as u16;
    }
    fragments.push((
        FragmentHeader {
            next_header,
            offset_units,
            more_fragments: false,
            identification,
        },
        body,
    ));
    Fragments::Fragmented(fragments)
}
