//! The IPv6 pieces the reassembly engine works in terms of: addressing, the
//! fixed header, the Fragment extension header, and ECN codepoints.

mod ipv6_address;
pub use ipv6_address::{Ipv6Address, ScopeId};

pub mod ipv6_parsing;
pub use ipv6_parsing::{FragmentHeader, Ipv6Header};

mod ecn;
pub use ecn::Ecn;

pub mod fragmentation;

pub mod icmpv6;

pub mod reassembly;

/// Well-known next-header values, used when deciding whether a first
/// fragment can possibly contain its upper-layer header.
/// See <https://en.wikipedia.org/wiki/List_of_IP_protocol_numbers>.
pub mod next_header {
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
    pub const FRAGMENT: u8 = 44;
    pub const ICMPV6: u8 = 58;
    pub const NO_NEXT_HEADER: u8 = 59;
}
