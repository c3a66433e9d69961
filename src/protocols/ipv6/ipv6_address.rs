use std::fmt::{self, Display};

/// A 128-bit IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ipv6Address([u8; 16]);

impl Ipv6Address {
    /// The unspecified address `::`.
    pub const UNSPECIFIED: Self = Self([0u8; 16]);

    /// The loopback address `::1`.
    pub const LOOPBACK: Self = Self([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);

    /// Creates a new address.
    pub const fn new(address: [u8; 16]) -> Self {
        Self(address)
    }

    /// Gets the address as a `[u8; 16]`.
    pub fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    /// Whether the address is in `fe80::/10`. Link-local addresses are only
    /// unambiguous together with a [`ScopeId`].
    pub fn is_link_local(self) -> bool {
        self.0[0] == 0xfe && self.0[1] & 0xc0 == 0x80
    }
}

impl Display for Ipv6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pair) in self.0.chunks_exact(2).enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:x}", u16::from_be_bytes([pair[0], pair[1]]))?;
        }
        Ok(())
    }
}

impl From<[u8; 16]> for Ipv6Address {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl From<u128> for Ipv6Address {
    fn from(n: u128) -> Self {
        Self(n.to_be_bytes())
    }
}

impl From<Ipv6Address> for [u8; 16] {
    fn from(address: Ipv6Address) -> Self {
        address.0
    }
}

impl From<Ipv6Address> for u128 {
    fn from(address: Ipv6Address) -> Self {
        u128::from_be_bytes(address.0)
    }
}

/// The zone an address belongs to. Link-local source and destination
/// addresses are only meaningful per interface, so the scope participates in
/// reassembly-queue identity alongside the addresses themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScopeId(pub u32);

impl Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}
