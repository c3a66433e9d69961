use crate::protocols::ipv6::{Ipv6Address, ScopeId};

/// Uniquely identifies the fragments of a particular datagram. Unlike IPv4,
/// the upper-layer protocol is not part of fragment identity; the scopes
/// are, because link-local address pairs collide across interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    /// The sender's address
    pub src: Ipv6Address,
    /// The zone the source address is scoped to
    pub src_scope: ScopeId,
    /// The local address
    pub dst: Ipv6Address,
    /// The zone the destination address is scoped to
    pub dst_scope: ScopeId,
    /// The identification field of the Fragment header
    pub identification: u32,
}
