//! The boundary to the ICMPv6 collaborator. This subsystem never builds
//! ICMP messages itself; it describes the error and hands over the
//! offending fragment's context.

use super::Ipv6Header;
use crate::Message;

/// An error the ICMP layer should report to the fragment's sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IcmpError {
    /// A malformed fragment. The pointer is the byte offset of the offending
    /// field within the original packet.
    #[error("parameter problem, pointer {pointer}")]
    ParameterProblem { pointer: u32 },
    /// Reassembly did not complete within the time limit.
    #[error("fragment reassembly time exceeded")]
    TimeExceeded,
}

/// Where deferred error notifications go.
///
/// Implementations are invoked strictly outside the reassembly lock: the
/// ICMP layer is free to send packets, take its own locks, or call back into
/// the stack without deadlocking against an in-flight insertion.
pub trait IcmpSink: Send + Sync {
    /// Reports `error` concerning the datagram that began with `header`.
    /// `fragment` holds the offset-zero fragment's payload bytes when they
    /// are still available, so the ICMP layer can quote the original data.
    fn icmp_error(&self, error: IcmpError, header: Ipv6Header, fragment: Message);
}
