//! An IPv6 fragment-reassembly engine.
//!
//! This crate reconstructs upper-layer datagrams out of an unordered,
//! untrusted stream of IPv6 fragments under strict memory and time budgets.
//! It implements the RFC 8200 reassembly rules hardened against the known
//! fragmentation attacks (RFC 8900): overlapping fragments poison and evict
//! the whole datagram, resource admission bounds the number of live queues
//! and fragments, and a timer sweep guarantees that nothing lingers past the
//! reassembly deadline.
//!
//! # Organization
//!
//! - [`Message`](message::Message) is a zero-copy byte collection that owns
//!   fragment payloads and splices them back together on completion
//! - [`Reassembly`](protocols::ipv6::reassembly::Reassembly) is the engine:
//!   one call per incoming fragment, a periodic timer sweep, and runtime
//!   adjustable limits
//! - [`protocols::ipv6`] carries the wire formats: the fixed header, the
//!   Fragment extension header, and the ECN codepoints
//!
//! The collaborators this subsystem talks to are specified only at their
//! boundary: the caller parses extension headers and hands the engine an
//! [`InboundFragment`](protocols::ipv6::reassembly::InboundFragment), and
//! ICMP error emission goes through the
//! [`IcmpSink`](protocols::ipv6::icmpv6::IcmpSink) trait, always outside the
//! reassembly lock.

pub mod message;
pub use message::Message;

pub mod protocols;

pub mod shutdown;
pub use shutdown::Shutdown;

pub use protocols::ipv6::reassembly::{
    Assembled, InboundFragment, Reassembly, ReassemblyConfig, ReceiveResult,
};
