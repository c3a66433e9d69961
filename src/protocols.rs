//! The protocol pieces of the reassembly subsystem.

pub mod ipv6;
pub use ipv6::reassembly::Reassembly;

pub mod utility;
pub use utility::Checksum;
