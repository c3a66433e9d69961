//! Contains utilities for implementing protocols.

use super::ipv6::Ipv6Address;

/// An accumulator for ones-complement partial checksums.
///
/// Hardware receive offload hands each fragment's payload sum up as a 32-bit
/// partial checksum. Ones-complement addition is commutative, so the per
/// datagram accumulator can fold fragments in whatever order they arrive and
/// the final value matches a sum over the reassembled payload. The folded
/// result is the raw 16-bit partial sum; the upper-layer protocol finishes
/// it against its own pseudo-header.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(u64);

impl Checksum {
    /// Creates a new checksum accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a 32-bit partial sum to the accumulator.
    pub fn add_partial(&mut self, sum: u32) {
        self.0 += sum as u64;
    }

    /// Adds a single `u16` to the accumulator.
    pub fn add_u16(&mut self, value: u16) {
        self.0 += value as u64;
    }

    /// Folds the accumulator down to its 16-bit ones-complement sum.
    pub fn fold(&self) -> u16 {
        let mut sum = self.0;
        while sum > 0xffff {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        sum as u16
    }
}

/// An extension trait for `Iterator<Item = u8>` adding methods for reading
/// big-endian numbers, the way headers are parsed here.
pub trait BytesExt: Iterator<Item = u8> {
    /// Advances the iterator and returns the next byte.
    fn next_u8(&mut self) -> Option<u8> {
        self.next()
    }

    /// Reads the next 2 bytes as a big-endian `u16`.
    /// Returns None if there were fewer than 2 bytes left in the iterator.
    fn next_u16_be(&mut self) -> Option<u16> {
        let arr = [self.next()?, self.next()?];
        Some(u16::from_be_bytes(arr))
    }

    /// Reads the next 4 bytes as a big-endian `u32`.
    /// Returns None if there were fewer than 4 bytes left in the iterator.
    fn next_u32_be(&mut self) -> Option<u32> {
        let arr = [self.next()?, self.next()?, self.next()?, self.next()?];
        Some(u32::from_be_bytes(arr))
    }

    /// Collects the next `N` bytes of the iterator into an array.
    /// Returns `None` if there were fewer than `N` bytes left.
    fn next_n<const N: usize>(&mut self) -> Option<[u8; N]> {
        let mut result = [0; N];
        for element in &mut result {
            *element = self.next()?;
        }
        Some(result)
    }

    /// Reads the next 16 bytes as an [`Ipv6Address`].
    fn next_ipv6addr(&mut self) -> Option<Ipv6Address> {
        self.next_n::<16>().map(Ipv6Address::from)
    }
}

impl<T: Iterator<Item = u8>> BytesExt for T {}
