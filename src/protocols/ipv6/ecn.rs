use std::fmt::{self, Debug, Formatter};

/// The two ECN bits of the traffic class, RFC 3168.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Ecn {
    /// Not ECN-capable transport
    #[default]
    NotEct = 0b00,
    /// ECN-capable transport, codepoint 1
    Ect1 = 0b01,
    /// ECN-capable transport, codepoint 0
    Ect0 = 0b10,
    /// Congestion experienced
    Ce = 0b11,
}

impl Ecn {
    /// Extracts the codepoint from the low two bits of a traffic class.
    pub const fn from_traffic_class(traffic_class: u8) -> Self {
        match traffic_class & 0b11 {
            0b01 => Self::Ect1,
            0b10 => Self::Ect0,
            0b11 => Self::Ce,
            _ => Self::NotEct,
        }
    }

    pub const fn as_bits(self) -> u8 {
        self as u8
    }

    /// Reconciles the codepoint of a newly arrived fragment into the
    /// datagram's accumulated marking. Congestion experienced dominates any
    /// ECN-capable codepoint, but a Not-ECT fragment mixed with ECN-capable
    /// ones makes the datagram incoherent and fails the merge; the caller
    /// drops the offending fragment.
    pub fn merge(self, incoming: Ecn) -> Option<Ecn> {
        use Ecn::*;
        match (self, incoming) {
            (NotEct, NotEct) => Some(NotEct),
            (NotEct, _) | (_, NotEct) => None,
            (Ce, _) | (_, Ce) => Some(Ce),
            // ECT(0)/ECT(1) disagreement: the first-observed codepoint wins
            (accumulated, _) => Some(accumulated),
        }
    }
}

impl Debug for Ecn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ecn::NotEct => "Not-ECT",
            Ecn::Ect1 => "ECT(1)",
            Ecn::Ect0 => "ECT(0)",
            Ecn::Ce => "CE",
        };
        write!(f, "{name}")
    }
}
