use crate::rng::Rng;

/// IPv6 address in network byte order.
///
/// Textual forms are the usual RFC 4291 notations (full groups,
/// `::` compression, embedded IPv4 tail); the whole value may be the
/// random wildcard `*` (a random multicast draw is demoted to unicast
/// by masking the top bits of the first byte).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ipv6Address(pub [u8; 16]);

impl Ipv6Address {
    /// The unspecified address `::`.
    pub const NULL: Ipv6Address = Ipv6Address([0; 16]);

    /// Address from raw bytes.
    #[inline]
    pub const fn new(bytes: [u8; 16]) -> Ipv6Address {
        Ipv6Address(bytes)
    }

    /// Raw bytes (network order).
    #[inline]
    pub const fn octets(&self) -> [u8; 16] {
        self.0
    }

    /// Parse the textual form, resolving the `*` wildcard with `rng`.
    pub fn parse(s: &str, rng: &Rng) -> Option<Ipv6Address> {
        if s == "*" {
            return Some(Ipv6Address::random(rng));
        }
        s.parse::<std::net::Ipv6Addr>()
            .ok()
            .map(|a| Ipv6Address(a.octets()))
    }

    /// Random address; multicast draws are demoted to unicast.
    pub fn random(rng: &Rng) -> Ipv6Address {
        let mut bytes = [0u8; 16];
        rng.fill(&mut bytes);
        if bytes[0] == 0xff {
            bytes[0] &= 0x3f;
        }
        Ipv6Address(bytes)
    }

    /// True for the unspecified address.
    pub fn is_null(&self) -> bool {
        self.0 == [0; 16]
    }

    /// True when the first byte is 0xff.
    pub fn is_multicast(&self) -> bool {
        self.0[0] == 0xff
    }
}

impl core::fmt::Display for Ipv6Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        std::net::Ipv6Addr::from(self.0).fmt(f)
    }
}
