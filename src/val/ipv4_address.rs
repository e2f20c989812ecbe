use crate::lex;
use crate::rng::Rng;

/// IPv4 address in network byte order.
///
/// The textual form is dotted decimal. Each token may be replaced by
/// the random wildcard `*` or a bounded random `*[lo-hi]` (decimal
/// bounds); the whole value may be a single `*` (a random multicast
/// draw is demoted to unicast by clearing the most significant bit).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ipv4Address(pub [u8; 4]);

impl Ipv4Address {
    /// 0.0.0.0
    pub const NULL: Ipv4Address = Ipv4Address([0; 4]);

    /// Address from raw bytes.
    #[inline]
    pub const fn new(bytes: [u8; 4]) -> Ipv4Address {
        Ipv4Address(bytes)
    }

    /// Raw bytes (network order).
    #[inline]
    pub const fn octets(&self) -> [u8; 4] {
        self.0
    }

    /// Parse dotted decimal, resolving random wildcards with `rng`.
    pub fn parse(s: &str, rng: &Rng) -> Option<Ipv4Address> {
        if s == "*" {
            return Some(Ipv4Address::random(rng));
        }
        // shortest valid form is "0.0.0.0"
        if s.len() < 7 {
            return None;
        }

        let mut bytes = [0u8; 4];
        let mut count = 0;
        for token in s.split('.') {
            if count == 4 || token.is_empty() {
                return None;
            }
            bytes[count] = parse_token(token, rng)?;
            count += 1;
        }
        if count != 4 {
            return None;
        }
        Some(Ipv4Address(bytes))
    }

    /// Random address; multicast draws are demoted to unicast by
    /// clearing the most significant bit.
    pub fn random(rng: &Rng) -> Ipv4Address {
        let mut ip = rng.u32();
        if (ip & 0xf000_0000) == 0xe000_0000 {
            ip &= 0x7fff_ffff;
        }
        Ipv4Address(ip.to_be_bytes())
    }

    /// True for 0.0.0.0.
    pub fn is_null(&self) -> bool {
        self.0 == [0; 4]
    }

    /// True for 224.0.0.0/4.
    pub fn is_multicast(&self) -> bool {
        (self.0[0] & 0xf0) == 0xe0
    }
}

fn parse_token(token: &str, rng: &Rng) -> Option<u8> {
    if let Some(rest) = token.strip_prefix('*') {
        if rest.is_empty() {
            return Some(rng.u8());
        }
        let (lo, hi) = lex::bracket_range(rest, 10)?;
        if lo > 255 || hi > 255 || lo > hi {
            return None;
        }
        Some(rng.range_u8(lo as u8, hi as u8))
    } else {
        lex::str_to_u8(token, 10)
    }
}

impl core::fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}
