use crate::lex;
use crate::rng::Rng;

/// 48 bit MAC address.
///
/// The textual form is six colon-separated hex tokens. Each token may
/// be replaced by the random wildcard `*` or a bounded random
/// `*[lo-hi]` (hex bounds); the whole value may be a single `*`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// All-zero address.
    pub const NULL: MacAddress = MacAddress([0; 6]);

    /// Broadcast address ff:ff:ff:ff:ff:ff.
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// Address from raw bytes.
    #[inline]
    pub const fn new(bytes: [u8; 6]) -> MacAddress {
        MacAddress(bytes)
    }

    /// Raw bytes.
    #[inline]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Parse the textual form, resolving random wildcards with `rng`.
    pub fn parse(s: &str, rng: &Rng) -> Option<MacAddress> {
        if s == "*" {
            return Some(MacAddress::random_unicast(rng));
        }
        // shortest valid form is "0:0:0:0:0:0"
        if s.len() < 11 {
            return None;
        }

        let mut bytes = [0u8; 6];
        let mut count = 0;
        for token in s.split(':') {
            if count == 6 || token.is_empty() {
                return None;
            }
            bytes[count] = parse_token(token, rng)?;
            count += 1;
        }
        if count != 6 {
            return None;
        }
        Some(MacAddress(bytes))
    }

    /// Random address, forced to unicast by clearing the I/G bit.
    pub fn random_unicast(rng: &Rng) -> MacAddress {
        let mut bytes = [0u8; 6];
        for b in bytes.iter_mut() {
            *b = rng.u8();
        }
        bytes[0] &= 0xfe;
        MacAddress(bytes)
    }

    /// Random address, forced to multicast by setting the I/G bit.
    pub fn random_multicast(rng: &Rng) -> MacAddress {
        let mut bytes = [0u8; 6];
        for b in bytes.iter_mut() {
            *b = rng.u8();
        }
        bytes[0] |= 0x01;
        MacAddress(bytes)
    }

    /// True for the all-zero address.
    pub fn is_null(&self) -> bool {
        self.0 == [0; 6]
    }

    /// True for ff:ff:ff:ff:ff:ff.
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    /// True when the I/G bit is set, excluding broadcast.
    pub fn is_multicast(&self) -> bool {
        (self.0[0] & 1) != 0 && !self.is_broadcast()
    }

    /// True when the I/G bit is clear.
    pub fn is_unicast(&self) -> bool {
        (self.0[0] & 1) == 0
    }
}

fn parse_token(token: &str, rng: &Rng) -> Option<u8> {
    if let Some(rest) = token.strip_prefix('*') {
        if rest.is_empty() {
            return Some(rng.u8());
        }
        let (lo, hi) = lex::bracket_range(rest, 16)?;
        if lo > 255 || hi > 255 || lo > hi {
            return None;
        }
        Some(rng.range_u8(lo as u8, hi as u8))
    } else {
        lex::str_to_u8(token, 16)
    }
}

impl core::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> Rng {
        Rng::counter(0)
    }

    #[test]
    fn parse_valid() {
        assert_eq!(
            MacAddress::parse("01:02:03:04:05:06", &rng()),
            Some(MacAddress([1, 2, 3, 4, 5, 6]))
        );
        assert_eq!(
            MacAddress::parse("11:a2:33:44:55:66", &rng()),
            Some(MacAddress([0x11, 0xa2, 0x33, 0x44, 0x55, 0x66]))
        );
    }

    #[test]
    fn parse_invalid() {
        let r = rng();
        assert_eq!(MacAddress::parse("", &r), None);
        assert_eq!(MacAddress::parse("11:22:33:44:55:66:77", &r), None);
        assert_eq!(MacAddress::parse("11:a2:3g:44:55:66", &r), None);
        assert_eq!(MacAddress::parse("11:a2:g3:44:55:66", &r), None);
        assert_eq!(MacAddress::parse("11:22:33:44:55", &r), None);
        assert_eq!(MacAddress::parse("00:*[aa-100]:02:*[cc-cd]:04:*[ee-ef]", &r), None);
    }

    #[test]
    fn parse_random_tokens() {
        let r = rng();
        let m = MacAddress::parse("00:*[1-2]:02:*[1-2]:04:*[1-2]", &r).unwrap();
        assert_eq!(m.0[0], 0);
        assert_eq!(m.0[2], 2);
        assert_eq!(m.0[4], 4);
        assert!(m.0[1] == 1 || m.0[1] == 2);
        assert!(m.0[3] == 1 || m.0[3] == 2);
        assert!(m.0[5] == 1 || m.0[5] == 2);

        let m = MacAddress::parse("00:*[aa-ab]:02:*[cc-cd]:04:*[ee-ef]", &r).unwrap();
        assert!(m.0[1] == 0xaa || m.0[1] == 0xab);
        assert!(m.0[3] == 0xcc || m.0[3] == 0xcd);
        assert!(m.0[5] == 0xee || m.0[5] == 0xef);
    }

    #[test]
    fn predicates() {
        assert!(MacAddress::NULL.is_null());
        assert!(MacAddress::BROADCAST.is_broadcast());
        assert!(!MacAddress::BROADCAST.is_multicast());
        assert!(MacAddress([0x01, 0xff, 0xff, 0xff, 0xff, 0xff]).is_multicast());
        assert!(!MacAddress([0x80, 0xff, 0xff, 0xff, 0xff, 0xff]).is_multicast());
        assert!(MacAddress([0x80, 0, 0, 0, 0, 0]).is_unicast());
    }

    #[test]
    fn random_bit_forcing() {
        let r = Rng::new();
        for _ in 0..100 {
            assert!(MacAddress::random_unicast(&r).is_unicast());
            let m = MacAddress::random_multicast(&r);
            assert!(m.is_multicast() || m.is_broadcast());
        }
    }

    #[test]
    fn display() {
        assert_eq!(
            format!("{}", MacAddress([0x01, 0x80, 0xc2, 0, 0, 0x0e])),
            "01:80:c2:00:00:0e"
        );
    }

    #[test]
    fn display_parse_round_trip() {
        let r = Rng::new();
        for _ in 0..100 {
            let m = MacAddress::random_unicast(&r);
            assert_eq!(MacAddress::parse(&m.to_string(), &r), Some(m));
        }
    }
}
