//! RFC 1071 internet checksum.
//!
//! The sum is accumulated over 16 bit big-endian words in a `u32`,
//! folded twice and complemented. Because one's complement addition is
//! associative, a pseudo-header and the covered protocol header can be
//! summed separately in any order, as long as only the final range has
//! an odd length.
//!
//! The returned `u16` is in big-endian numeric convention; callers
//! write it to the wire with `to_be_bytes`.

/// Accumulator for a 16 bit one's complement sum.
///
/// The partial sum is kept in a `u64`, so no carry handling is needed
/// while words are added; all carries are folded at the end.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InetSum {
    sum: u64,
}

impl InetSum {
    /// Empty sum.
    #[inline]
    pub fn new() -> InetSum {
        InetSum { sum: 0 }
    }

    /// Add a slice. If the length is odd the last byte is padded
    /// with zero, so only the final added range may be odd.
    #[inline]
    pub fn add_slice(mut self, slice: &[u8]) -> InetSum {
        let mut chunks = slice.chunks_exact(2);
        for pair in &mut chunks {
            self.sum += u16::from_be_bytes([pair[0], pair[1]]) as u64;
        }
        if let [last] = chunks.remainder() {
            self.sum += u16::from_be_bytes([*last, 0]) as u64;
        }
        self
    }

    /// Add a single 16 bit word.
    #[inline]
    pub fn add_u16(mut self, value: u16) -> InetSum {
        self.sum += value as u64;
        self
    }

    /// Fold the carries and complement.
    #[inline]
    pub fn finalize(self) -> u16 {
        let mut sum = self.sum;
        while sum > 0xffff {
            sum = (sum >> 16) + (sum & 0xffff);
        }
        !(sum as u16)
    }

    /// Like [`finalize`](Self::finalize), but a zero result becomes
    /// 0xFFFF (zero is the reserved "no checksum" value in UDP).
    #[inline]
    pub fn finalize_no_zero(self) -> u16 {
        match self.finalize() {
            0 => 0xffff,
            v => v,
        }
    }
}

/// Checksum over a sequence of byte ranges.
///
/// Only the last range may have an odd length; an odd range in the
/// middle would shift all following words by one byte.
pub fn rfc1071(parts: &[&[u8]]) -> u16 {
    debug_assert!(
        parts
            .iter()
            .rev()
            .skip(1)
            .all(|p| p.len() % 2 == 0),
        "only the last range may have odd length"
    );
    parts
        .iter()
        .fold(InetSum::new(), |sum, part| sum.add_slice(part))
        .finalize()
}
