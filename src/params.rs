//! Parameter list of one instruction: `name=value, name, ...`.
//!
//! The list keeps the declaration order, tracks which entries an
//! encoder consumed (leftovers are reported as
//! [`ParamError::UnusedParameter`]) and resolves values lazily through
//! typed accessors. Random wildcards are drawn once at first access
//! and memoized on the parameter, so re-reading the same parameter
//! within one instruction returns the same value.

use std::cell::{Cell, OnceCell};

use crate::err::ParamError;
use crate::lex;
use crate::rng::Rng;
use crate::span::Span;
use crate::val::{Ipv4Address, Ipv6Address, MacAddress, Uuid};

/// Default byte count of a bare `*` stream value.
const DEFAULT_RANDOM_STREAM_LEN: usize = 32;

/// One `name=value` entry (or a bare `name`, which counts as the
/// boolean value `1`).
#[derive(Debug)]
pub struct Parameter<'a> {
    name: &'a str,
    value: &'a str,
    name_span: Span,
    value_span: Span,
    index: usize,
    cache: OnceCell<Decoded>,
    stream: OnceCell<Vec<u8>>,
}

#[derive(Copy, Clone, Debug)]
enum Decoded {
    Int(u64),
    Float(f64),
    Mac(MacAddress),
    V4(Ipv4Address),
    V6(Ipv6Address),
}

/// Wildcard forms a value can take.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Wildcard {
    /// Not a wildcard at all.
    No,
    /// A bare `*`.
    Bare,
    /// `*N`: N random bytes.
    Len(u16),
    /// `*[lo-hi]`: a number drawn from the inclusive range.
    Range(u64, u64),
}

/// Resolved form of a value that may be either plain bytes or an
/// embedded instruction (`<...>`).
#[derive(Debug)]
pub enum StreamOrInstruction<'a> {
    /// Literal, hex or random bytes.
    Stream(&'a [u8]),
    /// The text between `<` and `>` plus its offset in the outer
    /// instruction (for error positions).
    Instruction {
        /// Embedded instruction text.
        text: &'a str,
        /// Byte offset of `text` within the outer instruction.
        offset: usize,
    },
}

impl<'a> Parameter<'a> {
    /// Parameter name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Raw value text.
    pub fn value(&self) -> &'a str {
        self.value
    }

    /// Span of the name within the instruction.
    pub fn name_span(&self) -> Span {
        self.name_span
    }

    /// Span of the value within the instruction.
    pub fn value_span(&self) -> Span {
        self.value_span
    }

    fn bad_format(&self) -> ParamError {
        ParamError::BadFormat {
            value: self.value.to_string(),
            span: self.value_span,
        }
    }

    fn range_violation(&self) -> ParamError {
        ParamError::RangeViolation {
            value: self.value.to_string(),
            span: self.value_span,
        }
    }

    /// Span and error for the suffix behind the `*`.
    fn wildcard_suffix_err(&self, range: bool) -> ParamError {
        let span = Span::new(self.value_span.start + 1, self.value_span.len - 1);
        let value = self.value[1..].to_string();
        if range {
            ParamError::RangeViolation { value, span }
        } else {
            ParamError::BadFormat { value, span }
        }
    }

    /// Classify the value's wildcard form.
    fn wildcard(&self) -> Result<Wildcard, ParamError> {
        let Some(suffix) = self.value.strip_prefix('*') else {
            return Ok(Wildcard::No);
        };
        if suffix.is_empty() {
            return Ok(Wildcard::Bare);
        }
        if suffix.starts_with('[') {
            let (lo, hi) = lex::bracket_range(suffix, 0)
                .ok_or_else(|| self.wildcard_suffix_err(false))?;
            if lo > hi {
                return Err(self.wildcard_suffix_err(true));
            }
            return Ok(Wildcard::Range(lo, hi));
        }
        let len = lex::parse_u64(suffix, 0).ok_or_else(|| self.wildcard_suffix_err(false))?;
        if !(1..=65535).contains(&len) {
            return Err(self.wildcard_suffix_err(true));
        }
        Ok(Wildcard::Len(len as u16))
    }

    /// Value as an unsigned integer within `[min, max]`.
    ///
    /// `*` draws a random value within the bound, `*[lo-hi]` within
    /// the given range (which must lie inside the bound). The drawn
    /// value is memoized; literals are parsed with C-style base
    /// auto-detection.
    pub fn as_u64(&self, rng: &Rng, min: u64, max: u64) -> Result<u64, ParamError> {
        debug_assert!(min <= max);
        if let Some(Decoded::Int(v)) = self.cache.get() {
            return if (min..=max).contains(v) {
                Ok(*v)
            } else {
                Err(self.range_violation())
            };
        }

        let v = match self.wildcard()? {
            Wildcard::No => {
                let v = lex::parse_u64(self.value, 0).ok_or_else(|| self.bad_format())?;
                if !(min..=max).contains(&v) {
                    return Err(self.range_violation());
                }
                v
            }
            Wildcard::Bare => rng.range_u64(min, max),
            Wildcard::Range(lo, hi) => {
                if lo < min || hi > max {
                    return Err(self.wildcard_suffix_err(true));
                }
                rng.range_u64(lo, hi)
            }
            // a byte-count suffix has no meaning for an integer
            Wildcard::Len(_) => return Err(self.wildcard_suffix_err(false)),
        };
        let _ = self.cache.set(Decoded::Int(v));
        Ok(v)
    }

    /// Value as `u32` within `[min, max]`.
    pub fn as_u32(&self, rng: &Rng, min: u32, max: u32) -> Result<u32, ParamError> {
        Ok(self.as_u64(rng, min as u64, max as u64)? as u32)
    }

    /// Value as `u16` within `[min, max]`.
    pub fn as_u16(&self, rng: &Rng, min: u16, max: u16) -> Result<u16, ParamError> {
        Ok(self.as_u64(rng, min as u64, max as u64)? as u16)
    }

    /// Value as `u8` within `[min, max]`.
    pub fn as_u8(&self, rng: &Rng, min: u8, max: u8) -> Result<u8, ParamError> {
        Ok(self.as_u64(rng, min as u64, max as u64)? as u8)
    }

    /// Full-range `u32`.
    pub fn as_u32_any(&self, rng: &Rng) -> Result<u32, ParamError> {
        self.as_u32(rng, 0, u32::MAX)
    }

    /// Full-range `u16`.
    pub fn as_u16_any(&self, rng: &Rng) -> Result<u16, ParamError> {
        self.as_u16(rng, 0, u16::MAX)
    }

    /// Full-range `u8`.
    pub fn as_u8_any(&self, rng: &Rng) -> Result<u8, ParamError> {
        self.as_u8(rng, 0, u8::MAX)
    }

    /// Full-range `u64`.
    pub fn as_u64_any(&self, rng: &Rng) -> Result<u64, ParamError> {
        self.as_u64(rng, 0, u64::MAX)
    }

    /// Value as `f64` within `[min, max]`. No wildcard forms.
    pub fn as_f64(&self, min: f64, max: f64) -> Result<f64, ParamError> {
        if let Some(Decoded::Float(v)) = self.cache.get() {
            return if (min..=max).contains(v) {
                Ok(*v)
            } else {
                Err(self.range_violation())
            };
        }
        let v: f64 = self.value.parse().map_err(|_| self.bad_format())?;
        if !v.is_finite() {
            return Err(self.range_violation());
        }
        if v < min || v > max {
            return Err(self.range_violation());
        }
        let _ = self.cache.set(Decoded::Float(v));
        Ok(v)
    }

    /// Value as a MAC address (`*` and per-token wildcards allowed).
    pub fn as_mac(&self, rng: &Rng) -> Result<MacAddress, ParamError> {
        if let Some(Decoded::Mac(v)) = self.cache.get() {
            return Ok(*v);
        }
        let v = MacAddress::parse(self.value, rng).ok_or_else(|| self.bad_format())?;
        let _ = self.cache.set(Decoded::Mac(v));
        Ok(v)
    }

    /// Value as an IPv4 address (`*` and per-token wildcards allowed).
    pub fn as_ipv4(&self, rng: &Rng) -> Result<Ipv4Address, ParamError> {
        if let Some(Decoded::V4(v)) = self.cache.get() {
            return Ok(*v);
        }
        let v = Ipv4Address::parse(self.value, rng).ok_or_else(|| self.bad_format())?;
        let _ = self.cache.set(Decoded::V4(v));
        Ok(v)
    }

    /// Value as an IPv6 address (`*` wildcard allowed).
    pub fn as_ipv6(&self, rng: &Rng) -> Result<Ipv6Address, ParamError> {
        if let Some(Decoded::V6(v)) = self.cache.get() {
            return Ok(*v);
        }
        let v = Ipv6Address::parse(self.value, rng).ok_or_else(|| self.bad_format())?;
        let _ = self.cache.set(Decoded::V6(v));
        Ok(v)
    }

    /// Value as a UUID in its canonical string form (usually written
    /// as a quoted string in the script).
    pub fn as_uuid(&self, rng: &Rng) -> Result<Uuid, ParamError> {
        let bytes = self.as_stream(rng, 36)?;
        core::str::from_utf8(bytes)
            .ok()
            .and_then(Uuid::parse)
            .ok_or_else(|| self.bad_format())
    }

    /// Value as a byte stream of at most `max_len` bytes.
    ///
    /// Accepts a hex string, a quoted literal, `*` (32 random bytes)
    /// or `*N` (N random bytes). Random bytes are drawn once and
    /// memoized.
    pub fn as_stream(&self, rng: &Rng, max_len: usize) -> Result<&[u8], ParamError> {
        match self.as_stream_or_instruction(rng, max_len)? {
            StreamOrInstruction::Stream(bytes) => Ok(bytes),
            // an embedded packet is not a plain stream
            StreamOrInstruction::Instruction { .. } => Err(self.bad_format()),
        }
    }

    /// Like [`as_stream`](Self::as_stream), but an embedded
    /// instruction (`<...>`) is handed back for recursive compilation
    /// instead of being rejected.
    pub fn as_stream_or_instruction(
        &self,
        rng: &Rng,
        max_len: usize,
    ) -> Result<StreamOrInstruction<'_>, ParamError> {
        if self.value.starts_with('<') {
            let inner = self
                .value
                .strip_prefix('<')
                .and_then(|v| v.strip_suffix('>'))
                .ok_or_else(|| self.bad_format())?;
            return Ok(StreamOrInstruction::Instruction {
                text: inner,
                offset: self.value_span.start + 1,
            });
        }
        if self.value.starts_with('"') {
            let inner = self
                .value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or_else(|| self.bad_format())?;
            if inner.len() > max_len {
                return Err(self.range_violation());
            }
            return Ok(StreamOrInstruction::Stream(inner.as_bytes()));
        }

        let bytes = match self.stream.get() {
            Some(bytes) => bytes,
            None => {
                let bytes = match self.wildcard()? {
                    Wildcard::Bare => {
                        let mut buf = vec![0u8; DEFAULT_RANDOM_STREAM_LEN];
                        rng.fill(&mut buf);
                        buf
                    }
                    Wildcard::Len(n) => {
                        let mut buf = vec![0u8; n as usize];
                        rng.fill(&mut buf);
                        buf
                    }
                    // a numeric range is not a stream form
                    Wildcard::Range(..) => return Err(self.wildcard_suffix_err(false)),
                    Wildcard::No => {
                        lex::hex_to_bin(self.value).ok_or_else(|| self.bad_format())?
                    }
                };
                self.stream.get_or_init(|| bytes)
            }
        };
        if bytes.len() > max_len {
            return Err(self.range_violation());
        }
        Ok(StreamOrInstruction::Stream(bytes))
    }
}

/// Ordered list of the parameters of one instruction.
#[derive(Debug)]
pub struct ParameterList<'a> {
    list: Vec<Parameter<'a>>,
    used: Vec<Cell<bool>>,
}

impl<'a> ParameterList<'a> {
    /// Parse the list from `text`, starting at the `(` at byte offset
    /// `open_paren`.
    ///
    /// With `ignore_trailing` the scan stops at the matching `)` and
    /// tolerates anything after it (used for embedded instructions).
    /// On a syntax error the byte offset of the offending character is
    /// returned.
    pub fn parse(
        text: &'a str,
        open_paren: usize,
        ignore_trailing: bool,
    ) -> Result<ParameterList<'a>, usize> {
        let b = text.as_bytes();
        debug_assert_eq!(b.get(open_paren), Some(&b'('));

        let mut list = Vec::new();
        let mut p = open_paren + 1;

        while p < b.len() && b[p] != b')' {
            // parameter name
            let name_start = lex::next_key_start(text, p).ok_or(p)?;
            let name_end = lex::next_key_end(text, name_start);
            let name = &text[name_start..name_end];
            let name_span = Span::new(name_start, name_end - name_start);

            p = lex::skip_whitespace(text, name_end);
            let (value, value_span) = if matches!(b.get(p), Some(b',') | Some(b')')) {
                // parameter without value counts as boolean true
                ("1", name_span)
            } else {
                if b.get(p) != Some(&b'=') {
                    return Err(p);
                }
                let value_start = lex::next_value_start(text, p + 1).ok_or(p + 1)?;
                let value_end = match b[value_start] {
                    b'"' => find_closing_quote(text, value_start).ok_or(value_start)?,
                    b'<' => find_closing_angle(text, value_start).ok_or(value_start)?,
                    _ => lex::next_value_end(text, value_start),
                };
                p = value_end;
                (
                    &text[value_start..value_end],
                    Span::new(value_start, value_end - value_start),
                )
            };

            let index = list.len();
            list.push(Parameter {
                name,
                value,
                name_span,
                value_span,
                index,
                cache: OnceCell::new(),
                stream: OnceCell::new(),
            });

            p = lex::skip_whitespace(text, p);
            match b.get(p) {
                Some(b',') => p += 1,
                Some(b')') => {}
                _ => return Err(p.min(text.len())),
            }
        }

        if b.get(p) != Some(&b')') {
            return Err(p.min(text.len()));
        }
        if !ignore_trailing {
            let rest = lex::skip_whitespace(text, p + 1);
            if rest != text.len() {
                return Err(rest);
            }
        }

        let used = list.iter().map(|_| Cell::new(false)).collect();
        Ok(ParameterList { list, used })
    }

    fn find_from(&self, start: usize, stop: Option<&str>, name: &str) -> Option<&Parameter<'a>> {
        for n in start..self.list.len() {
            let par = &self.list[n];
            if stop == Some(par.name) {
                break;
            }
            if par.name == name {
                self.used[n].set(true);
                return Some(par);
            }
        }
        None
    }

    /// First unconsumed match for `name`, or `None`.
    pub fn opt(&self, name: &str) -> Option<&Parameter<'a>> {
        self.find_from(0, None, name)
    }

    /// First match for `name`; missing parameters are an error.
    pub fn req(&self, name: &str) -> Result<&Parameter<'a>, ParamError> {
        self.opt(name).ok_or_else(|| ParamError::UnknownParameter {
            name: name.to_string(),
        })
    }

    /// Next match for `name` after `cursor`, stopping at the next
    /// `stop` parameter (used to iterate repeated groups like several
    /// `vid=` tags with their scoped `prio=`/`dei=` values).
    pub fn opt_after(
        &self,
        cursor: &Parameter<'a>,
        stop: Option<&str>,
        name: &str,
    ) -> Option<&Parameter<'a>> {
        self.find_from(cursor.index + 1, stop, name)
    }

    /// Like [`opt_after`](Self::opt_after), but the parameter is
    /// required.
    pub fn req_after(
        &self,
        cursor: &Parameter<'a>,
        stop: Option<&str>,
        name: &str,
    ) -> Result<&Parameter<'a>, ParamError> {
        self.opt_after(cursor, stop, name)
            .ok_or_else(|| ParamError::UnknownParameter {
                name: name.to_string(),
            })
    }

    /// `u8` value of `name` in `[min, max]`, or `default` if absent.
    pub fn u8_or(
        &self,
        rng: &Rng,
        name: &str,
        min: u8,
        max: u8,
        default: u8,
    ) -> Result<u8, ParamError> {
        match self.opt(name) {
            Some(p) => p.as_u8(rng, min, max),
            None => Ok(default),
        }
    }

    /// `u16` value of `name` in `[min, max]`, or `default` if absent.
    pub fn u16_or(
        &self,
        rng: &Rng,
        name: &str,
        min: u16,
        max: u16,
        default: u16,
    ) -> Result<u16, ParamError> {
        match self.opt(name) {
            Some(p) => p.as_u16(rng, min, max),
            None => Ok(default),
        }
    }

    /// `u32` value of `name` in `[min, max]`, or `default` if absent.
    pub fn u32_or(
        &self,
        rng: &Rng,
        name: &str,
        min: u32,
        max: u32,
        default: u32,
    ) -> Result<u32, ParamError> {
        match self.opt(name) {
            Some(p) => p.as_u32(rng, min, max),
            None => Ok(default),
        }
    }

    /// `f64` value of `name` in `[min, max]`, or `default` if absent.
    /// Floats have no wildcard forms; the random source is unused.
    pub fn f64_or(
        &self,
        _rng: &Rng,
        name: &str,
        min: f64,
        max: f64,
        default: f64,
    ) -> Result<f64, ParamError> {
        match self.opt(name) {
            Some(p) => p.as_f64(min, max),
            None => Ok(default),
        }
    }

    /// Boolean flag: absent ⇒ `default`, present ⇒ value in `[0, 1]`.
    pub fn flag_or(&self, rng: &Rng, name: &str, default: bool) -> Result<bool, ParamError> {
        Ok(self.u8_or(rng, name, 0, 1, default as u8)? != 0)
    }

    /// Scoped `u8` within a repeated group (see
    /// [`opt_after`](Self::opt_after)).
    pub fn u8_group_or(
        &self,
        rng: &Rng,
        cursor: &Parameter<'a>,
        stop: &str,
        name: &str,
        min: u8,
        max: u8,
        default: u8,
    ) -> Result<u8, ParamError> {
        match self.opt_after(cursor, Some(stop), name) {
            Some(p) => p.as_u8(rng, min, max),
            None => Ok(default),
        }
    }

    /// MAC value of `name`, or `default` if absent.
    pub fn mac_or(
        &self,
        rng: &Rng,
        name: &str,
        default: MacAddress,
    ) -> Result<MacAddress, ParamError> {
        match self.opt(name) {
            Some(p) => p.as_mac(rng),
            None => Ok(default),
        }
    }

    /// IPv4 value of `name`, or `default` if absent.
    pub fn ipv4_or(
        &self,
        rng: &Rng,
        name: &str,
        default: Ipv4Address,
    ) -> Result<Ipv4Address, ParamError> {
        match self.opt(name) {
            Some(p) => p.as_ipv4(rng),
            None => Ok(default),
        }
    }

    /// IPv6 value of `name`, or `default` if absent.
    pub fn ipv6_or(
        &self,
        rng: &Rng,
        name: &str,
        default: Ipv6Address,
    ) -> Result<Ipv6Address, ParamError> {
        match self.opt(name) {
            Some(p) => p.as_ipv6(rng),
            None => Ok(default),
        }
    }

    /// Mark a parameter consumed or unconsumed. The raw encoder uses
    /// this to hand back entries it does not recognize.
    pub fn set_used(&self, par: &Parameter<'a>, used: bool) {
        self.used[par.index].set(used);
    }

    /// Error for the first parameter no encoder consumed.
    ///
    /// Called after encoding finishes; a leftover name is almost
    /// always a typo in the script.
    pub fn check_all_used(&self) -> Result<(), ParamError> {
        for (par, used) in self.list.iter().zip(&self.used) {
            if !used.get() {
                return Err(ParamError::UnusedParameter {
                    name: par.name.to_string(),
                    span: par.name_span,
                });
            }
        }
        Ok(())
    }

    /// Iterate all parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter<'a>> {
        self.list.iter()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// True when the list is empty.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// Offset just past the quote closing the string starting at `start`.
fn find_closing_quote(text: &str, start: usize) -> Option<usize> {
    let rest = &text[start + 1..];
    rest.find('"').map(|n| start + 1 + n + 1)
}

/// Offset just past the `>` matching the `<` at `start` (nesting
/// balanced, so embedded instructions can embed further packets).
fn find_closing_angle(text: &str, start: usize) -> Option<usize> {
    let b = text.as_bytes();
    let mut depth = 0usize;
    for (n, &c) in b.iter().enumerate().skip(start) {
        match c {
            b'<' => depth += 1,
            b'>' => {
                depth -= 1;
                if depth == 0 {
                    return Some(n + 1);
                }
            }
            _ => {}
        }
    }
    None
}
