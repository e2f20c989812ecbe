//! A library for compiling human-written packet scripts into bit-exact
//! Ethernet frames (Ethernet II, VLAN, ARP, IPv4, IPv6, UDP, TCP, ICMP,
//! IGMP, VRRP, STP, VXLAN, GRE, LLDP ...).
//!
//! A script describes packets at OSI layers 2-4, one instruction per
//! packet:
//!
//! ```text
//! eth(dmac=11:22:33:44:55:66, ethertype=0x8123, payload=1234567890abcdef);
//! +1000: ipv4(dip=1.2.3.4, protocol=254, payload=12345678);
//! # comment
//! 5000: arp-announce(dip=10.0.0.1);
//! ```
//!
//! Each instruction names a protocol and a `name=value` parameter
//! list; values may be literals, random wildcards (`*`, `*N`,
//! `*[lo-hi]`), quoted text or embedded instructions (`<...>`). The
//! compiler resolves the parameters, assembles the on-wire bytes
//! (checksums, length fields, IPv4 fragmentation included) and stamps
//! every packet with a transmission offset driven by the optional
//! leading timestamps (`+n:` relative, `n:` absolute).
//!
//! # Usage
//!
//! ```
//! use std::path::Path;
//! use pktforge::{Compiler, Context, Linkable, Micros, Settings};
//!
//! let mut settings = Settings::new();
//! settings.set_my_mac(pktforge::MacAddress([0x02, 0, 0, 0, 0, 1]));
//! let ctx = Context::new(settings);
//!
//! let mut compiler = Compiler::new(&ctx, Micros::from_ms(1), 1, false);
//! compiler
//!     .add_script_text(
//!         "eth(dmac=ff:ff:ff:ff:ff:ff, ethertype=0x88b5, payload=0102);",
//!         Path::new("<demo>"),
//!     )
//!     .unwrap();
//!
//! for timed in &compiler.finish().packets {
//!     for frame in timed.packet.frames() {
//!         // hand frame.bytes() to a raw socket or pcap writer
//!         assert!(frame.len() >= 14);
//!     }
//! }
//! ```
//!
//! The compilation pipeline is the whole of this crate; putting the
//! frames on a wire (raw sockets, scheduling) is left to the embedding
//! application. [`PcapWriter`](pcap::PcapWriter) covers the capture
//! file sink.

/// Error types that can be triggered.
pub mod err;

/// RFC 1071 internet checksum.
pub mod checksum;

/// Classic libpcap file reading and writing.
pub mod pcap;

mod ctx;
mod lex;
mod packet;
mod params;
mod rng;
mod script;
mod span;
mod val;

pub use crate::ctx::{Context, Settings, DEFAULT_MTU};
pub use crate::packet::*;
pub use crate::params::{Parameter, ParameterList, StreamOrInstruction};
pub use crate::rng::Rng;
pub use crate::script::*;
pub use crate::span::Span;
pub use crate::val::*;

#[cfg(test)]
mod compile_tests {
    //! End-to-end vectors: instruction text in, exact frame bytes out.

    use super::*;
    use assert_matches::assert_matches;
    use std::path::Path;

    /// Context with the reference host facts used by the byte vectors:
    /// own MAC ba:ba:ba:ba:ba:ba, own IPv4 10.10.10.10.
    fn ctx() -> Context {
        let mut settings = Settings::new();
        settings.set_my_mac(MacAddress([0xba; 6]));
        settings.set_my_ipv4(Ipv4Address([10, 10, 10, 10]));
        Context::new(settings)
    }

    fn compile(instruction: &str) -> Vec<Vec<u8>> {
        let ctx = ctx();
        let compiled = InstructionParser::new(&ctx, false)
            .parse(instruction)
            .unwrap_or_else(|e| panic!("{instruction:?} failed:\n{e}"));
        compiled
            .packet
            .frames()
            .iter()
            .map(|f| f.bytes().to_vec())
            .collect()
    }

    fn compile_err(instruction: &str) -> err::ParseError {
        let ctx = ctx();
        InstructionParser::new(&ctx, false)
            .parse(instruction)
            .err()
            .unwrap_or_else(|| panic!("{instruction:?} should fail"))
    }

    #[track_caller]
    fn assert_frame(instruction: &str, expected: &[u8]) {
        let frames = compile(instruction);
        assert_eq!(frames.len(), 1, "{instruction:?}");
        assert_eq!(frames[0], expected, "{instruction:?}");
    }

    #[test]
    fn eth_with_ethertype() {
        assert_frame(
            "eth( dmac=11:22:33:44:55:66, smac=aa:bb:cc:dd:ee:ff, ethertype=0x8123, payload=1234567890abcdef)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x81,
                0x23, 0x12, 0x34, 0x56, 0x78, 0x90, 0xab, 0xcd, 0xef,
            ],
        );
    }

    #[test]
    fn eth_smac_defaults_to_own() {
        assert_frame(
            "eth(dmac=11:22:33:44:55:66, ethertype=0x8123, payload=1234567890abcdef)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xba, 0xba, 0xba, 0xba, 0xba, 0xba, 0x81,
                0x23, 0x12, 0x34, 0x56, 0x78, 0x90, 0xab, 0xcd, 0xef,
            ],
        );
    }

    #[test]
    fn eth_without_ethertype_writes_length() {
        assert_frame(
            "eth(dmac=11:22:33:44:55:66, smac=aa:bb:cc:dd:ee:ff, payload=1234567890abcdef)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00,
                0x08, 0x12, 0x34, 0x56, 0x78, 0x90, 0xab, 0xcd, 0xef,
            ],
        );
    }

    #[test]
    fn raw_stream_is_the_whole_frame() {
        assert_frame(
            "raw(stream = 112233445566aabbccddeeff81231234567890abcdef)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x81,
                0x23, 0x12, 0x34, 0x56, 0x78, 0x90, 0xab, 0xcd, 0xef,
            ],
        );
    }

    #[test]
    fn eth_single_vlan() {
        assert_frame(
            "eth(dmac=11:22:33:44:55:66, smac=aa:bb:cc:dd:ee:ff, vid=1, ethertype=0x8123, payload=1234567890abcdef)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x81,
                0x00, 0x00, 0x01, 0x81, 0x23, 0x12, 0x34, 0x56, 0x78, 0x90, 0xab, 0xcd, 0xef,
            ],
        );
    }

    #[test]
    fn eth_vlan_priority() {
        assert_frame(
            "eth(dmac=11:22:33:44:55:66, smac=aa:bb:cc:dd:ee:ff, vid=42, prio=3, ethertype=0x8123, payload=1234567890abcdef)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x81,
                0x00, 0x60, 0x2a, 0x81, 0x23, 0x12, 0x34, 0x56, 0x78, 0x90, 0xab, 0xcd, 0xef,
            ],
        );
    }

    #[test]
    fn eth_llc() {
        assert_frame(
            "eth(dmac=11:22:33:44:55:66, smac=aa:bb:cc:dd:ee:ff, dsap = 0x12, ssap = 0x34, control = 0x11, payload = 1122)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00,
                0x06, 0x12, 0x34, 0x00, 0x11, 0x11, 0x22,
            ],
        );
    }

    #[test]
    fn eth_llc_with_vlan() {
        assert_frame(
            "eth(dmac=11:22:33:44:55:66, smac=aa:bb:cc:dd:ee:ff, vid=42, vtype=1, prio=3, dsap = 0x12, ssap = 0x34, control = 0x11, payload = 1122)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x81,
                0x00, 0x60, 0x2a, 0x00, 0x06, 0x12, 0x34, 0x00, 0x11, 0x11, 0x22,
            ],
        );
    }

    #[test]
    fn eth_snap() {
        assert_frame(
            "eth(dmac=11:22:33:44:55:66, smac=aa:bb:cc:dd:ee:ff, oui = 0x808182, protocol = 0x34, payload = 1234567890abcdef)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00,
                0x10, 0xaa, 0xaa, 0x03, 0x80, 0x81, 0x82, 0x00, 0x34, 0x12, 0x34, 0x56, 0x78,
                0x90, 0xab, 0xcd, 0xef,
            ],
        );
    }

    #[test]
    fn eth_double_tagged() {
        assert_frame(
            "eth(dmac=11:22:33:44:55:66, smac=aa:bb:cc:dd:ee:ff, vid=100, vtype=2, vid=42, prio=3, ethertype=0x8123, payload=1234567890abcdef)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x88,
                0xa8, 0x00, 0x64, 0x81, 0x00, 0x60, 0x2a, 0x81, 0x23, 0x12, 0x34, 0x56, 0x78,
                0x90, 0xab, 0xcd, 0xef,
            ],
        );
    }

    #[test]
    fn arp_full() {
        assert_frame(
            "arp(op=1, smac=10:22:33:44:55:66, sip=192.168.0.166, dmac=01:02:03:04:05:06, dip=1.2.3.4)",
            &[
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x10, 0x22, 0x33, 0x44, 0x55, 0x66, 0x08,
                0x06, 0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 0x10, 0x22, 0x33, 0x44,
                0x55, 0x66, 0xc0, 0xa8, 0x00, 0xa6, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x01,
                0x02, 0x03, 0x04,
            ],
        );
    }

    #[test]
    fn arp_without_target_mac_broadcasts() {
        assert_frame(
            "arp(op=1, smac=10:22:33:44:55:66, sip=192.168.0.166, dip=1.2.3.4)",
            &[
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x10, 0x22, 0x33, 0x44, 0x55, 0x66, 0x08,
                0x06, 0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 0x10, 0x22, 0x33, 0x44,
                0x55, 0x66, 0xc0, 0xa8, 0x00, 0xa6, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
                0x02, 0x03, 0x04,
            ],
        );
    }

    #[test]
    fn arp_defaults() {
        assert_frame(
            "arp(dip=11.22.33.44)",
            &[
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xba, 0xba, 0xba, 0xba, 0xba, 0xba, 0x08,
                0x06, 0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 0xba, 0xba, 0xba, 0xba,
                0xba, 0xba, 0x0a, 0x0a, 0x0a, 0x0a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0b,
                0x16, 0x21, 0x2c,
            ],
        );
    }

    #[test]
    fn arp_reply_opcode() {
        assert_frame(
            "arp(op=2, dip=11.22.33.44)",
            &[
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xba, 0xba, 0xba, 0xba, 0xba, 0xba, 0x08,
                0x06, 0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x02, 0xba, 0xba, 0xba, 0xba,
                0xba, 0xba, 0x0a, 0x0a, 0x0a, 0x0a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0b,
                0x16, 0x21, 0x2c,
            ],
        );
    }

    #[test]
    fn arp_with_vlan() {
        assert_frame(
            "arp(vid=12, dip=11.22.33.44)",
            &[
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xba, 0xba, 0xba, 0xba, 0xba, 0xba, 0x81,
                0x00, 0x00, 0x0c, 0x08, 0x06, 0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01,
                0xba, 0xba, 0xba, 0xba, 0xba, 0xba, 0x0a, 0x0a, 0x0a, 0x0a, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x0b, 0x16, 0x21, 0x2c,
            ],
        );
    }

    #[test]
    fn arp_probe() {
        assert_frame(
            "arp-probe(dip=11.22.33.44)",
            &[
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xba, 0xba, 0xba, 0xba, 0xba, 0xba, 0x08,
                0x06, 0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 0xba, 0xba, 0xba, 0xba,
                0xba, 0xba, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0b,
                0x16, 0x21, 0x2c,
            ],
        );
    }

    #[test]
    fn arp_announce() {
        assert_frame(
            "arp-announce(dip=11.22.33.44)",
            &[
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xba, 0xba, 0xba, 0xba, 0xba, 0xba, 0x08,
                0x06, 0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 0xba, 0xba, 0xba, 0xba,
                0xba, 0xba, 0x0b, 0x16, 0x21, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0b,
                0x16, 0x21, 0x2c,
            ],
        );
    }

    #[test]
    fn arp_announce_defaults_to_own_ip() {
        assert_frame(
            "arp-announce()",
            &[
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xba, 0xba, 0xba, 0xba, 0xba, 0xba, 0x08,
                0x06, 0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 0xba, 0xba, 0xba, 0xba,
                0xba, 0xba, 0x0a, 0x0a, 0x0a, 0x0a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0a,
                0x0a, 0x0a, 0x0a,
            ],
        );
    }

    #[test]
    fn ipv4_raw() {
        assert_frame(
            "ipv4(dmac = 11:22:33:44:55:66, dip=1.2.3.4, protocol=254, payload=12345678)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xba, 0xba, 0xba, 0xba, 0xba, 0xba, 0x08,
                0x00, 0x45, 0x00, 0x00, 0x18, 0x00, 0x00, 0x00, 0x00, 0x40, 0xfe, 0x61, 0xcf,
                0x0a, 0x0a, 0x0a, 0x0a, 0x01, 0x02, 0x03, 0x04, 0x12, 0x34, 0x56, 0x78,
            ],
        );
    }

    #[test]
    fn ipv4_with_vlan() {
        assert_frame(
            "ipv4(vid=42, dmac = 11:22:33:44:55:66, dip=1.2.3.4, protocol=254, payload=12345678)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xba, 0xba, 0xba, 0xba, 0xba, 0xba, 0x81,
                0x00, 0x00, 0x2a, 0x08, 0x00, 0x45, 0x00, 0x00, 0x18, 0x00, 0x00, 0x00, 0x00,
                0x40, 0xfe, 0x61, 0xcf, 0x0a, 0x0a, 0x0a, 0x0a, 0x01, 0x02, 0x03, 0x04, 0x12,
                0x34, 0x56, 0x78,
            ],
        );
    }

    #[test]
    fn ipv4_header_fields() {
        assert_frame(
            "ipv4(smac=80:12:34:45:67:89, dmac = 11:22:33:44:55:66, sip=192.168.0.1, dip=172.16.1.2, ttl=200, dscp=16, ecn=1, df=1, protocol=254, payload=12345678)",
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x80, 0x12, 0x34, 0x45, 0x67, 0x89, 0x08,
                0x00, 0x45, 0x41, 0x00, 0x18, 0x00, 0x00, 0x40, 0x00, 0xc8, 0xfe, 0x43, 0xeb,
                0xc0, 0xa8, 0x00, 0x01, 0xac, 0x10, 0x01, 0x02, 0x12, 0x34, 0x56, 0x78,
            ],
        );
    }

    #[test]
    fn raw_endianness() {
        assert_frame(
            "raw(be16=0x1234, be16=0x1234, le16=0x1234)",
            &[0x12, 0x34, 0x12, 0x34, 0x34, 0x12],
        );
    }

    #[test]
    fn raw_all_value_kinds() {
        assert_frame(
            "raw(byte=0x55, be16=0x1234, le16=0x1234, be32=0x11223344, le32=0x11223344, be64=0x0123456789abcdef, le64=0x0123456789abcdef, ip4=1.2.3.4, ip6=1002:3004:5006:7008:900A:B00C:D00E:F001, mac=10:20:30:40:50:60, stream=\"Hello World\")",
            &[
                0x55, 0x12, 0x34, 0x34, 0x12, 0x11, 0x22, 0x33, 0x44, 0x44, 0x33, 0x22, 0x11,
                0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0xef, 0xcd, 0xab, 0x89, 0x67,
                0x45, 0x23, 0x01, 0x01, 0x02, 0x03, 0x04, 0x10, 0x02, 0x30, 0x04, 0x50, 0x06,
                0x70, 0x08, 0x90, 0x0a, 0xb0, 0x0c, 0xd0, 0x0e, 0xf0, 0x01, 0x10, 0x20, 0x30,
                0x40, 0x50, 0x60, 0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x20, 0x57, 0x6f, 0x72, 0x6c,
                0x64,
            ],
        );
    }

    #[test]
    fn unused_parameter_is_rejected() {
        let e = compile_err("eth(dmac=11:22:33:44:55:66, foo=1, payload=aa)");
        assert_eq!(e.message, "Unexpected parameter");
        // the caret points at "foo"
        assert_eq!(&e.instruction[e.span.start..e.span.end()], "foo");
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        let e = compile_err("nonsense(dmac=11:22:33:44:55:66)");
        assert_eq!(e.message, "Unknown protocol type");
    }

    #[test]
    fn missing_parameter_is_rejected() {
        let e = compile_err("udp(dip=1.2.3.4, dport=80)");
        assert_eq!(e.message, "Missing parameter");
        assert_eq!(e.details.as_deref(), Some("sport"));
    }

    #[test]
    fn syntax_error_positions() {
        let e = compile_err("eth(dmac=11:22:33:44:55:66 payload=aa)");
        assert_eq!(e.message, "Syntax error");
    }

    #[test]
    fn timestamp_needs_colon() {
        let e = compile_err("1000 eth(dmac=11:22:33:44:55:66, payload=aa)");
        assert_eq!(e.message, "Expected ':' after timestamp");
    }

    #[test]
    fn timestamps_are_parsed() {
        let ctx = ctx();
        let compiled = InstructionParser::new(&ctx, false)
            .parse(" +1000 : eth(dmac=11:22:33:44:55:66, payload=aa)")
            .unwrap();
        assert!(compiled.has_timestamp);
        assert!(!compiled.is_absolute);
        assert_eq!(compiled.timestamp, 1000);

        let compiled = InstructionParser::new(&ctx, false)
            .parse("5000: eth(dmac=11:22:33:44:55:66, payload=aa)")
            .unwrap();
        assert!(compiled.is_absolute);
        assert_eq!(compiled.timestamp, 5000);

        let compiled = InstructionParser::new(&ctx, false)
            .parse("eth(dmac=11:22:33:44:55:66, payload=aa)")
            .unwrap();
        assert!(!compiled.has_timestamp);
    }

    #[test]
    fn udp_datagram() {
        let frames = compile(
            "udp(dmac=11:22:33:44:55:66, sip=1.2.3.4, dip=10.20.30.40, sport=1, dport=2, payload=0123456789abcdef0123456789abcdef)",
        );
        let l4 = &frames[0][14 + 20..];
        assert_eq!(&l4[..8], &[0x00, 0x01, 0x00, 0x02, 0x00, 0x18, 0x97, 0x2e]);
    }

    #[test]
    fn udp_fragmentation_law() {
        // 4000 payload bytes over MTU 1500: ceil(4008 / 1480) = 3 frames
        let payload: String = "ab".repeat(4000);
        let frames = compile(&format!(
            "udp(dmac=11:22:33:44:55:66, dip=1.2.3.4, sport=7, dport=7, payload={payload})"
        ));
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].len(), 14 + 1500);
        assert_eq!(frames[1].len(), 14 + 1500);
    }

    #[test]
    fn tcp_syn_shortcut() {
        let frames = compile(
            "tcp-syn(dmac=11:22:33:44:55:66, dip=1.2.3.4, sport=1024, dport=80)",
        );
        let l4 = &frames[0][14 + 20..];
        assert_eq!(l4.len(), 20);
        // seq 0, ack 0, SYN, window 1024
        assert_eq!(&l4[4..8], &[0, 0, 0, 0]);
        assert_eq!(&l4[8..12], &[0, 0, 0, 0]);
        assert_eq!(l4[13], 0x02);
        assert_eq!(&l4[14..16], &[0x04, 0x00]);
    }

    #[test]
    fn tcp_fin_ack_shortcut() {
        let frames = compile(
            "tcp-fin-ack(dmac=11:22:33:44:55:66, dip=1.2.3.4, sport=1024, dport=80)",
        );
        let l4 = &frames[0][14 + 20..];
        assert_eq!(&l4[4..8], &[0, 0, 0, 1]);
        assert_eq!(&l4[8..12], &[0, 0, 0, 2]);
        assert_eq!(l4[13], 0x11);
    }

    #[test]
    fn vxlan_encapsulation() {
        let frames = compile(
            "vxlan(dmac=11:22:33:44:55:66, dip=1.2.3.4, sport=333, vni=7, payload=<eth(dmac=ff:ff:ff:ff:ff:ff, smac=02:00:00:00:00:01, ethertype=0x88b5, payload=aabb)>)",
        );
        let l4 = &frames[0][14 + 20..];
        // default destination port
        assert_eq!(&l4[2..4], &[0x12, 0xb5]);
        let vxlan = &l4[8..];
        assert_eq!(vxlan[0], 0x08);
        assert_eq!(&vxlan[4..8], &[0, 0, 7, 0]);
        // the embedded frame follows verbatim
        assert_eq!(&vxlan[8..14], &[0xff; 6]);
        assert_eq!(&vxlan[20..22], &[0x88, 0xb5]);
        assert_eq!(&vxlan[22..24], &[0xaa, 0xbb]);
    }

    #[test]
    fn gre_with_embedded_ipv4() {
        let frames = compile(
            "gre(dmac=11:22:33:44:55:66, dip=1.2.3.4, protocol=0x0800, payload=<ipv4(dip=2.3.4.5, protocol=254, payload=11)>)",
        );
        let l4 = &frames[0][14 + 20..];
        assert_eq!(&l4[..4], &[0x00, 0x00, 0x08, 0x00]);
        // the embedded packet contributes its IP payload only
        assert_eq!(l4[4], 0x45);
    }

    #[test]
    fn recursion_limit() {
        let mut inner = "raw(byte=1)".to_string();
        for _ in 0..9 {
            inner = format!("vxlan(dip=1.2.3.4, dmac=01:02:03:04:05:06, sport=1, payload=<{inner}>)");
        }
        let e = compile_err(&inner);
        assert_eq!(e.message, "Maximum depth of embedded instructions reached");
    }

    #[test]
    fn multicast_destination_derives_mac() {
        let frames = compile("udp(dip=224.1.2.3, sport=1, dport=2, payload=00)");
        assert_eq!(&frames[0][..6], &[0x01, 0x00, 0x5e, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn random_parameters_are_deterministic_in_counter_mode() {
        let mut settings = Settings::new();
        settings.set_my_mac(MacAddress([0xba; 6]));
        settings.set_my_ipv4(Ipv4Address([10, 10, 10, 10]));
        let ctx = Context::with_counter_rng(settings, 0);
        let compiled = InstructionParser::new(&ctx, false)
            .parse("eth(dmac=11:22:33:44:55:66, payload=*4)")
            .unwrap();
        let frame = compiled.packet.frames()[0].bytes().to_vec();
        // counter mode fills 0, 1, 2, 3
        assert_eq!(&frame[14..], &[0, 1, 2, 3]);
    }

    #[test]
    fn lldp_default_frame() {
        let frames = compile("lldp()");
        let frame = &frames[0];
        assert_eq!(&frame[..6], &[0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e]);
        assert_eq!(&frame[12..14], &[0x88, 0xcc]);
        // chassis id (own mac), port id (own mac), ttl 120, end
        assert_eq!(
            &frame[14..],
            &[
                0x02, 0x07, 0x04, 0xba, 0xba, 0xba, 0xba, 0xba, 0xba, 0x04, 0x07, 0x03, 0xba,
                0xba, 0xba, 0xba, 0xba, 0xba, 0x06, 0x02, 0x00, 0x78, 0x00, 0x00,
            ]
        );
    }

    #[test]
    fn lldp_mrp_domain_digest() {
        // the MRP domain UUID is the MD5 of the domain string as a
        // version 3 UUID
        let frames = compile("lldp(mrpdomain=\"ring-1\", mrpstate=1)");
        let payload = &frames[0][14..];
        // find the org-specific TLV (type 127, profinet subtype 4)
        let mut pos = 0;
        let mut found = None;
        while pos + 2 <= payload.len() {
            let word = u16::from_be_bytes([payload[pos], payload[pos + 1]]);
            let (t, l) = ((word >> 9) as u8, (word & 0x1ff) as usize);
            if t == 127 && payload[pos + 2..pos + 5] == [0x00, 0x0e, 0xcf] && payload[pos + 5] == 4
            {
                found = Some(&payload[pos + 6..pos + 2 + l]);
                break;
            }
            pos += 2 + l;
        }
        let tlv = found.expect("MRP port status TLV missing");
        // version-3 UUID: version nibble forced
        assert_eq!(tlv[6] >> 4, 3);
        assert_eq!(tlv[8] & 0xc0, 0x80);
        assert_eq!(&tlv[16..18], &[0x00, 0x01]);
    }

    #[test]
    fn scripted_compile_end_to_end() {
        let ctx = ctx();
        let mut compiler = Compiler::new(&ctx, Micros::ZERO, 1, false);
        compiler
            .add_script_text(
                "eth(dmac=11:22:33:44:55:66, ethertype=0x8123, payload=1234567890abcdef);\n\
                 +1000: ipv4(dmac=11:22:33:44:55:66, dip=1.2.3.4, protocol=254, payload=12345678);\n\
                 # comment\n\
                 5000: arp-announce(dip=10.0.0.1);\n",
                Path::new("example.pf"),
            )
            .unwrap();
        let data = compiler.finish();
        assert_eq!(data.len(), 3);
        assert!(data.has_user_timestamps);
        assert_eq!(data.packets[1].delay, Micros::from_us(1000));
        // absolute 5000 with clock at 1000
        assert_eq!(data.packets[2].delay, Micros::from_us(4000));
        assert_eq!(data.packets[0].packet.frames()[0].len(), 22);
    }

    #[test]
    fn igmp_query_forces_ip_options() {
        let frames = compile("igmp-query()");
        let ip = &frames[0][14..];
        // router alert option, dscp 48, ttl 1
        assert_eq!(ip[0], 0x46);
        assert_eq!(ip[1], 0xc0);
        assert_eq!(ip[8], 1);
        assert_eq!(&ip[20..24], &[0x94, 0x04, 0x00, 0x00]);
    }

    #[test]
    fn vrrp_advertisement() {
        let frames = compile("vrrp(vrip=192.168.0.100, vrid=7)");
        let frame = &frames[0];
        assert_eq!(&frame[..6], &[0x00, 0x00, 0x5e, 0x00, 0x01, 0x07]);
        let ip = &frame[14..];
        assert_eq!(ip[8], 255);
        assert_eq!(&ip[16..20], &[224, 0, 0, 18]);
    }

    #[test]
    fn stp_defaults() {
        let frames = compile("stp()");
        let frame = &frames[0];
        assert_eq!(&frame[..6], &[0x01, 0x80, 0xc2, 0x00, 0x00, 0x00]);
        let bpdu = &frame[17..];
        assert_eq!(bpdu.len(), 35);
        // root path cost default 4
        assert_eq!(&bpdu[13..17], &[0, 0, 0, 4]);
        // max age 20s in 1/256 units
        assert_eq!(&bpdu[29..31], &[0x14, 0x00]);
    }

    #[test]
    fn icmp_echo() {
        let frames = compile("icmp-echo(dmac=11:22:33:44:55:66, dip=1.2.3.4, id=7, seq=9)");
        let l4 = &frames[0][14 + 20..];
        assert_eq!(l4[0], 8);
        assert_eq!(&l4[4..8], &[0, 7, 0, 9]);
    }

    #[test]
    fn stable_random_value_within_instruction() {
        // sip=* resolves once; the IP header and the UDP pseudo-header
        // must agree (the checksum would break otherwise)
        let frames =
            compile("udp(dmac=11:22:33:44:55:66, dip=1.2.3.4, sip=*, sport=1, dport=2, payload=00)");
        let ip = &frames[0][14..];
        let src = &ip[12..16];
        assert_ne!(src, &[0, 0, 0, 0]);
        let l4 = &ip[20..];
        let mut pseudo = vec![0u8; 12];
        pseudo[..4].copy_from_slice(src);
        pseudo[4..8].copy_from_slice(&[1, 2, 3, 4]);
        pseudo[9] = 17;
        pseudo[11] = l4.len() as u8;
        let verify = checksum::InetSum::new()
            .add_slice(&pseudo)
            .add_slice(l4)
            .finalize();
        assert_eq!(verify, 0);
    }

    #[test]
    fn trailing_garbage_rejected_at_top_level() {
        assert_matches!(
            compile_err("eth(dmac=11:22:33:44:55:66, payload=aa) junk").message.as_str(),
            "Syntax error"
        );
    }
}
