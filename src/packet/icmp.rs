use byteorder::{BigEndian, ByteOrder};

use crate::checksum::InetSum;
use crate::ctx::Context;
use crate::err::EncodeError;
use crate::packet::ip::proto;
use crate::packet::{EthernetPacket, IpPacket, Linkable};

const ICMP_HEADER_LEN: usize = 4;

/// ICMPv4 message types that carry an embedded internet header.
fn has_embedded_inet_header(msg_type: u8) -> bool {
    matches!(msg_type, 3 | 4 | 5 | 11 | 12)
}

/// ICMPv4 message.
///
/// For the embedded-internet message types (destination unreachable,
/// source quench, redirect, time exceeded, parameter problem) an
/// omitted payload is replaced by a synthetic inner IPv4+UDP header
/// with the outer addresses reversed.
#[derive(Debug)]
pub struct IcmpPacket {
    ip: IpPacket,
}

impl IcmpPacket {
    /// Empty ICMP message (always IPv4).
    pub fn new(mtu: usize) -> IcmpPacket {
        IcmpPacket {
            ip: IpPacket::new(false, mtu),
        }
    }

    /// The owned IP envelope.
    pub fn ip_mut(&mut self) -> &mut IpPacket {
        &mut self.ip
    }

    /// Synthetic payload for the embedded-inet types: four unused
    /// bytes, an inner IPv4 header with source/destination reversed
    /// (protocol UDP, TTL 64) and a zero-length UDP header.
    fn synthetic_inner(&self) -> Vec<u8> {
        let mut inner = vec![0u8; 4 + 20 + 8];
        let ip = &mut inner[4..24];
        ip[0] = 0x45;
        BigEndian::write_u16(&mut ip[2..4], 20 + 8);
        ip[8] = 64;
        ip[9] = proto::UDP;
        let src = self.ip.destination_v4().octets();
        let dst = self.ip.source_v4().octets();
        ip[12..16].copy_from_slice(&src);
        ip[16..20].copy_from_slice(&dst);
        let chksum = InetSum::new().add_slice(ip).finalize();
        BigEndian::write_u16(&mut ip[10..12], chksum);
        // inner UDP: ports zero, length 8
        BigEndian::write_u16(&mut inner[24 + 4..24 + 6], 8);
        inner
    }

    fn compile_header_and_payload(
        &mut self,
        ctx: &Context,
        msg_type: u8,
        code: u8,
        chksum: Option<u16>,
        payload: &[u8],
    ) -> Result<(), EncodeError> {
        let mut header = [0u8; ICMP_HEADER_LEN];
        header[0] = msg_type;
        header[1] = code;
        let chksum = match chksum {
            Some(user) => user,
            None => InetSum::new()
                .add_slice(&header)
                .add_slice(payload)
                .finalize(),
        };
        BigEndian::write_u16(&mut header[2..4], chksum);
        self.ip.compile(ctx, proto::ICMP, &header, payload)
    }

    /// Raw message: type, code, optional user checksum, payload. An
    /// omitted payload for the embedded-inet types is synthesized.
    pub fn compile_raw(
        &mut self,
        ctx: &Context,
        msg_type: u8,
        code: u8,
        chksum: Option<u16>,
        payload: Option<&[u8]>,
    ) -> Result<(), EncodeError> {
        let synthetic;
        let payload: &[u8] = match payload {
            Some(p) => p,
            None if has_embedded_inet_header(msg_type) => {
                synthetic = self.synthetic_inner();
                synthetic.as_slice()
            }
            None => &[],
        };
        self.compile_header_and_payload(ctx, msg_type, code, chksum, payload)
    }

    /// Message with an embedded internet header supplied by the script
    /// (or synthesized when omitted): the payload starts with the four
    /// unused bytes.
    pub fn compile_with_embedded_inet(
        &mut self,
        ctx: &Context,
        msg_type: u8,
        code: u8,
        payload: Option<&[u8]>,
    ) -> Result<(), EncodeError> {
        let body = match payload {
            Some(p) => [&[0u8; 4][..], p].concat(),
            None => self.synthetic_inner(),
        };
        self.compile_header_and_payload(ctx, msg_type, code, None, &body)
    }

    /// Redirect (type 5): the gateway address takes the place of the
    /// unused word in front of the embedded header.
    pub fn compile_redirect(
        &mut self,
        ctx: &Context,
        code: u8,
        gateway: [u8; 4],
        payload: Option<&[u8]>,
    ) -> Result<(), EncodeError> {
        let mut body = match payload {
            Some(p) => [&[0u8; 4][..], p].concat(),
            None => self.synthetic_inner(),
        };
        body[..4].copy_from_slice(&gateway);
        self.compile_header_and_payload(ctx, 5, code, None, &body)
    }

    /// Echo request (type 8) or reply (type 0) with identifier,
    /// sequence number and optional data.
    pub fn compile_ping(
        &mut self,
        ctx: &Context,
        reply: bool,
        id: u16,
        seq: u16,
        data: &[u8],
    ) -> Result<(), EncodeError> {
        let mut body = vec![0u8; 4 + data.len()];
        BigEndian::write_u16(&mut body[0..2], id);
        BigEndian::write_u16(&mut body[2..4], seq);
        body[4..].copy_from_slice(data);
        let msg_type = if reply { 0 } else { 8 };
        self.compile_header_and_payload(ctx, msg_type, 0, None, &body)
    }
}

impl Linkable for IcmpPacket {
    fn frames(&self) -> &[EthernetPacket] {
        self.ip.frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::Settings;
    use crate::rng::Rng;
    use crate::val::Ipv4Address;

    fn ctx() -> Context {
        Context::new(Settings::new())
    }

    fn packet() -> IcmpPacket {
        let mut icmp = IcmpPacket::new(1500);
        let r = Rng::counter(0);
        icmp.ip_mut()
            .set_source_v4(Ipv4Address::parse("10.0.0.1", &r).unwrap());
        icmp.ip_mut()
            .set_destination_v4(Ipv4Address::parse("10.0.0.2", &r).unwrap());
        icmp.ip_mut().set_ttl(64);
        icmp
    }

    fn l4(icmp: &IcmpPacket) -> &[u8] {
        &icmp.frames()[0].payload()[20..]
    }

    #[test]
    fn raw_with_payload() {
        let ctx = ctx();
        let mut icmp = packet();
        icmp.compile_raw(&ctx, 8, 0, None, Some(&[1, 2, 3, 4])).unwrap();
        let l4 = l4(&icmp);
        assert_eq!(l4[0], 8);
        assert_eq!(l4[1], 0);
        assert_eq!(&l4[4..], &[1, 2, 3, 4]);
        // checksum over header + payload verifies
        assert_eq!(InetSum::new().add_slice(l4).finalize(), 0);
    }

    #[test]
    fn raw_user_checksum() {
        let ctx = ctx();
        let mut icmp = packet();
        icmp.compile_raw(&ctx, 8, 0, Some(0x1234), Some(&[1, 2])).unwrap();
        assert_eq!(&l4(&icmp)[2..4], &[0x12, 0x34]);
    }

    #[test]
    fn unreachable_synthesizes_inner_packet() {
        let ctx = ctx();
        let mut icmp = packet();
        icmp.compile_raw(&ctx, 3, 1, None, None).unwrap();
        let l4 = l4(&icmp);
        // 4 byte header + 4 unused + inner ip (20) + inner udp (8)
        assert_eq!(l4.len(), 4 + 32);
        assert_eq!(&l4[4..8], &[0, 0, 0, 0]);
        let inner_ip = &l4[8..28];
        assert_eq!(inner_ip[0], 0x45);
        assert_eq!(inner_ip[9], 17);
        assert_eq!(inner_ip[8], 64);
        // reversed addresses
        assert_eq!(&inner_ip[12..16], &[10, 0, 0, 2]);
        assert_eq!(&inner_ip[16..20], &[10, 0, 0, 1]);
        // inner header checksum verifies
        assert_eq!(InetSum::new().add_slice(inner_ip).finalize(), 0);
        // inner udp length 8
        assert_eq!(&l4[28..36], &[0, 0, 0, 0, 0, 8, 0, 0]);
    }

    #[test]
    fn embedded_payload_is_prefixed_with_unused_word() {
        let ctx = ctx();
        let mut icmp = packet();
        let embedded = [0x45u8; 28];
        icmp.compile_with_embedded_inet(&ctx, 11, 0, Some(&embedded)).unwrap();
        let l4 = l4(&icmp);
        assert_eq!(l4[0], 11);
        assert_eq!(&l4[4..8], &[0, 0, 0, 0]);
        assert_eq!(&l4[8..], &embedded);
    }

    #[test]
    fn redirect_carries_gateway() {
        let ctx = ctx();
        let mut icmp = packet();
        icmp.compile_redirect(&ctx, 1, [192, 168, 0, 1], None).unwrap();
        let l4 = l4(&icmp);
        assert_eq!(l4[0], 5);
        assert_eq!(l4[1], 1);
        assert_eq!(&l4[4..8], &[192, 168, 0, 1]);
        assert_eq!(InetSum::new().add_slice(l4).finalize(), 0);
    }

    #[test]
    fn ping_layout() {
        let ctx = ctx();
        let mut icmp = packet();
        icmp.compile_ping(&ctx, false, 0x4711, 7, b"abc").unwrap();
        let l4_bytes = l4(&icmp);
        assert_eq!(l4_bytes[0], 8);
        assert_eq!(BigEndian::read_u16(&l4_bytes[4..6]), 0x4711);
        assert_eq!(BigEndian::read_u16(&l4_bytes[6..8]), 7);
        assert_eq!(&l4_bytes[8..], b"abc");

        let mut icmp2 = packet();
        icmp2.compile_ping(&ctx, true, 1, 2, &[]).unwrap();
        assert_eq!(l4(&icmp2)[0], 0);
    }
}
