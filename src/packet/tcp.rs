use byteorder::{BigEndian, ByteOrder};

use crate::checksum::InetSum;
use crate::ctx::Context;
use crate::err::EncodeError;
use crate::packet::ip::proto;
use crate::packet::{EthernetPacket, IpPacket, Linkable};

const TCP_HEADER_LEN: usize = 20;

/// TCP flag bits as they appear in the header's flag byte.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TcpFlags {
    /// FIN flag.
    pub fin: bool,
    /// SYN flag.
    pub syn: bool,
    /// RST flag.
    pub rst: bool,
    /// PSH flag.
    pub psh: bool,
    /// ACK flag.
    pub ack: bool,
    /// URG flag.
    pub urg: bool,
    /// ECE flag.
    pub ece: bool,
    /// CWR flag.
    pub cwr: bool,
    /// NS (nonce) flag, carried in the low bit of the data-offset
    /// byte.
    pub nonce: bool,
}

impl TcpFlags {
    fn flag_byte(&self) -> u8 {
        (self.fin as u8)
            | (self.syn as u8) << 1
            | (self.rst as u8) << 2
            | (self.psh as u8) << 3
            | (self.ack as u8) << 4
            | (self.urg as u8) << 5
            | (self.ece as u8) << 6
            | (self.cwr as u8) << 7
    }
}

/// TCP segment without options (header length 5 words).
///
/// Each compiled segment advances the process-wide sequence counter by
/// `payload_len + (SYN ? 1 : 0)`.
#[derive(Debug)]
pub struct TcpPacket {
    ip: IpPacket,
    src_port: u16,
    dst_port: u16,
    seq: u32,
    ack: u32,
    window: u16,
    urgent_ptr: u16,
    flags: TcpFlags,
    chksum: u16,
}

impl TcpPacket {
    /// Empty segment; the sequence number starts at the context's
    /// current counter value.
    pub fn new(ctx: &Context, is_v6: bool, mtu: usize) -> TcpPacket {
        TcpPacket {
            ip: IpPacket::new(is_v6, mtu),
            src_port: 0,
            dst_port: 0,
            seq: ctx.tcp_sequence(),
            ack: 0,
            window: 0,
            urgent_ptr: 0,
            flags: TcpFlags::default(),
            chksum: 0,
        }
    }

    /// The owned IP envelope.
    pub fn ip_mut(&mut self) -> &mut IpPacket {
        &mut self.ip
    }

    /// Source port.
    pub fn set_source_port(&mut self, port: u16) {
        self.src_port = port;
    }

    /// Destination port.
    pub fn set_destination_port(&mut self, port: u16) {
        self.dst_port = port;
    }

    /// Sequence number; also resets the process-wide counter.
    pub fn set_seq_number(&mut self, ctx: &Context, seq: u32) {
        self.seq = seq;
        ctx.set_tcp_sequence(seq);
    }

    /// Acknowledgment number.
    pub fn set_ack_number(&mut self, ack: u32) {
        self.ack = ack;
    }

    /// Window size.
    pub fn set_window(&mut self, window: u16) {
        self.window = window;
    }

    /// Urgent pointer.
    pub fn set_urgent_pointer(&mut self, ptr: u16) {
        self.urgent_ptr = ptr;
    }

    /// All flag bits at once.
    pub fn set_flags(&mut self, flags: TcpFlags) {
        self.flags = flags;
    }

    /// User-supplied checksum (suppresses computation in
    /// [`compile`](Self::compile)).
    pub fn set_checksum(&mut self, chksum: u16) {
        self.chksum = chksum;
    }

    fn header_bytes(&self, chksum: u16) -> [u8; TCP_HEADER_LEN] {
        let mut h = [0u8; TCP_HEADER_LEN];
        BigEndian::write_u16(&mut h[0..2], self.src_port);
        BigEndian::write_u16(&mut h[2..4], self.dst_port);
        BigEndian::write_u32(&mut h[4..8], self.seq);
        BigEndian::write_u32(&mut h[8..12], self.ack);
        h[12] = ((TCP_HEADER_LEN as u8 / 4) << 4) | (self.flags.nonce as u8);
        h[13] = self.flags.flag_byte();
        BigEndian::write_u16(&mut h[14..16], self.window);
        BigEndian::write_u16(&mut h[16..18], chksum);
        BigEndian::write_u16(&mut h[18..20], self.urgent_ptr);
        h
    }

    /// Assemble the segment. With `calc_chksum` the checksum is
    /// computed over the pseudo-header; otherwise the user-supplied
    /// value is written as-is.
    pub fn compile(
        &mut self,
        ctx: &Context,
        payload: &[u8],
        calc_chksum: bool,
    ) -> Result<(), EncodeError> {
        let header = self.header_bytes(self.chksum);
        self.ip.compile(ctx, proto::TCP, &header, payload)?;

        if calc_chksum {
            self.chksum = self.calc_checksum(&header, payload);
        }
        let header = self.header_bytes(self.chksum);
        self.ip.update_l4_header(&header);

        ctx.advance_tcp_sequence(payload.len() as u32 + self.flags.syn as u32);
        Ok(())
    }

    fn calc_checksum(&self, header: &[u8], payload: &[u8]) -> u16 {
        let sum = if self.ip.is_v6() {
            InetSum::new().add_slice(&self.ip.v6_pseudo_header(proto::TCP))
        } else {
            InetSum::new().add_slice(&self.ip.v4_pseudo_header(proto::TCP))
        };
        let mut zeroed = [0u8; TCP_HEADER_LEN];
        zeroed.copy_from_slice(header);
        zeroed[16] = 0;
        zeroed[17] = 0;
        sum.add_slice(&zeroed)
            .add_slice(payload)
            .finalize_no_zero()
    }
}

impl Linkable for TcpPacket {
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

    fn ip(s: &str) -> Ipv4Address {
        Ipv4Address::parse(s, &Rng::counter(0)).unwrap()
    }

    fn segment(ctx: &Context, flags: TcpFlags, payload: &[u8]) -> TcpPacket {
        let mut tcp = TcpPacket::new(ctx, false, 1500);
        tcp.ip_mut().set_source_v4(ip("10.0.0.1"));
        tcp.ip_mut().set_destination_v4(ip("10.0.0.2"));
        tcp.set_source_port(1234);
        tcp.set_destination_port(80);
        tcp.set_seq_number(ctx, 1000);
        tcp.set_ack_number(2000);
        tcp.set_window(1024);
        tcp.set_flags(flags);
        tcp.compile(ctx, payload, true).unwrap();
        tcp
    }

    #[test]
    fn header_layout() {
        let ctx = ctx();
        let tcp = segment(
            &ctx,
            TcpFlags {
                syn: true,
                ack: true,
                ..Default::default()
            },
            &[],
        );
        let l4 = &tcp.frames()[0].payload()[20..];
        assert_eq!(l4.len(), 20);
        assert_eq!(BigEndian::read_u16(&l4[0..2]), 1234);
        assert_eq!(BigEndian::read_u16(&l4[2..4]), 80);
        assert_eq!(BigEndian::read_u32(&l4[4..8]), 1000);
        assert_eq!(BigEndian::read_u32(&l4[8..12]), 2000);
        // data offset 5, no nonce
        assert_eq!(l4[12], 0x50);
        // SYN | ACK
        assert_eq!(l4[13], 0x12);
        assert_eq!(BigEndian::read_u16(&l4[14..16]), 1024);
    }

    #[test]
    fn nonce_rides_in_offset_byte() {
        let ctx = ctx();
        let tcp = segment(
            &ctx,
            TcpFlags {
                nonce: true,
                ..Default::default()
            },
            &[],
        );
        assert_eq!(tcp.frames()[0].payload()[20 + 12], 0x51);
    }

    #[test]
    fn checksum_verifies() {
        let ctx = ctx();
        let tcp = segment(&ctx, TcpFlags::default(), b"hello world");
        let l4 = &tcp.frames()[0].payload()[20..];
        let verify = InetSum::new()
            .add_slice(&tcp.ip.v4_pseudo_header(proto::TCP))
            .add_slice(l4)
            .finalize();
        assert_eq!(verify, 0);
    }

    #[test]
    fn sequence_counter_advances() {
        let ctx = ctx();
        let _ = segment(&ctx, TcpFlags::default(), b"12345");
        // payload only
        assert_eq!(ctx.tcp_sequence(), 1005);
        let mut tcp = TcpPacket::new(&ctx, false, 1500);
        tcp.ip_mut().set_source_v4(ip("10.0.0.1"));
        tcp.ip_mut().set_destination_v4(ip("10.0.0.2"));
        // no explicit sequence: continues at the counter
        assert_eq!(tcp.seq, 1005);
        tcp.set_flags(TcpFlags {
            syn: true,
            ..Default::default()
        });
        tcp.compile(&ctx, &[], true).unwrap();
        // SYN counts one
        assert_eq!(ctx.tcp_sequence(), 1006);
    }

    #[test]
    fn user_checksum_is_kept() {
        let ctx = ctx();
        let mut tcp = TcpPacket::new(&ctx, false, 1500);
        tcp.ip_mut().set_source_v4(ip("10.0.0.1"));
        tcp.ip_mut().set_destination_v4(ip("10.0.0.2"));
        tcp.set_seq_number(&ctx, 0);
        tcp.set_checksum(0xbeef);
        tcp.compile(&ctx, &[], false).unwrap();
        let l4 = &tcp.frames()[0].payload()[20..];
        assert_eq!(&l4[16..18], &[0xbe, 0xef]);
    }
}
