use byteorder::{BigEndian, ByteOrder};

use crate::checksum::InetSum;
use crate::ctx::Context;
use crate::err::EncodeError;
use crate::packet::ip::proto;
use crate::packet::{EthernetPacket, IpPacket, Linkable};

const UDP_HEADER_LEN: usize = 8;

/// UDP over IPv4 or IPv6.
///
/// The length field covers header plus payload; the checksum covers
/// the pseudo-header, the UDP header and the payload, with a zero
/// result replaced by 0xFFFF.
#[derive(Debug)]
pub struct UdpPacket {
    ip: IpPacket,
    src_port: u16,
    dst_port: u16,
}

impl UdpPacket {
    /// Empty UDP datagram.
    pub fn new(is_v6: bool, mtu: usize) -> UdpPacket {
        UdpPacket {
            ip: IpPacket::new(is_v6, mtu),
            src_port: 0,
            dst_port: 0,
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

    fn header_bytes(&self, payload_len: usize, chksum: u16) -> [u8; UDP_HEADER_LEN] {
        let mut h = [0u8; UDP_HEADER_LEN];
        BigEndian::write_u16(&mut h[0..2], self.src_port);
        BigEndian::write_u16(&mut h[2..4], self.dst_port);
        BigEndian::write_u16(&mut h[4..6], (UDP_HEADER_LEN + payload_len) as u16);
        BigEndian::write_u16(&mut h[6..8], chksum);
        h
    }

    /// Assemble the datagram and compute the checksum.
    pub fn compile(&mut self, ctx: &Context, payload: &[u8]) -> Result<(), EncodeError> {
        let header = self.header_bytes(payload.len(), 0);
        self.ip.compile(ctx, proto::UDP, &header, payload)?;

        let chksum = self.calc_checksum(&header, payload);
        let header = self.header_bytes(payload.len(), chksum);
        self.ip.update_l4_header(&header);
        Ok(())
    }

    /// Overwrite the checksum with a user-supplied value (called after
    /// [`compile`](Self::compile)).
    pub fn set_checksum(&mut self, chksum: u16) {
        let payload_len = self.ip.l4_len_total() - UDP_HEADER_LEN;
        let header = self.header_bytes(payload_len, chksum);
        self.ip.update_l4_header(&header);
    }

    fn calc_checksum(&self, header: &[u8], payload: &[u8]) -> u16 {
        let sum = if self.ip.is_v6() {
            InetSum::new().add_slice(&self.ip.v6_pseudo_header(proto::UDP))
        } else {
            InetSum::new().add_slice(&self.ip.v4_pseudo_header(proto::UDP))
        };
        sum.add_slice(header)
            .add_slice(payload)
            .finalize_no_zero()
    }
}

impl Linkable for UdpPacket {
    fn frames(&self) -> &[EthernetPacket] {
        self.ip.frames()
    }
}
