use byteorder::{BigEndian, ByteOrder};

use crate::checksum::InetSum;
use crate::ctx::Context;
use crate::err::EncodeError;
use crate::packet::ip::proto;
use crate::packet::{EthernetPacket, IpPacket, Linkable};
use crate::val::{Ipv4Address, MacAddress};

const VRRP_HEADER_LEN: usize = 8;

/// VRRP v2/v3 advertisement.
///
/// The destination MAC is the IETF-reserved 00:00:5E:00:01:VRID, the
/// destination IP 224.0.0.18, TTL 255. Version 2 appends two zero
/// addresses as obsolete authentication padding and checksums only the
/// VRRP payload; version 3 includes the IPv4 pseudo-header.
#[derive(Debug)]
pub struct VrrpPacket {
    ip: IpPacket,
    version: u8,
    vrid: u8,
    prio: u8,
    msg_type: u8,
    interval: u16,
    chksum: Option<u16>,
    vr_ips: Vec<Ipv4Address>,
}

impl VrrpPacket {
    /// Empty advertisement.
    pub fn new(mtu: usize) -> VrrpPacket {
        VrrpPacket {
            ip: IpPacket::new(false, mtu),
            version: 2,
            vrid: 0,
            prio: 0,
            msg_type: 1,
            interval: 0,
            chksum: None,
            vr_ips: Vec::new(),
        }
    }

    /// The owned IP envelope.
    pub fn ip_mut(&mut self) -> &mut IpPacket {
        &mut self.ip
    }

    /// Protocol version (2 or 3).
    pub fn set_version(&mut self, version: u8) {
        self.version = version;
    }

    /// Virtual router id.
    pub fn set_vrid(&mut self, vrid: u8) {
        self.vrid = vrid;
    }

    /// Priority.
    pub fn set_prio(&mut self, prio: u8) {
        self.prio = prio;
    }

    /// Message type (4 bits; 1 = advertisement).
    pub fn set_msg_type(&mut self, msg_type: u8) {
        self.msg_type = msg_type;
    }

    /// Advertisement interval: seconds for v2, centiseconds (12 bits)
    /// for v3.
    pub fn set_interval(&mut self, interval: u16) {
        self.interval = interval;
    }

    /// User-supplied checksum.
    pub fn set_checksum(&mut self, chksum: u16) {
        self.chksum = Some(chksum);
    }

    /// Append a virtual router address.
    pub fn add_virtual_ip(&mut self, ip: Ipv4Address) {
        self.vr_ips.push(ip);
    }

    fn header_bytes(&self, addr_count: u8, chksum: u16) -> [u8; VRRP_HEADER_LEN] {
        let mut h = [0u8; VRRP_HEADER_LEN];
        h[0] = (self.version << 4) | (self.msg_type & 0x0f);
        h[1] = self.vrid;
        h[2] = self.prio;
        h[3] = addr_count;
        if self.version == 2 {
            // auth type (0) + 8 bit advertisement interval
            h[5] = self.interval as u8;
        } else {
            BigEndian::write_u16(&mut h[4..6], self.interval & 0x0fff);
        }
        BigEndian::write_u16(&mut h[6..8], chksum);
        h
    }

    /// Assemble the advertisement.
    pub fn compile(&mut self, ctx: &Context) -> Result<(), EncodeError> {
        self.ip
            .set_dest_mac(MacAddress([0x00, 0x00, 0x5e, 0x00, 0x01, self.vrid]));
        self.ip.set_ttl(255);
        self.ip
            .set_destination_v4(Ipv4Address([224, 0, 0, 18]));

        let addr_count = self.vr_ips.len() as u8;
        // v2 carries two zero words of (obsolete) authentication data
        // behind the address list; they are not counted
        if self.version == 2 {
            self.vr_ips.push(Ipv4Address::NULL);
            self.vr_ips.push(Ipv4Address::NULL);
        }

        let mut addr_bytes = Vec::with_capacity(self.vr_ips.len() * 4);
        for ip in &self.vr_ips {
            addr_bytes.extend_from_slice(&ip.octets());
        }

        let chksum = match self.chksum {
            Some(user) => user,
            None => {
                let header = self.header_bytes(addr_count, 0);
                let sum = if self.version == 2 {
                    InetSum::new()
                } else {
                    let mut pseudo = [0u8; 12];
                    pseudo[0..4].copy_from_slice(&self.ip.source_v4().octets());
                    pseudo[4..8].copy_from_slice(&self.ip.destination_v4().octets());
                    pseudo[9] = proto::VRRP;
                    BigEndian::write_u16(
                        &mut pseudo[10..12],
                        (VRRP_HEADER_LEN + addr_bytes.len()) as u16,
                    );
                    InetSum::new().add_slice(&pseudo)
                };
                sum.add_slice(&header).add_slice(&addr_bytes).finalize()
            }
        };

        let header = self.header_bytes(addr_count, chksum);
        self.ip.compile(ctx, proto::VRRP, &header, &addr_bytes)
    }
}

impl Linkable for VrrpPacket {
    fn frames(&self) -> &[EthernetPacket] {
        self.ip.frames()
    }
}
