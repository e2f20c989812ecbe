use byteorder::{BigEndian, ByteOrder};

use crate::checksum::rfc1071;
use crate::ctx::Context;
use crate::err::EncodeError;
use crate::packet::{EthernetPacket, Linkable, ETHERTYPE_IPV4, ETHERTYPE_IPV6};
use crate::val::{Ipv4Address, Ipv6Address, MacAddress};

/// IP protocol numbers used by the encoders.
pub mod proto {
    /// ICMPv4.
    pub const ICMP: u8 = 1;
    /// IGMP.
    pub const IGMP: u8 = 2;
    /// TCP.
    pub const TCP: u8 = 6;
    /// UDP.
    pub const UDP: u8 = 17;
    /// GRE.
    pub const GRE: u8 = 47;
    /// VRRP.
    pub const VRRP: u8 = 112;
}

const IPV4_HEADER_LEN: usize = 20;
const IPV4_HEADER_WITH_RA_LEN: usize = 24;
const IPV6_HEADER_LEN: usize = 40;

#[derive(Clone, Debug, Default)]
struct V4 {
    src: Ipv4Address,
    dst: Ipv4Address,
    dont_fragment: bool,
    identification: Option<u16>,
    router_alert: bool,
}

#[derive(Clone, Debug, Default)]
struct V6 {
    src: Ipv6Address,
    dst: Ipv6Address,
    flow_label: u32,
}

/// Layer-3 envelope: assembles IPv4 or IPv6 headers around an L4
/// header and payload, fragmenting IPv4 datagrams that exceed the MTU.
///
/// Owns the resulting Ethernet frames; all fragments share the MAC
/// header and VLAN tags configured on the first frame before
/// [`compile`](Self::compile) runs.
#[derive(Debug)]
pub struct IpPacket {
    is_v6: bool,
    mtu: usize,
    frames: Vec<EthernetPacket>,
    dscp: u8,
    ecn: u8,
    ttl: u8,
    v4: V4,
    v6: V6,
}

impl IpPacket {
    /// Empty datagram. `mtu` bounds the per-fragment IP length.
    pub fn new(is_v6: bool, mtu: usize) -> IpPacket {
        let mut first = EthernetPacket::new();
        first.set_type_length(if is_v6 { ETHERTYPE_IPV6 } else { ETHERTYPE_IPV4 });
        IpPacket {
            is_v6,
            mtu,
            frames: vec![first],
            dscp: 0,
            ecn: 0,
            ttl: 1,
            v4: V4::default(),
            v6: V6::default(),
        }
    }

    /// True for an IPv6 datagram.
    pub fn is_v6(&self) -> bool {
        self.is_v6
    }

    /// The frame the MAC header and VLAN tags go into.
    pub fn first_frame_mut(&mut self) -> &mut EthernetPacket {
        &mut self.frames[0]
    }

    /// Set the destination MAC on every frame.
    pub fn set_dest_mac(&mut self, mac: MacAddress) {
        for frame in &mut self.frames {
            frame.set_dest_mac(mac);
        }
    }

    /// DSCP (6 bits).
    pub fn set_dscp(&mut self, dscp: u8) {
        self.dscp = dscp;
    }

    /// ECN (2 bits).
    pub fn set_ecn(&mut self, ecn: u8) {
        self.ecn = ecn;
    }

    /// TTL (IPv4) / hop limit (IPv6).
    pub fn set_ttl(&mut self, ttl: u8) {
        self.ttl = ttl;
    }

    /// IPv4 don't-fragment flag.
    pub fn set_dont_fragment(&mut self, df: bool) {
        debug_assert!(!self.is_v6);
        self.v4.dont_fragment = df;
    }

    /// User-supplied IPv4 identification (otherwise a fragmented
    /// datagram draws one from the context counter).
    pub fn set_identification(&mut self, id: u16) {
        debug_assert!(!self.is_v6);
        self.v4.identification = Some(id);
    }

    /// Add the IPv4 router-alert option (four bytes, one extra header
    /// word).
    pub fn add_router_alert_option(&mut self) {
        debug_assert!(!self.is_v6);
        self.v4.router_alert = true;
    }

    /// IPv4 source address.
    pub fn set_source_v4(&mut self, ip: Ipv4Address) {
        debug_assert!(!self.is_v6);
        self.v4.src = ip;
    }

    /// IPv4 destination address.
    pub fn set_destination_v4(&mut self, ip: Ipv4Address) {
        debug_assert!(!self.is_v6);
        self.v4.dst = ip;
    }

    /// IPv4 source address.
    pub fn source_v4(&self) -> Ipv4Address {
        debug_assert!(!self.is_v6);
        self.v4.src
    }

    /// IPv4 destination address.
    pub fn destination_v4(&self) -> Ipv4Address {
        debug_assert!(!self.is_v6);
        self.v4.dst
    }

    /// IPv6 source address.
    pub fn set_source_v6(&mut self, ip: Ipv6Address) {
        debug_assert!(self.is_v6);
        self.v6.src = ip;
    }

    /// IPv6 destination address.
    pub fn set_destination_v6(&mut self, ip: Ipv6Address) {
        debug_assert!(self.is_v6);
        self.v6.dst = ip;
    }

    /// IPv6 source address.
    pub fn source_v6(&self) -> Ipv6Address {
        debug_assert!(self.is_v6);
        self.v6.src
    }

    /// IPv6 destination address.
    pub fn destination_v6(&self) -> Ipv6Address {
        debug_assert!(self.is_v6);
        self.v6.dst
    }

    /// IPv6 flow label (20 bits).
    pub fn set_flow_label(&mut self, fl: u32) {
        debug_assert!(self.is_v6);
        self.v6.flow_label = fl;
    }

    /// IP header length for the current options.
    pub fn header_len(&self) -> usize {
        if self.is_v6 {
            IPV6_HEADER_LEN
        } else if self.v4.router_alert {
            IPV4_HEADER_WITH_RA_LEN
        } else {
            IPV4_HEADER_LEN
        }
    }

    /// Total L4 bytes (header plus payload) across all fragments.
    pub fn l4_len_total(&self) -> usize {
        let header_len = self.header_len();
        self.frames
            .iter()
            .map(|f| f.payload_len() - header_len)
            .sum()
    }

    /// Assemble the datagram: writes the IP header(s), distributes the
    /// L4 header and payload over as many frames as the MTU requires.
    ///
    /// Only the first fragment carries the L4 header; fragment sizes
    /// are floored to a multiple of 8 except for the last; all
    /// fragments share one identification value; the more-fragments
    /// flag is set on all but the last.
    pub fn compile(
        &mut self,
        ctx: &Context,
        protocol: u8,
        l4_header: &[u8],
        payload: &[u8],
    ) -> Result<(), EncodeError> {
        let header_len = self.header_len();
        let total = l4_header.len() + payload.len();

        if total + header_len > 65535 {
            return Err(EncodeError::DatagramTooBig {
                len: total + header_len,
            });
        }
        let room = self.mtu.saturating_sub(header_len);
        if l4_header.len() > room || room == 0 {
            return Err(EncodeError::HeaderExceedsMtu {
                header_len: l4_header.len(),
                room,
            });
        }

        let frag_cnt = if total == 0 {
            1
        } else {
            (total - 1) / room + 1
        };

        if self.is_v6 {
            if frag_cnt > 1 {
                return Err(EncodeError::Ipv6NeedsFragmentation { len: total });
            }
            return self.compile_v6(protocol, l4_header, payload);
        }
        self.compile_v4(ctx, protocol, l4_header, payload, frag_cnt)
    }

    fn compile_v4(
        &mut self,
        ctx: &Context,
        protocol: u8,
        l4_header: &[u8],
        payload: &[u8],
        frag_cnt: usize,
    ) -> Result<(), EncodeError> {
        let header_len = self.header_len();

        // multicast destinations map to a derived MAC when the script
        // gave none
        if !self.frames[0].has_dest_mac() && self.v4.dst.is_multicast() {
            let d = self.v4.dst.octets();
            self.frames[0].set_dest_mac(MacAddress([0x01, 0x00, 0x5e, d[1] & 0x7f, d[2], d[3]]));
        }

        let id = match self.v4.identification {
            Some(id) => id,
            None if frag_cnt > 1 => ctx.next_ip_id(),
            None => 0,
        };

        // all fragments inherit MAC header, VLAN tags and ethertype
        for _ in 1..frag_cnt {
            let clone = self.frames[0].clone();
            self.frames.push(clone);
        }

        let mut remaining = payload;
        let mut offset = 0usize;
        for n in 0..frag_cnt {
            let last = n + 1 == frag_cnt;
            let mut frag_len = if n == 0 {
                (l4_header.len() + payload.len()).min(self.mtu - header_len)
            } else {
                remaining.len().min(self.mtu - header_len)
            };
            if !last {
                frag_len = frag_len / 8 * 8;
            }
            // flooring must never cut into the L4 header
            if n == 0 && frag_len < l4_header.len() {
                return Err(EncodeError::HeaderExceedsMtu {
                    header_len: l4_header.len(),
                    room: frag_len,
                });
            }

            let header = self.v4_header_bytes(
                protocol,
                !last,
                offset,
                (header_len + frag_len) as u16,
                id,
            );
            let frame = &mut self.frames[n];
            frame.set_payload(&header)?;

            if n == 0 {
                let payload_part = frag_len - l4_header.len();
                frame.append_payload(l4_header)?;
                frame.append_payload(&remaining[..payload_part])?;
                remaining = &remaining[payload_part..];
            } else {
                frame.append_payload(&remaining[..frag_len])?;
                remaining = &remaining[frag_len..];
            }
            offset += frag_len;
        }
        Ok(())
    }

    fn v4_header_bytes(
        &self,
        protocol: u8,
        more_fragments: bool,
        offset: usize,
        total_len: u16,
        id: u16,
    ) -> Vec<u8> {
        debug_assert_eq!(offset % 8, 0);
        let header_len = self.header_len();
        let mut h = vec![0u8; header_len];

        h[0] = (4 << 4) | ((header_len / 4) as u8);
        h[1] = (self.dscp << 2) | (self.ecn & 0x03);
        BigEndian::write_u16(&mut h[2..4], total_len);
        BigEndian::write_u16(&mut h[4..6], id);
        let flags_offset = if self.v4.dont_fragment { 0x4000 } else { 0 }
            | if more_fragments { 0x2000 } else { 0 }
            | ((offset / 8) as u16 & 0x1fff);
        BigEndian::write_u16(&mut h[6..8], flags_offset);
        h[8] = self.ttl;
        h[9] = protocol;
        h[12..16].copy_from_slice(&self.v4.src.octets());
        h[16..20].copy_from_slice(&self.v4.dst.octets());
        if self.v4.router_alert {
            h[20] = 0x94;
            h[21] = 0x04;
        }

        let chksum = rfc1071(&[&h]);
        BigEndian::write_u16(&mut h[10..12], chksum);
        h
    }

    fn compile_v6(
        &mut self,
        protocol: u8,
        l4_header: &[u8],
        payload: &[u8],
    ) -> Result<(), EncodeError> {
        let total = (l4_header.len() + payload.len()) as u16;
        let mut h = [0u8; IPV6_HEADER_LEN];
        h[0] = (6 << 4) | (self.dscp >> 2);
        h[1] = ((self.dscp & 0x03) << 6)
            | ((self.ecn & 0x03) << 4)
            | ((self.v6.flow_label >> 16) & 0x0f) as u8;
        BigEndian::write_u16(&mut h[2..4], (self.v6.flow_label & 0xffff) as u16);
        BigEndian::write_u16(&mut h[4..6], total);
        h[6] = protocol;
        h[7] = self.ttl;
        h[8..24].copy_from_slice(&self.v6.src.octets());
        h[24..40].copy_from_slice(&self.v6.dst.octets());

        let frame = &mut self.frames[0];
        frame.set_payload(&h)?;
        frame.append_payload(l4_header)?;
        frame.append_payload(payload)?;
        Ok(())
    }

    /// Rewrite the L4 header in the first fragment (after its checksum
    /// has been computed over the final pseudo-header).
    pub fn update_l4_header(&mut self, l4_header: &[u8]) {
        let header_len = self.header_len();
        self.frames[0].update_payload_at(header_len, l4_header);
    }

    /// Pseudo-header for an IPv4 L4 checksum.
    pub fn v4_pseudo_header(&self, protocol: u8) -> [u8; 12] {
        let mut p = [0u8; 12];
        p[0..4].copy_from_slice(&self.v4.src.octets());
        p[4..8].copy_from_slice(&self.v4.dst.octets());
        p[9] = protocol;
        BigEndian::write_u16(&mut p[10..12], self.l4_len_total() as u16);
        p
    }

    /// Pseudo-header for an IPv6 L4 checksum.
    pub fn v6_pseudo_header(&self, protocol: u8) -> [u8; 40] {
        let mut p = [0u8; 40];
        p[0..16].copy_from_slice(&self.v6.src.octets());
        p[16..32].copy_from_slice(&self.v6.dst.octets());
        BigEndian::write_u32(&mut p[32..36], self.l4_len_total() as u32);
        p[39] = protocol;
        p
    }
}

impl Linkable for IpPacket {
    fn frames(&self) -> &[EthernetPacket] {
        &self.frames
    }
}
