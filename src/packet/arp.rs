use byteorder::{BigEndian, ByteOrder};

use crate::err::EncodeError;
use crate::packet::{EthernetPacket, Linkable, ETHERTYPE_ARP, ETHERTYPE_IPV4};
use crate::val::{Ipv4Address, MacAddress};

const ARP_LEN: usize = 28;

/// ARP over Ethernet for IPv4 (28 byte body).
///
/// A zero target MAC in the body makes the Ethernet destination the
/// broadcast address (the usual who-has case); an explicit target MAC
/// is used for both.
#[derive(Debug)]
pub struct ArpPacket {
    eth: EthernetPacket,
}

impl ArpPacket {
    /// Empty ARP packet.
    pub fn new() -> ArpPacket {
        ArpPacket {
            eth: EthernetPacket::new(),
        }
    }

    /// The frame, for VLAN tagging.
    pub fn frame_mut(&mut self) -> &mut EthernetPacket {
        &mut self.eth
    }

    /// Fill in all fields of the ARP body and the MAC header.
    pub fn set_all(
        &mut self,
        opcode: u16,
        src_mac: MacAddress,
        src_ip: Ipv4Address,
        target_mac: MacAddress,
        target_ip: Ipv4Address,
    ) -> Result<(), EncodeError> {
        let mut body = [0u8; ARP_LEN];
        BigEndian::write_u16(&mut body[0..2], 1); // Ethernet
        BigEndian::write_u16(&mut body[2..4], ETHERTYPE_IPV4);
        body[4] = 6;
        body[5] = 4;
        BigEndian::write_u16(&mut body[6..8], opcode);
        body[8..14].copy_from_slice(&src_mac.octets());
        body[14..18].copy_from_slice(&src_ip.octets());
        body[18..24].copy_from_slice(&target_mac.octets());
        body[24..28].copy_from_slice(&target_ip.octets());

        self.eth.set_src_mac(src_mac);
        self.eth.set_dest_mac(if target_mac.is_null() {
            MacAddress::BROADCAST
        } else {
            target_mac
        });
        self.eth.set_type_length(ETHERTYPE_ARP);
        self.eth.set_payload(&body)
    }

    /// ARP probe: request with an unspecified source IP.
    pub fn probe(&mut self, src_mac: MacAddress, ip: Ipv4Address) -> Result<(), EncodeError> {
        self.set_all(1, src_mac, Ipv4Address::NULL, MacAddress::NULL, ip)
    }

    /// Gratuitous ARP announcement: source and target IP are equal.
    pub fn announce(&mut self, src_mac: MacAddress, ip: Ipv4Address) -> Result<(), EncodeError> {
        self.set_all(1, src_mac, ip, MacAddress::NULL, ip)
    }
}

impl Default for ArpPacket {
    fn default() -> ArpPacket {
        ArpPacket::new()
    }
}

impl Linkable for ArpPacket {
    fn frames(&self) -> &[EthernetPacket] {
        self.eth.frames()
    }
}
