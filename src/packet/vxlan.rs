use byteorder::{BigEndian, ByteOrder};

use crate::ctx::Context;
use crate::err::EncodeError;
use crate::packet::{EthernetPacket, Linkable, UdpPacket};

const VXLAN_HEADER_LEN: usize = 8;

/// VXLAN encapsulation over UDP.
///
/// The eight byte header carries the valid-VNI flag (0x08), three
/// reserved bytes, the 24 bit VNI in the upper bytes of the second
/// word and a trailing reserved byte. The encapsulated Ethernet frame
/// follows verbatim.
#[derive(Debug)]
pub struct VxlanPacket {
    udp: UdpPacket,
    vni: u32,
}

impl VxlanPacket {
    /// Empty VXLAN packet.
    pub fn new(is_v6: bool, mtu: usize) -> VxlanPacket {
        VxlanPacket {
            udp: UdpPacket::new(is_v6, mtu),
            vni: 0,
        }
    }

    /// The owned UDP datagram (ports, IP envelope).
    pub fn udp_mut(&mut self) -> &mut UdpPacket {
        &mut self.udp
    }

    /// 24 bit VXLAN network identifier.
    pub fn set_vni(&mut self, vni: u32) {
        self.vni = vni & 0x00ff_ffff;
    }

    /// Assemble the packet around the encapsulated frame bytes.
    pub fn compile(&mut self, ctx: &Context, inner_frame: &[u8]) -> Result<(), EncodeError> {
        let mut payload = vec![0u8; VXLAN_HEADER_LEN + inner_frame.len()];
        payload[0] = 0x08;
        BigEndian::write_u32(&mut payload[4..8], self.vni << 8);
        payload[VXLAN_HEADER_LEN..].copy_from_slice(inner_frame);
        self.udp.compile(ctx, &payload)
    }
}

impl Linkable for VxlanPacket {
    fn frames(&self) -> &[EthernetPacket] {
        self.udp.frames()
    }
}
