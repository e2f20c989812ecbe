use byteorder::{BigEndian, ByteOrder};

use crate::err::EncodeError;
use crate::val::MacAddress;

/// Maximum Ethernet payload.
pub const MAX_ETHERNET_PAYLOAD: usize = 1500;
/// Untagged maximum frame (two MACs, type/length, payload).
pub const MAX_PACKET: usize = 6 + 6 + 2 + MAX_ETHERNET_PAYLOAD;
/// Single-tagged maximum frame.
pub const MAX_TAGGED_PACKET: usize = MAX_PACKET + 4;
/// Double-tagged maximum frame.
pub const MAX_DOUBLE_TAGGED_PACKET: usize = MAX_TAGGED_PACKET + 4;

/// C-tag TPID (IEEE 802.1Q).
pub const ETHERTYPE_CVLAN: u16 = 0x8100;
/// S-tag TPID (IEEE 802.1ad).
pub const ETHERTYPE_SVLAN: u16 = 0x88a8;
/// IPv4 ethertype.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
/// IPv6 ethertype.
pub const ETHERTYPE_IPV6: u16 = 0x86dd;
/// ARP ethertype.
pub const ETHERTYPE_ARP: u16 = 0x0806;
/// LLDP ethertype.
pub const ETHERTYPE_LLDP: u16 = 0x88cc;

const MAC_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;

/// One Ethernet frame under construction.
///
/// The buffer always holds the exact frame bytes: MAC header, any
/// VLAN tags, the type/length field, an optional LLC(/SNAP) header and
/// the payload. Inserting a VLAN tag shifts the type/length field and
/// payload right by four bytes; the tracked offsets follow.
///
/// Growth is bounded by a per-frame byte budget, by default the
/// double-tagged maximum frame size.
#[derive(Clone, Debug)]
pub struct EthernetPacket {
    data: Vec<u8>,
    max_len: usize,
    /// Offset of the 16 bit ethertype/length field.
    ethertype_index: usize,
    /// Offset of the first payload byte (past LLC/SNAP if present).
    payload_index: usize,
    payload_len: usize,
    /// 0, 3 or 4 without SNAP; +5 with SNAP.
    llc_len: usize,
    vlan_tags: usize,
    dest_set: bool,
}

impl EthernetPacket {
    /// Empty frame with the double-tagged maximum as byte budget.
    pub fn new() -> EthernetPacket {
        EthernetPacket::with_max_len(MAX_DOUBLE_TAGGED_PACKET)
    }

    /// Empty frame with a caller-chosen byte budget (raw frames may
    /// exceed the double-tagged maximum).
    pub fn with_max_len(max_len: usize) -> EthernetPacket {
        debug_assert!(max_len >= MAC_HEADER_LEN);
        EthernetPacket {
            data: vec![0; MAC_HEADER_LEN],
            max_len,
            ethertype_index: 12,
            payload_index: MAC_HEADER_LEN,
            payload_len: 0,
            llc_len: 0,
            vlan_tags: 0,
            dest_set: false,
        }
    }

    fn check_room(&self, added: usize) -> Result<(), EncodeError> {
        let required = self.data.len() + added;
        if required > self.max_len {
            Err(EncodeError::FrameOverflow {
                required,
                max: self.max_len,
            })
        } else {
            Ok(())
        }
    }

    /// Set the source MAC address.
    pub fn set_src_mac(&mut self, mac: MacAddress) {
        self.data[6..12].copy_from_slice(&mac.octets());
    }

    /// Set the destination MAC address.
    pub fn set_dest_mac(&mut self, mac: MacAddress) {
        self.data[..6].copy_from_slice(&mac.octets());
        self.dest_set = true;
    }

    /// True once a destination MAC has been set explicitly.
    pub fn has_dest_mac(&self) -> bool {
        self.dest_set
    }

    /// Write the ethertype or length field.
    pub fn set_type_length(&mut self, value: u16) {
        BigEndian::write_u16(&mut self.data[self.ethertype_index..], value);
    }

    /// Write the 802.3 length (payload plus LLC header) into the
    /// type/length field.
    pub fn set_length(&mut self) {
        self.set_type_length((self.payload_len + self.llc_len) as u16);
    }

    /// Current ethertype/length field value.
    pub fn type_length(&self) -> u16 {
        BigEndian::read_u16(&self.data[self.ethertype_index..])
    }

    /// Insert a VLAN tag in front of the type/length field. Tags are
    /// emitted in insertion order, so the first tag of the script is
    /// the outermost on the wire.
    pub fn add_vlan_tag(
        &mut self,
        is_ctag: bool,
        id: u16,
        prio: u8,
        dei: u8,
    ) -> Result<(), EncodeError> {
        self.check_room(VLAN_TAG_LEN)?;

        let tpid = if is_ctag {
            ETHERTYPE_CVLAN
        } else {
            ETHERTYPE_SVLAN
        };
        let tci = ((prio as u16 & 0x7) << 13) | ((dei as u16 & 1) << 12) | (id & 0x0fff);
        let mut tag = [0u8; VLAN_TAG_LEN];
        BigEndian::write_u16(&mut tag[0..2], tpid);
        BigEndian::write_u16(&mut tag[2..4], tci);

        let at = self.ethertype_index;
        self.data.splice(at..at, tag);
        self.ethertype_index += VLAN_TAG_LEN;
        self.payload_index += VLAN_TAG_LEN;
        self.vlan_tags += 1;
        Ok(())
    }

    /// Number of VLAN tags inserted so far.
    pub fn vlan_tag_count(&self) -> usize {
        self.vlan_tags
    }

    /// Insert an IEEE 802.2 LLC header. The control field is one byte
    /// when its low two bits are `11`, otherwise two bytes.
    pub fn add_llc_header(
        &mut self,
        dsap: u8,
        ssap: u8,
        control: u16,
    ) -> Result<(), EncodeError> {
        let llc_len = if control & 0x0003 == 3 { 3 } else { 4 };
        self.check_room(llc_len)?;

        let mut llc = [0u8; 4];
        llc[0] = dsap;
        llc[1] = ssap;
        if llc_len == 3 {
            llc[2] = control as u8;
        } else {
            BigEndian::write_u16(&mut llc[2..4], control);
        }

        let at = self.payload_index;
        self.data.splice(at..at, llc[..llc_len].iter().copied());
        self.payload_index += llc_len;
        self.llc_len += llc_len;
        self.set_length();
        Ok(())
    }

    /// Insert an LLC header with SNAP extension (aa:aa:03 plus OUI and
    /// protocol id).
    pub fn add_snap_header(&mut self, oui: u32, protocol: u16) -> Result<(), EncodeError> {
        self.add_llc_header(0xaa, 0xaa, 3)?;
        self.check_room(5)?;

        let mut snap = [0u8; 5];
        snap[0] = (oui >> 16) as u8;
        snap[1] = (oui >> 8) as u8;
        snap[2] = oui as u8;
        BigEndian::write_u16(&mut snap[3..5], protocol);

        let at = self.payload_index;
        self.data.splice(at..at, snap);
        self.payload_index += 5;
        self.llc_len += 5;
        self.set_length();
        Ok(())
    }

    /// True once an LLC header was inserted.
    pub fn has_llc_header(&self) -> bool {
        self.llc_len != 0
    }

    /// Replace the payload area.
    pub fn set_payload(&mut self, payload: &[u8]) -> Result<(), EncodeError> {
        self.data.truncate(self.payload_index);
        self.payload_len = 0;
        self.check_room(payload.len())?;
        self.data.extend_from_slice(payload);
        self.payload_len = payload.len();
        Ok(())
    }

    /// Append bytes to the payload area.
    pub fn append_payload(&mut self, payload: &[u8]) -> Result<(), EncodeError> {
        self.check_room(payload.len())?;
        self.data.extend_from_slice(payload);
        self.payload_len += payload.len();
        Ok(())
    }

    /// Overwrite payload bytes starting at `offset` (used to patch an
    /// L4 header once its checksum is known).
    pub fn update_payload_at(&mut self, offset: usize, bytes: &[u8]) {
        let at = self.payload_index + offset;
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
    }

    /// Replace the whole frame, MAC header included.
    pub fn set_raw(&mut self, frame: &[u8]) -> Result<(), EncodeError> {
        if frame.len() > self.max_len {
            return Err(EncodeError::FrameOverflow {
                required: frame.len(),
                max: self.max_len,
            });
        }
        self.data.clear();
        self.data.extend_from_slice(frame);
        // keep the length valid even for a truncated MAC header
        if self.data.len() < MAC_HEADER_LEN {
            self.data.resize(MAC_HEADER_LEN, 0);
        }
        self.ethertype_index = 12;
        self.payload_index = MAC_HEADER_LEN;
        self.payload_len = self.data.len() - MAC_HEADER_LEN;
        self.llc_len = 0;
        self.vlan_tags = 0;
        Ok(())
    }

    /// Complete frame bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Frame length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when nothing but the MAC header exists.
    pub fn is_empty(&self) -> bool {
        self.data.len() == MAC_HEADER_LEN && self.payload_len == 0
    }

    /// Payload bytes (past LLC/SNAP if present).
    pub fn payload(&self) -> &[u8] {
        &self.data[self.payload_index..self.payload_index + self.payload_len]
    }

    /// Payload length in bytes.
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }
}

impl Default for EthernetPacket {
    fn default() -> EthernetPacket {
        EthernetPacket::new()
    }
}
