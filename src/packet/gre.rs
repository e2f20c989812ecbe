use byteorder::{BigEndian, ByteOrder};

use crate::checksum::InetSum;
use crate::ctx::Context;
use crate::err::EncodeError;
use crate::packet::ip::proto;
use crate::packet::{EthernetPacket, IpPacket, Linkable};

/// GRE encapsulation (RFC 2784/2890).
///
/// The four byte base header is followed by the optional checksum
/// (plus reserved), key and sequence words, each present only when the
/// corresponding flag bit is set. A requested checksum of zero is
/// recomputed over the GRE header and payload.
#[derive(Debug)]
pub struct GrePacket {
    ip: IpPacket,
    protocol: u16,
    chksum: Option<u16>,
    key: Option<u32>,
    seq: Option<u32>,
}

impl GrePacket {
    /// Empty GRE packet.
    pub fn new(is_v6: bool, mtu: usize) -> GrePacket {
        GrePacket {
            ip: IpPacket::new(is_v6, mtu),
            protocol: 0,
            chksum: None,
            key: None,
            seq: None,
        }
    }

    /// The owned IP envelope.
    pub fn ip_mut(&mut self) -> &mut IpPacket {
        &mut self.ip
    }

    /// Encapsulated protocol (an ethertype).
    pub fn set_protocol_type(&mut self, protocol: u16) {
        self.protocol = protocol;
    }

    /// Enable the checksum word with the given value; zero means
    /// "compute for me".
    pub fn set_checksum(&mut self, chksum: u16) {
        self.chksum = Some(chksum);
    }

    /// Enable the key word.
    pub fn set_key(&mut self, key: u32) {
        self.key = Some(key);
    }

    /// Enable the sequence word.
    pub fn set_sequence(&mut self, seq: u32) {
        self.seq = Some(seq);
    }

    fn header_bytes(&self, chksum: u16) -> Vec<u8> {
        let mut h = vec![0u8; 4];
        if self.chksum.is_some() {
            h[0] |= 0x80;
        }
        if self.key.is_some() {
            h[0] |= 0x20;
        }
        if self.seq.is_some() {
            h[0] |= 0x10;
        }
        BigEndian::write_u16(&mut h[2..4], self.protocol);
        if self.chksum.is_some() {
            let mut word = [0u8; 4];
            BigEndian::write_u16(&mut word[0..2], chksum);
            h.extend_from_slice(&word);
        }
        if let Some(key) = self.key {
            let mut word = [0u8; 4];
            BigEndian::write_u32(&mut word, key);
            h.extend_from_slice(&word);
        }
        if let Some(seq) = self.seq {
            let mut word = [0u8; 4];
            BigEndian::write_u32(&mut word, seq);
            h.extend_from_slice(&word);
        }
        h
    }

    /// Assemble the packet around the payload.
    pub fn compile(&mut self, ctx: &Context, payload: &[u8]) -> Result<(), EncodeError> {
        let recompute = self.chksum == Some(0);
        let mut header = self.header_bytes(self.chksum.unwrap_or(0));
        self.ip.compile(ctx, proto::GRE, &header, payload)?;

        if recompute {
            let chksum = InetSum::new()
                .add_slice(&header)
                .add_slice(payload)
                .finalize();
            header = self.header_bytes(chksum);
            self.ip.update_l4_header(&header);
        }
        Ok(())
    }
}

impl Linkable for GrePacket {
    fn frames(&self) -> &[EthernetPacket] {
        self.ip.frames()
    }
}
