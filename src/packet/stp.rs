use byteorder::{BigEndian, ByteOrder};

use crate::err::EncodeError;
use crate::packet::{EthernetPacket, Linkable};
use crate::val::MacAddress;

/// BPDU flag bits.
pub mod bpdu_flags {
    /// Topology change.
    pub const TOPO_CHANGE: u8 = 0x01;
    /// Proposal (RSTP).
    pub const PROPOSAL: u8 = 0x02;
    /// Learning (RSTP).
    pub const LEARNING: u8 = 0x10;
    /// Forwarding (RSTP).
    pub const FORWARDING: u8 = 0x20;
    /// Agreement (RSTP).
    pub const AGREEMENT: u8 = 0x40;
    /// Topology change acknowledgement.
    pub const TOPO_CHANGE_ACK: u8 = 0x80;
}

const STP_DEST_MAC: MacAddress = MacAddress([0x01, 0x80, 0xc2, 0x00, 0x00, 0x00]);
const CONFIG_BPDU_LEN: usize = 35;
const RSTP_BPDU_LEN: usize = 36;
const TCN_BPDU_LEN: usize = 4;

/// Identity of a bridge in a BPDU: 4 bit priority, 12 bit system id
/// extension and the bridge MAC address.
#[derive(Copy, Clone, Debug)]
pub struct BridgeId {
    /// Priority (0-15, in units of 4096 on the wire).
    pub prio: u8,
    /// System id extension (0-4095).
    pub ext: u16,
    /// Bridge MAC address.
    pub mac: MacAddress,
}

impl BridgeId {
    fn write(&self, out: &mut [u8]) {
        BigEndian::write_u16(out, ((self.prio as u16) << 12) | (self.ext & 0x0fff));
        out[2..8].copy_from_slice(&self.mac.octets());
    }
}

/// Spanning-tree BPDU: classic 802.1D configuration and TCN frames
/// plus the 802.1w rapid variant.
///
/// BPDUs travel in an 802.3 frame with LLC 42:42:03 to the bridge
/// group address; time fields are encoded in 1/256 second units.
#[derive(Debug)]
pub struct StpPacket {
    eth: EthernetPacket,
}

/// All fields of a configuration BPDU.
#[derive(Copy, Clone, Debug)]
pub struct StpConfig {
    /// Root bridge identity.
    pub root: BridgeId,
    /// Root path cost.
    pub root_path_cost: u32,
    /// Sending bridge identity.
    pub bridge: BridgeId,
    /// Port priority (0-15).
    pub port_prio: u8,
    /// Port number (1-4095).
    pub port_number: u16,
    /// Message age in seconds.
    pub message_age: f64,
    /// Max age in seconds.
    pub max_age: f64,
    /// Hello time in seconds.
    pub hello_time: f64,
    /// Forward delay in seconds.
    pub forward_delay: f64,
    /// Flag bits (see [`bpdu_flags`]).
    pub flags: u8,
}

impl StpPacket {
    /// Empty BPDU frame.
    pub fn new() -> StpPacket {
        StpPacket {
            eth: EthernetPacket::new(),
        }
    }

    /// The frame, for source MAC and VLAN tagging.
    pub fn frame_mut(&mut self) -> &mut EthernetPacket {
        &mut self.eth
    }

    fn finish(&mut self, body: &[u8]) -> Result<(), EncodeError> {
        if !self.eth.has_dest_mac() {
            self.eth.set_dest_mac(STP_DEST_MAC);
        }
        self.eth.set_payload(body)?;
        self.eth.add_llc_header(0x42, 0x42, 3)?;
        self.eth.set_length();
        Ok(())
    }

    fn write_config_fields(body: &mut [u8], config: &StpConfig) {
        body[4] = config.flags;
        config.root.write(&mut body[5..13]);
        BigEndian::write_u32(&mut body[13..17], config.root_path_cost);
        config.bridge.write(&mut body[17..25]);
        BigEndian::write_u16(
            &mut body[25..27],
            ((config.port_prio as u16) << 12) | (config.port_number & 0x0fff),
        );
        BigEndian::write_u16(&mut body[27..29], seconds_to_wire(config.message_age));
        BigEndian::write_u16(&mut body[29..31], seconds_to_wire(config.max_age));
        BigEndian::write_u16(&mut body[31..33], seconds_to_wire(config.hello_time));
        BigEndian::write_u16(&mut body[33..35], seconds_to_wire(config.forward_delay));
    }

    /// Classic 802.1D configuration BPDU.
    pub fn compile_config(&mut self, config: &StpConfig) -> Result<(), EncodeError> {
        let mut body = [0u8; CONFIG_BPDU_LEN];
        // protocol id 0, version 0, type 0
        Self::write_config_fields(&mut body, config);
        self.finish(&body)
    }

    /// 802.1w rapid spanning tree BPDU; `port_role` occupies flag
    /// bits 2-3.
    pub fn compile_config_rstp(
        &mut self,
        config: &StpConfig,
        port_role: u8,
    ) -> Result<(), EncodeError> {
        let mut body = [0u8; RSTP_BPDU_LEN];
        body[2] = 2; // protocol version
        body[3] = 2; // BPDU type: RST
        Self::write_config_fields(&mut body[..CONFIG_BPDU_LEN], config);
        body[4] |= (port_role & 0x03) << 2;
        // version 1 length, always zero
        body[35] = 0;
        self.finish(&body)
    }

    /// Topology change notification BPDU.
    pub fn compile_tcn(&mut self) -> Result<(), EncodeError> {
        let mut body = [0u8; TCN_BPDU_LEN];
        body[3] = 0x80;
        self.finish(&body)
    }
}

/// Seconds to the 1/256 second wire encoding.
fn seconds_to_wire(seconds: f64) -> u16 {
    (seconds * 256.0) as u16
}

impl Default for StpPacket {
    fn default() -> StpPacket {
        StpPacket::new()
    }
}

impl Linkable for StpPacket {
    fn frames(&self) -> &[EthernetPacket] {
        self.eth.frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StpConfig {
        StpConfig {
            root: BridgeId {
                prio: 8,
                ext: 0,
                mac: MacAddress([0xba; 6]),
            },
            root_path_cost: 4,
            bridge: BridgeId {
                prio: 8,
                ext: 0,
                mac: MacAddress([0xba; 6]),
            },
            port_prio: 8,
            port_number: 1,
            message_age: 0.0,
            max_age: 20.0,
            hello_time: 2.0,
            forward_delay: 15.0,
            flags: 0,
        }
    }

    #[test]
    fn config_bpdu_layout() {
        let mut stp = StpPacket::new();
        stp.frame_mut().set_src_mac(MacAddress([0xba; 6]));
        stp.compile_config(&config()).unwrap();

        let frame = stp.frames()[0].bytes();
        assert_eq!(&frame[..6], &[0x01, 0x80, 0xc2, 0x00, 0x00, 0x00]);
        // 802.3 length: llc (3) + bpdu (35)
        assert_eq!(&frame[12..14], &[0x00, 0x26]);
        assert_eq!(&frame[14..17], &[0x42, 0x42, 0x03]);

        let bpdu = &frame[17..];
        assert_eq!(bpdu.len(), 35);
        // protocol id, version, type
        assert_eq!(&bpdu[..4], &[0, 0, 0, 0]);
        // root id: prio 8 << 12
        assert_eq!(&bpdu[5..7], &[0x80, 0x00]);
        assert_eq!(&bpdu[7..13], &[0xba; 6]);
        assert_eq!(BigEndian::read_u32(&bpdu[13..17]), 4);
        // port id 0x8001
        assert_eq!(&bpdu[25..27], &[0x80, 0x01]);
        // times in 1/256 s
        assert_eq!(BigEndian::read_u16(&bpdu[27..29]), 0);
        assert_eq!(BigEndian::read_u16(&bpdu[29..31]), 20 * 256);
        assert_eq!(BigEndian::read_u16(&bpdu[31..33]), 2 * 256);
        assert_eq!(BigEndian::read_u16(&bpdu[33..35]), 15 * 256);
    }

    #[test]
    fn fractional_times() {
        assert_eq!(seconds_to_wire(0.5), 128);
        assert_eq!(seconds_to_wire(255.996), 65534);
    }

    #[test]
    fn rstp_bpdu() {
        let mut stp = StpPacket::new();
        let mut cfg = config();
        cfg.flags = bpdu_flags::LEARNING | bpdu_flags::FORWARDING | bpdu_flags::AGREEMENT;
        cfg.root_path_cost = 20000;
        stp.compile_config_rstp(&cfg, 3).unwrap();

        let frame = stp.frames()[0].bytes();
        let bpdu = &frame[17..];
        assert_eq!(bpdu.len(), 36);
        assert_eq!(bpdu[2], 2);
        assert_eq!(bpdu[3], 2);
        // flags with port role 3 in bits 2-3
        assert_eq!(bpdu[4], 0x70 | (3 << 2));
        assert_eq!(bpdu[35], 0);
    }

    #[test]
    fn tcn_bpdu() {
        let mut stp = StpPacket::new();
        stp.compile_tcn().unwrap();
        let frame = stp.frames()[0].bytes();
        assert_eq!(&frame[12..14], &[0x00, 0x07]);
        assert_eq!(&frame[17..], &[0, 0, 0, 0x80]);
    }
}
