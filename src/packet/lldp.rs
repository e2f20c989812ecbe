use byteorder::{BigEndian, ByteOrder};

use crate::err::EncodeError;
use crate::packet::{EthernetPacket, Linkable, ETHERTYPE_LLDP};
use crate::val::{Ipv4Address, Ipv6Address, MacAddress};

/// LLDP TLV types.
mod tlv_type {
    pub const CHASSIS_ID: u8 = 1;
    pub const PORT_ID: u8 = 2;
    pub const TTL: u8 = 3;
    pub const PORT_DESCR: u8 = 4;
    pub const SYS_NAME: u8 = 5;
    pub const SYS_DESCR: u8 = 6;
    pub const SYS_CAP: u8 = 7;
    pub const MGMT_ADDR: u8 = 8;
    pub const ORG_SPECIFIC: u8 = 127;
}

/// IEEE 802.1 organizationally specific subtypes.
mod subtype_802_1 {
    pub const PVID: u8 = 1;
    pub const PROTO_VID: u8 = 2;
    pub const VLAN_NAME: u8 = 3;
    pub const PROTO_IDENTITY: u8 = 4;
    pub const VID_USAGE_DIGEST: u8 = 5;
    pub const MGMT_VID: u8 = 6;
    pub const LINK_AGGREGATION: u8 = 7;
    pub const CONGESTION_NOTIFICATION: u8 = 8;
    pub const ETS_CONFIG: u8 = 9;
    pub const ETS_RECOMMENDATION: u8 = 0x0a;
    pub const PFC_CONFIG: u8 = 0x0b;
    pub const APP_PRIORITY: u8 = 0x0c;
    pub const EVB: u8 = 0x0d;
    pub const CDCP: u8 = 0x0e;
    pub const APP_VLAN: u8 = 0x10;
}

/// IEEE 802.3 organizationally specific subtypes.
mod subtype_802_3 {
    pub const MAC_PHY: u8 = 1;
    pub const POWER_VIA_MDI: u8 = 2;
    pub const MAX_FRAME_SIZE: u8 = 4;
    pub const EEE: u8 = 5;
    pub const EEE_FAST_WAKE: u8 = 6;
}

/// Profinet organizationally specific subtypes.
mod subtype_pn {
    pub const DELAY: u8 = 1;
    pub const PORT_STATUS: u8 = 2;
    pub const ALIAS: u8 = 3;
    pub const MRP_PORT_STATUS: u8 = 4;
    pub const CHASSIS_MAC: u8 = 5;
    pub const PTCP_STATUS: u8 = 6;
    pub const MAU_TYPE_EXTENSION: u8 = 7;
    pub const MRP_IC_PORT_STATUS: u8 = 8;
    pub const NME_DOMAIN_UUID: u8 = 9;
    pub const NME_NAME_UUID: u8 = 0x0a;
    pub const NME_PARAMETER_UUID: u8 = 0x0b;
}

const OUI_802_1: [u8; 3] = [0x00, 0x80, 0xc2];
const OUI_802_3: [u8; 3] = [0x00, 0x12, 0x0f];
const OUI_PNO: [u8; 3] = [0x00, 0x0e, 0xcf];

const LLDP_DEST_MAC: MacAddress = MacAddress([0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e]);

/// LLDP frame builder.
///
/// TLVs accumulate in call order; [`compile`](Self::compile) renders
/// them into the frame, each as a `(7 bit type << 9) | 9 bit length`
/// word followed by the value bytes, and appends the end TLV unless
/// suppressed.
#[derive(Debug)]
pub struct LldpPacket {
    eth: EthernetPacket,
    tlvs: Vec<(u8, Vec<u8>)>,
}

impl LldpPacket {
    /// Empty LLDP frame.
    pub fn new() -> LldpPacket {
        LldpPacket {
            eth: EthernetPacket::new(),
            tlvs: Vec::new(),
        }
    }

    /// The frame, for MAC header and VLAN tagging.
    pub fn frame_mut(&mut self) -> &mut EthernetPacket {
        &mut self.eth
    }

    fn push(&mut self, tlv_type: u8, value: Vec<u8>) {
        self.tlvs.push((tlv_type, value));
    }

    fn push_org(&mut self, oui: [u8; 3], subtype: u8, body: &[u8]) {
        let mut value = Vec::with_capacity(4 + body.len());
        value.extend_from_slice(&oui);
        value.push(subtype);
        value.extend_from_slice(body);
        self.push(tlv_type::ORG_SPECIFIC, value);
    }

    /// Chassis ID from a MAC address (subtype 4).
    pub fn add_chassis_id_mac(&mut self, mac: MacAddress) {
        let mut v = vec![4];
        v.extend_from_slice(&mac.octets());
        self.push(tlv_type::CHASSIS_ID, v);
    }

    /// Chassis ID from an IPv4 address (subtype 5, family 1).
    pub fn add_chassis_id_ipv4(&mut self, ip: Ipv4Address) {
        let mut v = vec![5, 1];
        v.extend_from_slice(&ip.octets());
        self.push(tlv_type::CHASSIS_ID, v);
    }

    /// Chassis ID from an IPv6 address (subtype 5, family 2).
    pub fn add_chassis_id_ipv6(&mut self, ip: Ipv6Address) {
        let mut v = vec![5, 2];
        v.extend_from_slice(&ip.octets());
        self.push(tlv_type::CHASSIS_ID, v);
    }

    /// Chassis ID with an explicit subtype and raw bytes.
    pub fn add_chassis_id_raw(&mut self, subtype: u8, id: &[u8]) {
        let mut v = vec![subtype];
        v.extend_from_slice(id);
        self.push(tlv_type::CHASSIS_ID, v);
    }

    /// Port ID from a MAC address (subtype 3).
    pub fn add_port_id_mac(&mut self, mac: MacAddress) {
        let mut v = vec![3];
        v.extend_from_slice(&mac.octets());
        self.push(tlv_type::PORT_ID, v);
    }

    /// Port ID from an IPv4 address (subtype 4, family 1).
    pub fn add_port_id_ipv4(&mut self, ip: Ipv4Address) {
        let mut v = vec![4, 1];
        v.extend_from_slice(&ip.octets());
        self.push(tlv_type::PORT_ID, v);
    }

    /// Port ID from an IPv6 address (subtype 4, family 2).
    pub fn add_port_id_ipv6(&mut self, ip: Ipv6Address) {
        let mut v = vec![4, 2];
        v.extend_from_slice(&ip.octets());
        self.push(tlv_type::PORT_ID, v);
    }

    /// Port ID with an explicit subtype and raw bytes.
    pub fn add_port_id_raw(&mut self, subtype: u8, id: &[u8]) {
        let mut v = vec![subtype];
        v.extend_from_slice(id);
        self.push(tlv_type::PORT_ID, v);
    }

    /// Time to live in seconds.
    pub fn add_ttl(&mut self, ttl: u16) {
        self.push(tlv_type::TTL, ttl.to_be_bytes().to_vec());
    }

    /// Port description.
    pub fn add_port_description(&mut self, descr: &[u8]) {
        self.push(tlv_type::PORT_DESCR, descr.to_vec());
    }

    /// System name.
    pub fn add_system_name(&mut self, name: &[u8]) {
        self.push(tlv_type::SYS_NAME, name.to_vec());
    }

    /// System description.
    pub fn add_system_description(&mut self, descr: &[u8]) {
        self.push(tlv_type::SYS_DESCR, descr.to_vec());
    }

    /// System capabilities: supported and enabled bitmaps.
    pub fn add_system_capabilities(&mut self, supported: u16, enabled: u16) {
        let mut v = vec![0u8; 4];
        BigEndian::write_u16(&mut v[0..2], supported);
        BigEndian::write_u16(&mut v[2..4], enabled);
        self.push(tlv_type::SYS_CAP, v);
    }

    /// Management address with explicit address subtype.
    pub fn add_management_address(
        &mut self,
        addr_subtype: u8,
        addr: &[u8],
        if_number_subtype: u8,
        if_number: u32,
        oid: &[u8],
    ) {
        let mut v = Vec::with_capacity(2 + addr.len() + 5 + 1 + oid.len());
        v.push(addr.len() as u8 + 1);
        v.push(addr_subtype);
        v.extend_from_slice(addr);
        v.push(if_number_subtype);
        v.extend_from_slice(&if_number.to_be_bytes());
        v.push(oid.len() as u8);
        v.extend_from_slice(oid);
        self.push(tlv_type::MGMT_ADDR, v);
    }

    /// 802.1: port VLAN ID.
    pub fn add_port_vid(&mut self, pvid: u16) {
        self.push_org(OUI_802_1, subtype_802_1::PVID, &pvid.to_be_bytes());
    }

    /// 802.1: port and protocol VLAN ID.
    pub fn add_protocol_vid(&mut self, ppvid: u16, supported: bool, enabled: bool) {
        let flags = (if supported { 2u8 } else { 0 }) | (if enabled { 4 } else { 0 });
        let mut body = vec![flags];
        body.extend_from_slice(&ppvid.to_be_bytes());
        self.push_org(OUI_802_1, subtype_802_1::PROTO_VID, &body);
    }

    /// 802.1: VLAN name.
    pub fn add_vlan_name(&mut self, vid: u16, name: &[u8]) {
        let mut body = Vec::with_capacity(3 + name.len());
        body.extend_from_slice(&vid.to_be_bytes());
        body.push(name.len() as u8);
        body.extend_from_slice(name);
        self.push_org(OUI_802_1, subtype_802_1::VLAN_NAME, &body);
    }

    /// 802.1: protocol identity.
    pub fn add_protocol_identity(&mut self, protocol: &[u8]) {
        let mut body = vec![protocol.len() as u8];
        body.extend_from_slice(protocol);
        self.push_org(OUI_802_1, subtype_802_1::PROTO_IDENTITY, &body);
    }

    /// 802.1: VID usage digest.
    pub fn add_vid_usage_digest(&mut self, digest: u32) {
        self.push_org(
            OUI_802_1,
            subtype_802_1::VID_USAGE_DIGEST,
            &digest.to_be_bytes(),
        );
    }

    /// 802.1: management VID.
    pub fn add_management_vid(&mut self, vid: u16) {
        self.push_org(OUI_802_1, subtype_802_1::MGMT_VID, &vid.to_be_bytes());
    }

    /// 802.1: link aggregation capability/status.
    pub fn add_link_aggregation(
        &mut self,
        capability: bool,
        status: bool,
        port_type: u8,
        port_id: u32,
    ) {
        let flags = (capability as u8) | (status as u8) << 1 | (port_type & 0x03) << 2;
        let mut body = vec![flags];
        body.extend_from_slice(&port_id.to_be_bytes());
        self.push_org(OUI_802_1, subtype_802_1::LINK_AGGREGATION, &body);
    }

    /// 802.1: congestion notification.
    pub fn add_congestion_notification(&mut self, cnpv: u8, ready: u8) {
        self.push_org(
            OUI_802_1,
            subtype_802_1::CONGESTION_NOTIFICATION,
            &[cnpv, ready],
        );
    }

    /// 802.1: ETS configuration.
    pub fn add_ets_config(
        &mut self,
        willing: bool,
        cbs: bool,
        max_tcs: u8,
        prio_table: u32,
        bandwidth_table: u64,
        tsa_table: u64,
    ) {
        let mut body = vec![0u8; 21];
        body[0] = (if willing { 0x80 } else { 0 }) | (if cbs { 0x40 } else { 0 }) | (max_tcs & 0x07);
        BigEndian::write_u32(&mut body[1..5], prio_table);
        BigEndian::write_u64(&mut body[5..13], bandwidth_table);
        BigEndian::write_u64(&mut body[13..21], tsa_table);
        self.push_org(OUI_802_1, subtype_802_1::ETS_CONFIG, &body);
    }

    /// 802.1: ETS recommendation.
    pub fn add_ets_recommendation(
        &mut self,
        prio_table: u32,
        bandwidth_table: u64,
        tsa_table: u64,
    ) {
        let mut body = vec![0u8; 21];
        BigEndian::write_u32(&mut body[1..5], prio_table);
        BigEndian::write_u64(&mut body[5..13], bandwidth_table);
        BigEndian::write_u64(&mut body[13..21], tsa_table);
        self.push_org(OUI_802_1, subtype_802_1::ETS_RECOMMENDATION, &body);
    }

    /// 802.1: priority-based flow control configuration.
    pub fn add_pfc_config(&mut self, willing: bool, mbc: bool, cap: u8, enable: u8) {
        let first =
            (if willing { 0x80 } else { 0 }) | (if mbc { 0x40 } else { 0 }) | (cap & 0x0f);
        self.push_org(OUI_802_1, subtype_802_1::PFC_CONFIG, &[first, enable]);
    }

    /// 802.1: application priority table.
    pub fn add_application_priority(&mut self, entries: &[(u8, u8, u16)]) {
        let mut body = vec![0u8];
        for &(prio, sel, protocol) in entries {
            body.push(((prio & 0x07) << 5) | (sel & 0x07));
            body.extend_from_slice(&protocol.to_be_bytes());
        }
        self.push_org(OUI_802_1, subtype_802_1::APP_PRIORITY, &body);
    }

    /// 802.1: edge virtual bridging.
    #[allow(clippy::too_many_arguments)]
    pub fn add_evb(
        &mut self,
        bridge_status: u8,
        station_status: u8,
        retries: u8,
        rte: u8,
        mode: u8,
        rol_rwd: bool,
        rwd: u8,
        rol_rka: bool,
        rka: u8,
    ) {
        let body = [
            bridge_status,
            station_status,
            ((retries & 0x07) << 5) | (rte & 0x1f),
            ((mode & 0x03) << 6) | (if rol_rwd { 0x20 } else { 0 }) | (rwd & 0x1f),
            (if rol_rka { 0x20 } else { 0 }) | (rka & 0x1f),
        ];
        self.push_org(OUI_802_1, subtype_802_1::EVB, &body);
    }

    /// 802.1: channel discovery and configuration (CDCP).
    pub fn add_cdcp(
        &mut self,
        role: bool,
        s_comp: bool,
        channel_cap: u16,
        scid_svid: &[(u16, u16)],
    ) {
        let mut body = vec![
            (if role { 0x80 } else { 0 }) | (if s_comp { 0x08 } else { 0 }),
            0,
            ((channel_cap >> 8) & 0x0f) as u8,
            channel_cap as u8,
        ];
        for &(scid, svid) in scid_svid {
            body.push((scid >> 4) as u8);
            body.push((((scid & 0x0f) << 4) | ((svid >> 8) & 0x0f)) as u8);
            body.push(svid as u8);
        }
        self.push_org(OUI_802_1, subtype_802_1::CDCP, &body);
    }

    /// 802.1: application VLAN table.
    pub fn add_application_vlan(&mut self, entries: &[(u16, u8, u16)]) {
        let mut body = Vec::with_capacity(entries.len() * 4);
        for &(vid, sel, protocol) in entries {
            let word = (((vid & 0x03ff) as u32) << 20)
                | (((sel & 0x07) as u32) << 16)
                | protocol as u32;
            body.extend_from_slice(&word.to_be_bytes());
        }
        self.push_org(OUI_802_1, subtype_802_1::APP_VLAN, &body);
    }

    /// 802.3: MAC/PHY configuration/status.
    pub fn add_mac_phy_status(
        &mut self,
        autoneg_supported: bool,
        autoneg_enabled: bool,
        autoneg_caps: u16,
        mau_type: u16,
    ) {
        let mut body = vec![0u8; 5];
        body[0] = (autoneg_supported as u8) | (autoneg_enabled as u8) << 1;
        BigEndian::write_u16(&mut body[1..3], autoneg_caps);
        BigEndian::write_u16(&mut body[3..5], mau_type);
        self.push_org(OUI_802_3, subtype_802_3::MAC_PHY, &body);
    }

    fn power_via_mdi_base(
        port_class_pse: bool,
        support: bool,
        state: bool,
        pairs_control: bool,
        pse_power_pair: u8,
        power_class: u8,
    ) -> Vec<u8> {
        let support_byte = (port_class_pse as u8)
            | (support as u8) << 1
            | (state as u8) << 2
            | (pairs_control as u8) << 3;
        vec![support_byte, pse_power_pair, power_class]
    }

    /// 802.3: basic power via MDI.
    pub fn add_basic_power_via_mdi(
        &mut self,
        port_class_pse: bool,
        support: bool,
        state: bool,
        pairs_control: bool,
        pse_power_pair: u8,
        power_class: u8,
    ) {
        let body = Self::power_via_mdi_base(
            port_class_pse,
            support,
            state,
            pairs_control,
            pse_power_pair,
            power_class,
        );
        self.push_org(OUI_802_3, subtype_802_3::POWER_VIA_MDI, &body);
    }

    /// 802.3: power via MDI with the DLL classification extension.
    /// Requested/allocated power is in watts (0.1 W wire units).
    #[allow(clippy::too_many_arguments)]
    pub fn add_dll_power_via_mdi(
        &mut self,
        port_class_pse: bool,
        support: bool,
        state: bool,
        pairs_control: bool,
        pse_power_pair: u8,
        power_class: u8,
        power_type: u8,
        power_source: u8,
        pd_4pid: u8,
        power_prio: u8,
        pd_requested_power: f64,
        pse_allocated_power: f64,
    ) {
        let mut body = Self::power_via_mdi_base(
            port_class_pse,
            support,
            state,
            pairs_control,
            pse_power_pair,
            power_class,
        );
        body.push(
            ((power_type & 0x03) << 6)
                | ((power_source & 0x03) << 4)
                | ((pd_4pid & 0x01) << 2)
                | (power_prio & 0x03),
        );
        body.extend_from_slice(&(watts_to_wire(pd_requested_power)).to_be_bytes());
        body.extend_from_slice(&(watts_to_wire(pse_allocated_power)).to_be_bytes());
        self.push_org(OUI_802_3, subtype_802_3::POWER_VIA_MDI, &body);
    }

    /// 802.3: maximum frame size.
    pub fn add_max_frame_size(&mut self, size: u16) {
        self.push_org(OUI_802_3, subtype_802_3::MAX_FRAME_SIZE, &size.to_be_bytes());
    }

    /// 802.3: energy efficient Ethernet wake times.
    pub fn add_eee(&mut self, tx_tw: u16, rx_tw: u16, fb_tw: u16, echo_tx_tw: u16, echo_rx_tw: u16) {
        let mut body = vec![0u8; 10];
        BigEndian::write_u16(&mut body[0..2], tx_tw);
        BigEndian::write_u16(&mut body[2..4], rx_tw);
        BigEndian::write_u16(&mut body[4..6], fb_tw);
        BigEndian::write_u16(&mut body[6..8], echo_tx_tw);
        BigEndian::write_u16(&mut body[8..10], echo_rx_tw);
        self.push_org(OUI_802_3, subtype_802_3::EEE, &body);
    }

    /// 802.3: EEE fast wake.
    pub fn add_eee_fast_wake(&mut self, tx: bool, rx: bool, echo_tx: bool, echo_rx: bool) {
        self.push_org(
            OUI_802_3,
            subtype_802_3::EEE_FAST_WAKE,
            &[tx as u8, rx as u8, echo_tx as u8, echo_rx as u8],
        );
    }

    /// Profinet: measured port and cable delays.
    pub fn add_pn_delay(
        &mut self,
        port_rx_local: u32,
        port_rx_remote: u32,
        port_tx_local: u32,
        port_tx_remote: u32,
        cable_delay: u32,
    ) {
        let mut body = vec![0u8; 20];
        BigEndian::write_u32(&mut body[0..4], port_rx_local);
        BigEndian::write_u32(&mut body[4..8], port_rx_remote);
        BigEndian::write_u32(&mut body[8..12], port_tx_local);
        BigEndian::write_u32(&mut body[12..16], port_tx_remote);
        BigEndian::write_u32(&mut body[16..20], cable_delay);
        self.push_org(OUI_PNO, subtype_pn::DELAY, &body);
    }

    /// Profinet: port status (RTC2 and RTC3 state).
    pub fn add_pn_port_status(
        &mut self,
        rtc2_status: u16,
        rtc3_state: u8,
        rtc3_fragmentation: bool,
        rtc3_short_preamble: bool,
        rtc3_optimized: bool,
    ) {
        let rtc3 = (rtc3_state as u16 & 0x07)
            | (if rtc3_fragmentation { 0x1000 } else { 0 })
            | (if rtc3_short_preamble { 0x2000 } else { 0 })
            | (if rtc3_optimized { 0x8000 } else { 0 });
        let mut body = vec![0u8; 4];
        BigEndian::write_u16(&mut body[0..2], rtc2_status);
        BigEndian::write_u16(&mut body[2..4], rtc3);
        self.push_org(OUI_PNO, subtype_pn::PORT_STATUS, &body);
    }

    /// Profinet: alias name.
    pub fn add_pn_alias(&mut self, alias: &[u8]) {
        self.push_org(OUI_PNO, subtype_pn::ALIAS, alias);
    }

    /// Profinet: MRP port status with the ring domain UUID.
    pub fn add_pn_mrp_port_status(&mut self, domain_uuid: [u8; 16], port_state: u16) {
        let mut body = Vec::with_capacity(18);
        body.extend_from_slice(&domain_uuid);
        body.extend_from_slice(&(port_state & 0x03).to_be_bytes());
        self.push_org(OUI_PNO, subtype_pn::MRP_PORT_STATUS, &body);
    }

    /// Profinet: chassis MAC.
    pub fn add_pn_chassis_mac(&mut self, mac: MacAddress) {
        self.push_org(OUI_PNO, subtype_pn::CHASSIS_MAC, &mac.octets());
    }

    /// Profinet: PTCP status. Period fields carry a valid bit in the
    /// top bit, set when the value is non-zero.
    #[allow(clippy::too_many_arguments)]
    pub fn add_pn_ptcp_status(
        &mut self,
        master_source_mac: MacAddress,
        subdomain_uuid: [u8; 16],
        ir_data_uuid: [u8; 16],
        period_length: u32,
        red_orange_begin: u32,
        orange_begin: u32,
        green_begin: u32,
    ) {
        let mut body = Vec::with_capacity(6 + 32 + 16);
        body.extend_from_slice(&master_source_mac.octets());
        body.extend_from_slice(&subdomain_uuid);
        body.extend_from_slice(&ir_data_uuid);
        for period in [period_length, red_orange_begin, orange_begin, green_begin] {
            let valid = if period != 0 { 0x8000_0000 } else { 0 };
            body.extend_from_slice(&(period | valid).to_be_bytes());
        }
        self.push_org(OUI_PNO, subtype_pn::PTCP_STATUS, &body);
    }

    /// Profinet: MAU type extension.
    pub fn add_pn_mau_type_extension(&mut self, mau_type_extension: u16) {
        self.push_org(
            OUI_PNO,
            subtype_pn::MAU_TYPE_EXTENSION,
            &mau_type_extension.to_be_bytes(),
        );
    }

    /// Profinet: MRP interconnection port status.
    pub fn add_pn_mrp_ic_port_status(&mut self, domain_id: u16, role: u16, position: u16) {
        let mut body = vec![0u8; 6];
        BigEndian::write_u16(&mut body[0..2], domain_id);
        BigEndian::write_u16(&mut body[2..4], role);
        BigEndian::write_u16(&mut body[4..6], position);
        self.push_org(OUI_PNO, subtype_pn::MRP_IC_PORT_STATUS, &body);
    }

    /// Profinet: NME domain UUID.
    pub fn add_pn_nme_domain_uuid(&mut self, uuid: [u8; 16]) {
        self.push_org(OUI_PNO, subtype_pn::NME_DOMAIN_UUID, &uuid);
    }

    /// Profinet: NME name UUID.
    pub fn add_pn_nme_name_uuid(&mut self, uuid: [u8; 16]) {
        self.push_org(OUI_PNO, subtype_pn::NME_NAME_UUID, &uuid);
    }

    /// Profinet: NME parameter UUID.
    pub fn add_pn_nme_parameter_uuid(&mut self, uuid: [u8; 16]) {
        self.push_org(OUI_PNO, subtype_pn::NME_PARAMETER_UUID, &uuid);
    }

    /// Free-form TLV with any type below 127.
    pub fn add_raw_tlv(&mut self, tlv_type: u8, value: &[u8]) {
        debug_assert!(value.len() <= 511);
        self.push(tlv_type, value.to_vec());
    }

    /// Organizationally specific TLV with a caller-chosen OUI.
    pub fn add_oui_tlv(&mut self, oui: [u8; 3], subtype: u8, value: &[u8]) {
        debug_assert!(value.len() <= 507);
        self.push_org(oui, subtype, value);
    }

    /// Render all TLVs into the frame. The standard LLDP multicast
    /// address is used when no destination was set.
    pub fn compile(&mut self, with_end_tlv: bool) -> Result<(), EncodeError> {
        if !self.eth.has_dest_mac() {
            self.eth.set_dest_mac(LLDP_DEST_MAC);
        }
        self.eth.set_type_length(ETHERTYPE_LLDP);

        for (tlv_type, value) in &self.tlvs {
            let type_len = ((*tlv_type as u16 & 0x7f) << 9) | (value.len() as u16 & 0x1ff);
            self.eth.append_payload(&type_len.to_be_bytes())?;
            self.eth.append_payload(value)?;
        }
        if with_end_tlv {
            self.eth.append_payload(&[0, 0])?;
        }
        Ok(())
    }
}

/// Watts to the 0.1 W wire unit of the power TLVs.
fn watts_to_wire(watts: f64) -> u16 {
    (watts * 10.0) as u16
}

impl Default for LldpPacket {
    fn default() -> LldpPacket {
        LldpPacket::new()
    }
}

impl Linkable for LldpPacket {
    fn frames(&self) -> &[EthernetPacket] {
        self.eth.frames()
    }
}
