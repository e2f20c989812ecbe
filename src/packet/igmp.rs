use byteorder::{BigEndian, ByteOrder};

use crate::checksum::InetSum;
use crate::ctx::Context;
use crate::err::EncodeError;
use crate::packet::ip::proto;
use crate::packet::{EthernetPacket, IpPacket, Linkable};
use crate::val::Ipv4Address;

const IGMP_V12_LEN: usize = 8;
const IGMP_V3_QUERY_LEN: usize = 12;

/// IGMP v1/v2 messages and v3 queries.
///
/// All IGMP datagrams force TTL 1, DSCP 48, the don't-fragment flag
/// and the IPv4 router-alert option; query and leave destinations are
/// fixed by the protocol (224.0.0.1 general query, the group for a
/// group-specific query, 224.0.0.2 leave).
#[derive(Debug)]
pub struct IgmpPacket {
    ip: IpPacket,
    sources: Vec<Ipv4Address>,
}

impl IgmpPacket {
    /// Empty IGMP message.
    pub fn new(mtu: usize) -> IgmpPacket {
        IgmpPacket {
            ip: IpPacket::new(false, mtu),
            sources: Vec::new(),
        }
    }

    /// The owned IP envelope.
    pub fn ip_mut(&mut self) -> &mut IpPacket {
        &mut self.ip
    }

    /// Add a source address for a v3 group-and-source query.
    pub fn v3_add_source(&mut self, source: Ipv4Address) {
        self.sources.push(source);
    }

    fn force_ip_header_options(&mut self) {
        self.ip.set_ttl(1);
        self.ip.set_dscp(48);
        self.ip.set_dont_fragment(true);
        self.ip.add_router_alert_option();
    }

    /// General query (v2 or v3); `max_resp_time` in seconds.
    pub fn compile_general_query(
        &mut self,
        ctx: &Context,
        v3: bool,
        max_resp_time: f64,
        s: bool,
        qrv: u8,
        qqic: f64,
    ) -> Result<(), EncodeError> {
        let group = Ipv4Address::NULL;
        self.ip
            .set_destination_v4(Ipv4Address([224, 0, 0, 1]));
        if v3 {
            self.sources.clear();
            self.v3_compile_query(ctx, max_resp_time * 10.0, s, qrv, qqic, group)
        } else {
            self.v12_compile_raw(ctx, 0x11, (max_resp_time * 10.0) as u8, group)
        }
    }

    /// Group-specific query (v2 or v3); `max_resp_time` in seconds.
    pub fn compile_group_query(
        &mut self,
        ctx: &Context,
        v3: bool,
        max_resp_time: f64,
        s: bool,
        qrv: u8,
        qqic: f64,
        group: Ipv4Address,
    ) -> Result<(), EncodeError> {
        self.ip.set_destination_v4(group);
        if v3 {
            self.v3_compile_query(ctx, max_resp_time * 10.0, s, qrv, qqic, group)
        } else {
            self.v12_compile_raw(ctx, 0x11, (max_resp_time * 10.0) as u8, group)
        }
    }

    /// v2 membership report for `group`.
    pub fn compile_report(&mut self, ctx: &Context, group: Ipv4Address) -> Result<(), EncodeError> {
        self.ip.set_destination_v4(group);
        self.v12_compile_raw(ctx, 0x16, 0, group)
    }

    /// v2 leave-group for `group` (sent to 224.0.0.2).
    pub fn compile_leave(&mut self, ctx: &Context, group: Ipv4Address) -> Result<(), EncodeError> {
        self.ip
            .set_destination_v4(Ipv4Address([224, 0, 0, 2]));
        self.v12_compile_raw(ctx, 0x17, 0, group)
    }

    /// Raw v1/v2 message with explicit type and time; the caller set
    /// the destination.
    pub fn compile_raw_v12(
        &mut self,
        ctx: &Context,
        msg_type: u8,
        time: u8,
        group: Ipv4Address,
    ) -> Result<(), EncodeError> {
        self.v12_compile_raw(ctx, msg_type, time, group)
    }

    fn v12_compile_raw(
        &mut self,
        ctx: &Context,
        msg_type: u8,
        time: u8,
        group: Ipv4Address,
    ) -> Result<(), EncodeError> {
        self.force_ip_header_options();

        let mut msg = [0u8; IGMP_V12_LEN];
        msg[0] = msg_type;
        msg[1] = time;
        msg[4..8].copy_from_slice(&group.octets());
        let chksum = InetSum::new().add_slice(&msg).finalize();
        BigEndian::write_u16(&mut msg[2..4], chksum);

        self.ip.compile(ctx, proto::IGMP, &msg, &[])
    }

    fn v3_compile_query(
        &mut self,
        ctx: &Context,
        max_resp_code: f64,
        s: bool,
        qrv: u8,
        qqic: f64,
        group: Ipv4Address,
    ) -> Result<(), EncodeError> {
        self.force_ip_header_options();

        let mut msg = [0u8; IGMP_V3_QUERY_LEN];
        msg[0] = 0x11;
        msg[1] = float_to_time_code(max_resp_code);
        msg[4..8].copy_from_slice(&group.octets());
        msg[8] = (if s { 0x08 } else { 0 }) | (qrv & 0x07);
        msg[9] = float_to_time_code(qqic);
        BigEndian::write_u16(&mut msg[10..12], self.sources.len() as u16);

        let mut source_bytes = Vec::with_capacity(self.sources.len() * 4);
        for src in &self.sources {
            source_bytes.extend_from_slice(&src.octets());
        }
        let chksum = InetSum::new()
            .add_slice(&msg)
            .add_slice(&source_bytes)
            .finalize();
        BigEndian::write_u16(&mut msg[2..4], chksum);

        self.ip.compile(ctx, proto::IGMP, &msg, &source_bytes)
    }
}

/// Exponential 8 bit time code used by the v3 max-response-code and
/// QQIC fields: values below 128 are literal, values of 31744 and up
/// saturate to 255, everything else is `0x80 | exp << 4 | mant`.
fn float_to_time_code(value: f64) -> u8 {
    if value < 128.0 {
        value as u8
    } else if value >= 31744.0 {
        255
    } else {
        let mut exp = 0u8;
        let mut mant = (value as u32) >> 3;
        while mant > 31 {
            exp += 1;
            mant >>= 1;
        }
        0x80 | ((exp & 0x07) << 4) | (mant as u8 & 0x0f)
    }
}

impl Linkable for IgmpPacket {
    fn frames(&self) -> &[EthernetPacket] {
        self.ip.frames()
    }
}
