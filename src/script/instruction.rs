use crate::ctx::Context;
use crate::err::{EncodeError, ParamError, ParseError};
use crate::lex;
use crate::packet::{
    bpdu_flags, ArpPacket, BridgeId, EthernetPacket, GrePacket, IcmpPacket, IgmpPacket,
    IpPacket, Linkable, LldpPacket, StpConfig, StpPacket, TcpFlags, TcpPacket, UdpPacket,
    VrrpPacket, VxlanPacket,
};
use crate::params::{Parameter, ParameterList, StreamOrInstruction};
use crate::span::Span;
use crate::val::{Ipv4Address, Ipv6Address, MacAddress};

use super::lldp_args;

/// Embedded instructions deeper than this abort the compile (real
/// scripts do not exceed a depth of 2-3).
const MAX_RECURSION_DEPTH: u32 = 8;

/// MTU applied while compiling an embedded packet, so embedding is not
/// limited by the link MTU (but still bounded to something sendable).
const EMBEDDED_MTU: usize = 32 * 1024;

/// Result of compiling one instruction.
pub struct CompiledInstruction {
    /// True when the script author wrote a timestamp.
    pub has_timestamp: bool,
    /// The raw timestamp value from the script (unscaled).
    pub timestamp: u64,
    /// True for an absolute timestamp, false for a `+` relative one.
    pub is_absolute: bool,
    /// The compiled packet.
    pub packet: Box<dyn Linkable>,
}

/// Errors inside an encoder, before they gain instruction context.
pub(crate) enum BuildError {
    Param(ParamError),
    Encode(EncodeError),
    /// An embedded instruction failed; its diagnostic is complete.
    Nested(ParseError),
    /// The protocol identifier matched no encoder.
    UnknownProtocol,
}

impl From<ParamError> for BuildError {
    fn from(e: ParamError) -> BuildError {
        BuildError::Param(e)
    }
}

impl From<EncodeError> for BuildError {
    fn from(e: EncodeError) -> BuildError {
        BuildError::Encode(e)
    }
}

impl From<ParseError> for BuildError {
    fn from(e: ParseError) -> BuildError {
        BuildError::Nested(e)
    }
}

type Compiled = Result<Box<dyn Linkable>, BuildError>;

/// Parses one instruction and compiles it into a packet.
///
/// `ip_optional_dest_mac` lets IP-based instructions omit the
/// destination MAC (the send path may resolve it); multicast
/// destinations always derive their MAC.
pub struct InstructionParser<'c> {
    ctx: &'c Context,
    ip_optional_dest_mac: bool,
    mtu: usize,
    depth: u32,
}

impl<'c> InstructionParser<'c> {
    /// New parser over a compile context.
    pub fn new(ctx: &'c Context, ip_optional_dest_mac: bool) -> InstructionParser<'c> {
        InstructionParser {
            ctx,
            ip_optional_dest_mac,
            mtu: ctx.settings.mtu(),
            depth: 0,
        }
    }

    /// Compile the instruction `[timestamp ':'] ident '(' plist ')'`.
    pub fn parse(&mut self, instruction: &str) -> Result<CompiledInstruction, ParseError> {
        self.parse_inner(instruction, false, false)
    }

    fn parse_inner(
        &mut self,
        text: &str,
        ignore_trailing: bool,
        no_eth_header: bool,
    ) -> Result<CompiledInstruction, ParseError> {
        let (pos, timestamp) = self.parse_timestamp(text)?;
        let (keyword_span, paren) = self.parse_protocol_identifier(text, pos)?;
        let keyword = &text[keyword_span.start..keyword_span.end()];

        let params = ParameterList::parse(text, paren, ignore_trailing)
            .map_err(|at| ParseError::new(text, "Syntax error", Span::at(at)))?;
        let params_span = Span::new(paren, text.len().saturating_sub(paren));

        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            self.depth -= 1;
            return Err(ParseError::new(
                text,
                "Maximum depth of embedded instructions reached",
                keyword_span,
            ));
        }
        let result = self
            .dispatch(keyword, no_eth_header, &params)
            .and_then(|packet| {
                params.check_all_used()?;
                Ok(packet)
            });
        self.depth -= 1;

        match result {
            Ok(packet) => Ok(CompiledInstruction {
                has_timestamp: timestamp.is_some(),
                timestamp: timestamp.map(|(t, _)| t).unwrap_or(0),
                is_absolute: timestamp.map(|(_, abs)| abs).unwrap_or(false),
                packet,
            }),
            Err(e) => Err(self.to_parse_error(text, keyword_span, params_span, e)),
        }
    }

    fn dispatch(&mut self, keyword: &str, no_eth: bool, params: &ParameterList<'_>) -> Compiled {
        match keyword {
            "raw" => self.compile_raw(no_eth, params),
            "eth" => self.compile_eth(params),
            "arp" => self.compile_arp(params, false, false),
            "arp-probe" => self.compile_arp(params, true, false),
            "arp-announce" => self.compile_arp(params, false, true),
            "ipv4" => self.compile_ip(no_eth, params, false),
            "ipv6" => self.compile_ip(no_eth, params, true),
            "udp" => self.compile_udp(no_eth, params, false),
            "udp6" => self.compile_udp(no_eth, params, true),
            "vrrp" => self.compile_vrrp(no_eth, params, 2),
            "vrrp3" => self.compile_vrrp(no_eth, params, 3),
            "stp" => self.compile_stp(no_eth, params, false, false),
            "stp-tcn" => self.compile_stp(no_eth, params, false, true),
            "rstp" => self.compile_stp(no_eth, params, true, false),
            "igmp" => self.compile_igmp(no_eth, params, false, false, false, false),
            "igmp-query" => self.compile_igmp(no_eth, params, false, true, false, false),
            "igmp3-query" => self.compile_igmp(no_eth, params, true, true, false, false),
            "igmp-report" => self.compile_igmp(no_eth, params, false, false, true, false),
            "igmp-leave" => self.compile_igmp(no_eth, params, false, false, false, true),
            "icmp" => self.compile_icmp(no_eth, params),
            "icmp-unreachable" => self.compile_icmp_embedded(no_eth, params, 3),
            "icmp-src-quench" => self.compile_icmp_embedded(no_eth, params, 4),
            "icmp-time-exceeded" => self.compile_icmp_embedded(no_eth, params, 11),
            "icmp-redirect" => self.compile_icmp_redirect(no_eth, params),
            "icmp-echo" => self.compile_icmp_ping(no_eth, params, false),
            "icmp-echo-reply" => self.compile_icmp_ping(no_eth, params, true),
            "tcp" => self.compile_tcp(no_eth, params),
            "tcp-syn" => self.compile_tcp_fixed(no_eth, params, 0, 0, SYN),
            "tcp-syn-ack" => self.compile_tcp_fixed(no_eth, params, 0, 1, SYN_ACK),
            "tcp-syn-ack2" => self.compile_tcp_fixed(no_eth, params, 1, 1, ACK),
            "tcp-fin" => self.compile_tcp_fixed(no_eth, params, 1, 1, FIN_ACK),
            "tcp-fin-ack" => self.compile_tcp_fixed(no_eth, params, 1, 2, FIN_ACK),
            "tcp-fin-ack2" => self.compile_tcp_fixed(no_eth, params, 2, 2, ACK),
            "tcp-reset" => self.compile_tcp_fixed(no_eth, params, 0, 0, RST),
            "vxlan" => self.compile_vxlan(no_eth, params, false),
            "vxlan6" => self.compile_vxlan(no_eth, params, true),
            "gre" => self.compile_gre(no_eth, params, false),
            "gre6" => self.compile_gre(no_eth, params, true),
            "lldp" => self.compile_lldp(no_eth, params),
            _ => Err(BuildError::UnknownProtocol),
        }
    }

    fn to_parse_error(
        &self,
        text: &str,
        keyword_span: Span,
        params_span: Span,
        e: BuildError,
    ) -> ParseError {
        match e {
            BuildError::Nested(inner) => inner,
            BuildError::UnknownProtocol => {
                ParseError::new(text, "Unknown protocol type", keyword_span)
            }
            BuildError::Encode(e) => {
                ParseError::new(text, &e.to_string(), Span::new(0, text.len()))
            }
            BuildError::Param(e) => match &e {
                ParamError::UnknownParameter { name } => {
                    ParseError::with_details(text, "Missing parameter", name, params_span)
                }
                ParamError::RangeViolation { span, .. } => {
                    ParseError::new(text, e.headline(), *span)
                }
                ParamError::BadFormat { span, .. } => ParseError::new(text, e.headline(), *span),
                ParamError::UnusedParameter { span, .. } => {
                    ParseError::new(text, e.headline(), *span)
                }
            },
        }
    }

    /// Optional leading timestamp: digits for absolute, `+digits` for
    /// relative, terminated by `:`.
    fn parse_timestamp(
        &self,
        text: &str,
    ) -> Result<(usize, Option<(u64, bool)>), ParseError> {
        let pos = lex::skip_whitespace(text, 0);
        let b = text.as_bytes();
        let lead = match b.get(pos) {
            Some(c) if c.is_ascii_digit() || *c == b'+' => *c,
            _ => return Ok((pos, None)),
        };
        let is_absolute = lead != b'+';
        let digits_at = if is_absolute { pos } else { pos + 1 };
        let (value, consumed) = lex::scan_u64(&text[digits_at..], 10)
            .ok_or_else(|| ParseError::new(text, "Invalid timestamp", Span::at(pos)))?;
        let after = digits_at + consumed;
        let colon = lex::next_char_ignore_whitespace(text, after, b':').ok_or_else(|| {
            ParseError::new(text, "Expected ':' after timestamp", Span::at(after))
        })?;
        Ok((colon + 1, Some((value, is_absolute))))
    }

    /// Protocol identifier followed by `(`.
    fn parse_protocol_identifier(
        &self,
        text: &str,
        pos: usize,
    ) -> Result<(Span, usize), ParseError> {
        let start = lex::next_key_start(text, pos).ok_or_else(|| {
            ParseError::new(text, "Missing protocol specifier", Span::at(pos))
        })?;
        let end = lex::next_key_end(text, start);
        let keyword_span = Span::new(start, end - start);
        let paren = lex::next_char_ignore_whitespace(text, end, b'(').ok_or_else(|| {
            ParseError::new(text, "Expected '(' after protocol specifier", keyword_span)
        })?;
        Ok((keyword_span, paren))
    }

    fn mac_or_own(
        &self,
        params: &ParameterList<'_>,
        name: &str,
    ) -> Result<MacAddress, ParamError> {
        params.mac_or(&self.ctx.rng, name, self.ctx.settings.my_mac())
    }

    fn ipv4_or_own(
        &self,
        params: &ParameterList<'_>,
        name: &str,
    ) -> Result<Ipv4Address, ParamError> {
        params.ipv4_or(&self.ctx.rng, name, self.ctx.settings.my_ipv4())
    }

    fn ipv6_or_own(
        &self,
        params: &ParameterList<'_>,
        name: &str,
    ) -> Result<Ipv6Address, ParamError> {
        params.ipv6_or(&self.ctx.rng, name, self.ctx.settings.my_ipv6())
    }

    /// MAC header: `smac` defaults to the own address; `dmac` is
    /// mandatory unless suppressed or optional. Returns true when a
    /// destination was set.
    fn compile_mac_header(
        &self,
        params: &ParameterList<'_>,
        frame: &mut EthernetPacket,
        no_destination: bool,
        dest_optional: bool,
    ) -> Result<bool, ParamError> {
        frame.set_src_mac(self.mac_or_own(params, "smac")?);
        if !no_destination {
            let dest = if dest_optional {
                params.opt("dmac")
            } else {
                Some(params.req("dmac")?)
            };
            if let Some(par) = dest {
                frame.set_dest_mac(par.as_mac(&self.ctx.rng)?);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// VLAN tags in declaration order; `vtype`/`prio`/`dei` are scoped
    /// to their `vid` group.
    fn compile_vlan_tags(
        &self,
        params: &ParameterList<'_>,
        frame: &mut EthernetPacket,
    ) -> Result<(), BuildError> {
        let rng = &self.ctx.rng;
        let mut cursor = params.opt("vid");
        while let Some(vid_par) = cursor {
            let is_ctag = params.u8_group_or(rng, vid_par, "vid", "vtype", 1, 2, 1)? == 1;
            let vid = vid_par.as_u16(rng, 0, 0x0fff)?;
            let prio = params.u8_group_or(rng, vid_par, "vid", "prio", 0, 7, 0)?;
            let dei = params.u8_group_or(rng, vid_par, "vid", "dei", 0, 1, 0)?;
            frame.add_vlan_tag(is_ctag, vid, prio, dei)?;
            cursor = params.opt_after(vid_par, None, "vid");
        }
        Ok(())
    }

    fn parse_ipv4_params(
        &self,
        params: &ParameterList<'_>,
        ip: &mut IpPacket,
        no_destination_ip: bool,
    ) -> Result<bool, ParamError> {
        let rng = &self.ctx.rng;
        ip.set_dscp(params.u8_or(rng, "dscp", 0, 0x3f, 0)?);
        ip.set_ecn(params.u8_or(rng, "ecn", 0, 3, 0)?);
        ip.set_ttl(params.u8_or(rng, "ttl", 0, 255, 64)?);
        ip.set_dont_fragment(params.flag_or(rng, "df", false)?);
        let mut multicast = false;
        if !no_destination_ip {
            let dest = params.req("dip")?.as_ipv4(rng)?;
            ip.set_destination_v4(dest);
            multicast = dest.is_multicast();
        }
        ip.set_source_v4(self.ipv4_or_own(params, "sip")?);
        if let Some(par) = params.opt("id") {
            ip.set_identification(par.as_u16_any(rng)?);
        }
        Ok(multicast)
    }

    fn parse_ipv6_params(
        &self,
        params: &ParameterList<'_>,
        ip: &mut IpPacket,
        no_destination_ip: bool,
    ) -> Result<bool, ParamError> {
        let rng = &self.ctx.rng;
        ip.set_dscp(params.u8_or(rng, "dscp", 0, 0x3f, 0)?);
        ip.set_ecn(params.u8_or(rng, "ecn", 0, 3, 0)?);
        ip.set_ttl(params.u8_or(rng, "ttl", 0, 255, 64)?);
        let mut multicast = false;
        if !no_destination_ip {
            let dest = params.req("dip")?.as_ipv6(rng)?;
            ip.set_destination_v6(dest);
            multicast = dest.is_multicast();
        }
        ip.set_source_v6(self.ipv6_or_own(params, "sip")?);
        if let Some(par) = params.opt("fl") {
            ip.set_flow_label(par.as_u32(rng, 0, 0xf_ffff)?);
        }
        Ok(multicast)
    }

    fn parse_ip_params(
        &self,
        params: &ParameterList<'_>,
        ip: &mut IpPacket,
        is_v6: bool,
        no_destination_ip: bool,
    ) -> Result<bool, ParamError> {
        if is_v6 {
            self.parse_ipv6_params(params, ip, no_destination_ip)
        } else {
            self.parse_ipv4_params(params, ip, no_destination_ip)
        }
    }

    /// MAC header and VLAN tags for an IP-based instruction.
    fn compile_ip_l2(
        &self,
        params: &ParameterList<'_>,
        ip: &mut IpPacket,
        no_eth: bool,
        dest_is_multicast: bool,
    ) -> Result<(), BuildError> {
        if !no_eth {
            let dest_optional = self.ip_optional_dest_mac || dest_is_multicast;
            self.compile_mac_header(params, ip.first_frame_mut(), false, dest_optional)?;
            self.compile_vlan_tags(params, ip.first_frame_mut())?;
        }
        Ok(())
    }

    /// Resolve a payload parameter that may hold an embedded
    /// instruction: plain bytes pass through, an instruction compiles
    /// recursively (with a widened MTU) down to its first frame.
    fn compile_embedded(
        &mut self,
        par: &Parameter<'_>,
        no_eth_header: bool,
    ) -> Result<Vec<u8>, BuildError> {
        match par.as_stream_or_instruction(&self.ctx.rng, usize::MAX)? {
            StreamOrInstruction::Stream(bytes) => Ok(bytes.to_vec()),
            StreamOrInstruction::Instruction { text, .. } => {
                let saved_mtu = self.mtu;
                self.mtu = EMBEDDED_MTU;
                let result = self.parse_inner(text, true, no_eth_header);
                self.mtu = saved_mtu;

                let compiled = result?;
                let frame = compiled.packet.first_frame();
                Ok(if no_eth_header {
                    frame.payload().to_vec()
                } else {
                    frame.bytes().to_vec()
                })
            }
        }
    }

    fn compile_raw(&self, no_eth: bool, params: &ParameterList<'_>) -> Compiled {
        let rng = &self.ctx.rng;
        let mut payload = Vec::new();
        for par in params.iter() {
            params.set_used(par, true);
            match par.name() {
                "byte" => payload.push(par.as_u8_any(rng)?),
                "be16" => payload.extend_from_slice(&par.as_u16_any(rng)?.to_be_bytes()),
                "be32" => payload.extend_from_slice(&par.as_u32_any(rng)?.to_be_bytes()),
                "be64" => payload.extend_from_slice(&par.as_u64_any(rng)?.to_be_bytes()),
                "le16" => payload.extend_from_slice(&par.as_u16_any(rng)?.to_le_bytes()),
                "le32" => payload.extend_from_slice(&par.as_u32_any(rng)?.to_le_bytes()),
                "le64" => payload.extend_from_slice(&par.as_u64_any(rng)?.to_le_bytes()),
                "ip4" => payload.extend_from_slice(&par.as_ipv4(rng)?.octets()),
                "ip6" => payload.extend_from_slice(&par.as_ipv6(rng)?.octets()),
                "mac" => payload.extend_from_slice(&par.as_mac(rng)?.octets()),
                "stream" => payload.extend_from_slice(par.as_stream(rng, usize::MAX)?),
                // unrecognized names stay unused and trip the final check
                _ => params.set_used(par, false),
            }
        }

        let mut eth = EthernetPacket::with_max_len(payload.len() + 14);
        if no_eth {
            eth.set_payload(&payload)?;
        } else {
            eth.set_raw(&payload)?;
        }
        Ok(Box::new(eth))
    }

    fn compile_eth(&self, params: &ParameterList<'_>) -> Compiled {
        let rng = &self.ctx.rng;
        let mut eth = EthernetPacket::new();

        self.compile_mac_header(params, &mut eth, false, false)?;
        self.compile_vlan_tags(params, &mut eth)?;

        // dsap and ssap are both required for LLC; SNAP only applies
        // without an explicit LLC header
        if let Some(dsap_par) = params.opt("dsap") {
            let dsap = dsap_par.as_u8_any(rng)?;
            let ssap = params.req("ssap")?.as_u8_any(rng)?;
            let control = params.u16_or(rng, "control", 0, 0xffff, 3)?;
            eth.add_llc_header(dsap, ssap, control)?;
        } else if let Some(oui_par) = params.opt("oui") {
            let oui = oui_par.as_u32(rng, 0, 0x00ff_ffff)?;
            let protocol = params.req("protocol")?.as_u16_any(rng)?;
            eth.add_snap_header(oui, protocol)?;
        }

        let payload = params.req("payload")?.as_stream(rng, usize::MAX)?;
        eth.set_payload(payload)?;

        if eth.has_llc_header() {
            eth.set_length();
        } else if let Some(par) = params.opt("ethertype") {
            eth.set_type_length(par.as_u16_any(rng)?);
        } else {
            eth.set_length();
        }
        Ok(Box::new(eth))
    }

    fn compile_arp(
        &self,
        params: &ParameterList<'_>,
        is_probe: bool,
        is_announce: bool,
    ) -> Compiled {
        let rng = &self.ctx.rng;
        let mut arp = ArpPacket::new();

        if is_probe {
            arp.probe(
                self.ctx.settings.my_mac(),
                params.req("dip")?.as_ipv4(rng)?,
            )?;
        } else if is_announce {
            arp.announce(self.ctx.settings.my_mac(), self.ipv4_or_own(params, "dip")?)?;
        } else {
            let target_mac = params.mac_or(rng, "dmac", MacAddress::NULL)?;
            arp.set_all(
                params.u16_or(rng, "op", 0, u16::MAX, 1)?,
                self.mac_or_own(params, "smac")?,
                self.ipv4_or_own(params, "sip")?,
                target_mac,
                params.req("dip")?.as_ipv4(rng)?,
            )?;
        }

        self.compile_vlan_tags(params, arp.frame_mut())?;
        Ok(Box::new(arp))
    }

    fn compile_ip(&mut self, no_eth: bool, params: &ParameterList<'_>, is_v6: bool) -> Compiled {
        let rng = &self.ctx.rng;
        let mut ip = IpPacket::new(is_v6, self.mtu);
        let multicast = self.parse_ip_params(params, &mut ip, is_v6, false)?;
        self.compile_ip_l2(params, &mut ip, no_eth, multicast)?;

        let protocol = params.req("protocol")?.as_u8_any(rng)?;
        let payload = params.req("payload")?.as_stream(rng, usize::MAX)?;
        ip.compile(self.ctx, protocol, &[], payload)?;
        Ok(Box::new(ip))
    }

    fn compile_udp(&mut self, no_eth: bool, params: &ParameterList<'_>, is_v6: bool) -> Compiled {
        let rng = &self.ctx.rng;
        let mut udp = UdpPacket::new(is_v6, self.mtu);
        let multicast = self.parse_ip_params(params, udp.ip_mut(), is_v6, false)?;
        self.compile_ip_l2(params, udp.ip_mut(), no_eth, multicast)?;

        udp.set_source_port(params.req("sport")?.as_u16_any(rng)?);
        udp.set_destination_port(params.req("dport")?.as_u16_any(rng)?);

        let payload = match params.opt("payload") {
            Some(par) => par.as_stream(rng, usize::MAX)?.to_vec(),
            None => Vec::new(),
        };
        udp.compile(self.ctx, &payload)?;

        if let Some(par) = params.opt("chksum") {
            udp.set_checksum(par.as_u16_any(rng)?);
        }
        Ok(Box::new(udp))
    }

    fn compile_vxlan(&mut self, no_eth: bool, params: &ParameterList<'_>, is_v6: bool) -> Compiled {
        let rng = &self.ctx.rng;
        let mut vxlan = VxlanPacket::new(is_v6, self.mtu);
        let multicast = self.parse_ip_params(params, vxlan.udp_mut().ip_mut(), is_v6, false)?;
        self.compile_ip_l2(params, vxlan.udp_mut().ip_mut(), no_eth, multicast)?;

        vxlan.udp_mut().set_source_port(params.req("sport")?.as_u16_any(rng)?);
        vxlan
            .udp_mut()
            .set_destination_port(params.u16_or(rng, "dport", 0, u16::MAX, 4789)?);
        vxlan.set_vni(params.u32_or(rng, "vni", 0, 0x00ff_ffff, 0)?);

        let inner = match params.opt("payload") {
            Some(par) => self.compile_embedded(par, false)?,
            None => Vec::new(),
        };
        vxlan.compile(self.ctx, &inner)?;
        Ok(Box::new(vxlan))
    }

    fn compile_tcp(&mut self, no_eth: bool, params: &ParameterList<'_>) -> Compiled {
        let rng = &self.ctx.rng;
        let mut tcp = TcpPacket::new(self.ctx, false, self.mtu);
        let multicast = self.parse_ipv4_params(params, tcp.ip_mut(), false)?;
        self.compile_ip_l2(params, tcp.ip_mut(), no_eth, multicast)?;

        tcp.set_source_port(params.req("sport")?.as_u16_any(rng)?);
        tcp.set_destination_port(params.req("dport")?.as_u16_any(rng)?);
        tcp.set_seq_number(self.ctx, params.req("seq")?.as_u32_any(rng)?);
        tcp.set_ack_number(params.req("ack")?.as_u32_any(rng)?);
        tcp.set_window(params.u16_or(rng, "win", 0, u16::MAX, 1024)?);
        tcp.set_urgent_pointer(params.u16_or(rng, "urgptr", 0, u16::MAX, 0)?);
        tcp.set_flags(TcpFlags {
            fin: params.flag_or(rng, "FIN", false)?,
            syn: params.flag_or(rng, "SYN", false)?,
            rst: params.flag_or(rng, "RESET", false)?,
            psh: params.flag_or(rng, "PUSH", false)?,
            ack: params.flag_or(rng, "ACK", false)?,
            urg: params.flag_or(rng, "URGENT", false)?,
            ece: params.flag_or(rng, "ECN", false)?,
            cwr: params.flag_or(rng, "CWR", false)?,
            nonce: params.flag_or(rng, "NONCE", false)?,
        });

        let payload = match params.opt("payload") {
            Some(par) => par.as_stream(rng, usize::MAX)?.to_vec(),
            None => Vec::new(),
        };
        let mut calc_chksum = true;
        if let Some(par) = params.opt("chksum") {
            tcp.set_checksum(par.as_u16_any(rng)?);
            calc_chksum = false;
        }
        tcp.compile(self.ctx, &payload, calc_chksum)?;
        Ok(Box::new(tcp))
    }

    /// Canned segments replaying a canonical handshake/teardown: fixed
    /// sequence/ack numbers and flags, no payload, window 1024.
    fn compile_tcp_fixed(
        &mut self,
        no_eth: bool,
        params: &ParameterList<'_>,
        seq: u32,
        ack: u32,
        flags: TcpFlags,
    ) -> Compiled {
        let rng = &self.ctx.rng;
        let mut tcp = TcpPacket::new(self.ctx, false, self.mtu);
        let multicast = self.parse_ipv4_params(params, tcp.ip_mut(), false)?;
        self.compile_ip_l2(params, tcp.ip_mut(), no_eth, multicast)?;

        tcp.set_source_port(params.req("sport")?.as_u16_any(rng)?);
        tcp.set_destination_port(params.req("dport")?.as_u16_any(rng)?);
        tcp.set_seq_number(self.ctx, seq);
        tcp.set_ack_number(ack);
        tcp.set_window(1024);
        tcp.set_flags(flags);
        tcp.compile(self.ctx, &[], true)?;
        Ok(Box::new(tcp))
    }

    fn compile_vrrp(&mut self, no_eth: bool, params: &ParameterList<'_>, version: u8) -> Compiled {
        let rng = &self.ctx.rng;
        let mut vrrp = VrrpPacket::new(self.mtu);
        self.parse_ipv4_params(params, vrrp.ip_mut(), true)?;
        if !no_eth {
            // the destination MAC is fixed by the protocol
            self.compile_mac_header(params, vrrp.ip_mut().first_frame_mut(), true, false)?;
            self.compile_vlan_tags(params, vrrp.ip_mut().first_frame_mut())?;
        }

        let first_vrip = params.req("vrip")?;
        vrrp.set_version(version);
        vrrp.set_vrid(params.req("vrid")?.as_u8(rng, 1, 255)?);
        vrrp.add_virtual_ip(first_vrip.as_ipv4(rng)?);
        vrrp.set_prio(params.u8_or(rng, "vrprio", 0, 255, 100)?);
        vrrp.set_msg_type(params.u8_or(rng, "type", 0, 15, 1)?);
        if version == 2 {
            vrrp.set_interval(params.u8_or(rng, "aint", 0, 255, 1)? as u16);
        } else {
            vrrp.set_interval(params.u16_or(rng, "aint", 0, 4095, 100)?);
        }
        if let Some(par) = params.opt("chksum") {
            vrrp.set_checksum(par.as_u16_any(rng)?);
        }

        let mut cursor = first_vrip;
        let mut count = 1;
        while count < 255 {
            match params.opt_after(cursor, None, "vrip") {
                Some(par) => {
                    vrrp.add_virtual_ip(par.as_ipv4(rng)?);
                    cursor = par;
                    count += 1;
                }
                None => break,
            }
        }

        vrrp.compile(self.ctx)?;
        Ok(Box::new(vrrp))
    }

    fn compile_stp(
        &mut self,
        no_eth: bool,
        params: &ParameterList<'_>,
        is_rstp: bool,
        is_tcn: bool,
    ) -> Compiled {
        let rng = &self.ctx.rng;
        let mut stp = StpPacket::new();
        if !no_eth {
            self.compile_mac_header(params, stp.frame_mut(), true, false)?;
            self.compile_vlan_tags(params, stp.frame_mut())?;
        }

        if is_tcn {
            stp.compile_tcn()?;
            return Ok(Box::new(stp));
        }

        let mut flags = 0u8;
        if params.flag_or(rng, "topochange", false)? {
            flags |= bpdu_flags::TOPO_CHANGE;
        }
        if params.flag_or(rng, "topochangeack", false)? {
            flags |= bpdu_flags::TOPO_CHANGE_ACK;
        }

        let mut config = StpConfig {
            root: BridgeId {
                prio: params.u8_or(rng, "rbprio", 0, 15, 8)?,
                ext: params.u16_or(rng, "rbidext", 0, 4095, 0)?,
                mac: self.mac_or_own(params, "rbmac")?,
            },
            root_path_cost: 0,
            bridge: BridgeId {
                prio: params.u8_or(rng, "bprio", 0, 15, 8)?,
                ext: params.u16_or(rng, "bidext", 0, 4095, 0)?,
                mac: self.mac_or_own(params, "bmac")?,
            },
            port_prio: params.u8_or(rng, "pprio", 0, 15, 8)?,
            port_number: params.u16_or(rng, "pnum", 1, 4095, 1)?,
            message_age: params.f64_or(rng, "msgage", 0.0, 255.996, 0.0)?,
            max_age: params.f64_or(rng, "maxage", 0.0, 255.996, 20.0)?,
            hello_time: params.f64_or(rng, "hello", 0.0, 255.996, 2.0)?,
            forward_delay: params.f64_or(rng, "delay", 0.0, 255.996, 15.0)?,
            flags,
        };

        if is_rstp {
            config.root_path_cost =
                params.u32_or(rng, "rpathcost", 1, u32::MAX, 20000)?;
            let port_role = params.u8_or(rng, "portrole", 1, 3, 3)?;
            if params.flag_or(rng, "proposal", false)? {
                config.flags |= bpdu_flags::PROPOSAL;
            }
            if params.flag_or(rng, "learning", true)? {
                config.flags |= bpdu_flags::LEARNING;
            }
            if params.flag_or(rng, "forwarding", true)? {
                config.flags |= bpdu_flags::FORWARDING;
            }
            if params.flag_or(rng, "agreement", false)? {
                config.flags |= bpdu_flags::AGREEMENT;
            }
            stp.compile_config_rstp(&config, port_role)?;
        } else {
            config.root_path_cost = params.u32_or(rng, "rpathcost", 1, 65535, 4)?;
            stp.compile_config(&config)?;
        }
        Ok(Box::new(stp))
    }

    fn compile_igmp(
        &mut self,
        no_eth: bool,
        params: &ParameterList<'_>,
        v3: bool,
        query: bool,
        report: bool,
        leave: bool,
    ) -> Compiled {
        let rng = &self.ctx.rng;
        let fixed_destination = query || report || leave;
        let mut igmp = IgmpPacket::new(self.mtu);
        let multicast = self.parse_ipv4_params(params, igmp.ip_mut(), fixed_destination)?;

        if !no_eth {
            // destinations forced by the protocol always derive their
            // MAC from the group address
            let no_destination =
                multicast || self.ip_optional_dest_mac || fixed_destination;
            self.compile_mac_header(params, igmp.ip_mut().first_frame_mut(), no_destination, false)?;
            self.compile_vlan_tags(params, igmp.ip_mut().first_frame_mut())?;
        }

        if query {
            let (time, s, qrv, qqic) = if v3 {
                let s = params.flag_or(rng, "s", false)?;
                let qrv = params.u8_or(rng, "qrv", 0, 7, 2)?;
                let qqic = params.f64_or(rng, "qqic", 0.0, 31744.0, 125.0)?;
                let time = params.f64_or(rng, "time", 0.0, 3174.4, 10.0)?;

                let mut cursor = params.opt("rsip");
                let mut sources = 0;
                while let Some(par) = cursor {
                    igmp.v3_add_source(par.as_ipv4(rng)?);
                    sources += 1;
                    if sources >= 366 {
                        break;
                    }
                    cursor = params.opt_after(par, None, "rsip");
                }
                (time, s, qrv, qqic)
            } else {
                (params.f64_or(rng, "time", 0.0, 25.5, 10.0)?, false, 0, 0.0)
            };

            match params.opt("group") {
                Some(par) => igmp.compile_group_query(
                    self.ctx,
                    v3,
                    time,
                    s,
                    qrv,
                    qqic,
                    par.as_ipv4(rng)?,
                )?,
                None => igmp.compile_general_query(self.ctx, v3, time, s, qrv, qqic)?,
            }
        } else {
            let group = params.req("group")?.as_ipv4(rng)?;
            if report {
                igmp.compile_report(self.ctx, group)?;
            } else if leave {
                igmp.compile_leave(self.ctx, group)?;
            } else {
                let msg_type = params.req("type")?.as_u8_any(rng)?;
                let time = params.u8_or(rng, "time", 0, 255, 0)?;
                igmp.compile_raw_v12(self.ctx, msg_type, time, group)?;
            }
        }
        Ok(Box::new(igmp))
    }

    fn compile_icmp(&mut self, no_eth: bool, params: &ParameterList<'_>) -> Compiled {
        let rng = &self.ctx.rng;
        let mut icmp = IcmpPacket::new(self.mtu);
        let multicast = self.parse_ipv4_params(params, icmp.ip_mut(), false)?;
        self.compile_ip_l2(params, icmp.ip_mut(), no_eth, multicast)?;

        let msg_type = params.req("type")?.as_u8_any(rng)?;
        let code = params.req("code")?.as_u8_any(rng)?;
        let payload = match params.opt("payload") {
            Some(par) => Some(par.as_stream(rng, usize::MAX)?.to_vec()),
            None => None,
        };
        let chksum = match params.opt("chksum") {
            Some(par) => Some(par.as_u16_any(rng)?),
            None => None,
        };
        icmp.compile_raw(self.ctx, msg_type, code, chksum, payload.as_deref())?;
        Ok(Box::new(icmp))
    }

    fn compile_icmp_embedded(
        &mut self,
        no_eth: bool,
        params: &ParameterList<'_>,
        msg_type: u8,
    ) -> Compiled {
        let rng = &self.ctx.rng;
        let mut icmp = IcmpPacket::new(self.mtu);
        let multicast = self.parse_ipv4_params(params, icmp.ip_mut(), false)?;
        self.compile_ip_l2(params, icmp.ip_mut(), no_eth, multicast)?;

        let code = params.u8_or(rng, "code", 0, 255, 0)?;
        let payload = match params.opt("payload") {
            Some(par) => Some(self.compile_embedded(par, true)?),
            None => None,
        };
        icmp.compile_with_embedded_inet(self.ctx, msg_type, code, payload.as_deref())?;
        Ok(Box::new(icmp))
    }

    fn compile_icmp_redirect(&mut self, no_eth: bool, params: &ParameterList<'_>) -> Compiled {
        let rng = &self.ctx.rng;
        let mut icmp = IcmpPacket::new(self.mtu);
        let multicast = self.parse_ipv4_params(params, icmp.ip_mut(), false)?;
        self.compile_ip_l2(params, icmp.ip_mut(), no_eth, multicast)?;

        let code = params.u8_or(rng, "code", 0, 255, 0)?;
        let gateway = params.req("gw")?.as_ipv4(rng)?;
        let payload = match params.opt("payload") {
            Some(par) => Some(self.compile_embedded(par, true)?),
            None => None,
        };
        icmp.compile_redirect(self.ctx, code, gateway.octets(), payload.as_deref())?;
        Ok(Box::new(icmp))
    }

    fn compile_icmp_ping(
        &mut self,
        no_eth: bool,
        params: &ParameterList<'_>,
        reply: bool,
    ) -> Compiled {
        let rng = &self.ctx.rng;
        let mut icmp = IcmpPacket::new(self.mtu);
        let multicast = self.parse_ipv4_params(params, icmp.ip_mut(), false)?;
        self.compile_ip_l2(params, icmp.ip_mut(), no_eth, multicast)?;

        let id = params.u16_or(rng, "id", 0, u16::MAX, 0)?;
        let seq = params.u16_or(rng, "seq", 0, u16::MAX, 0)?;
        let data = match params.opt("data") {
            Some(par) => self.compile_embedded(par, true)?,
            None => Vec::new(),
        };
        icmp.compile_ping(self.ctx, reply, id, seq, &data)?;
        Ok(Box::new(icmp))
    }

    fn compile_gre(&mut self, no_eth: bool, params: &ParameterList<'_>, is_v6: bool) -> Compiled {
        let rng = &self.ctx.rng;
        let mut gre = GrePacket::new(is_v6, self.mtu);
        let multicast = self.parse_ip_params(params, gre.ip_mut(), is_v6, false)?;
        self.compile_ip_l2(params, gre.ip_mut(), no_eth, multicast)?;

        gre.set_protocol_type(params.req("protocol")?.as_u16_any(rng)?);
        if let Some(par) = params.opt("key") {
            gre.set_key(par.as_u32_any(rng)?);
        }
        if let Some(par) = params.opt("seq") {
            gre.set_sequence(par.as_u32_any(rng)?);
        }
        if let Some(par) = params.opt("chksum") {
            gre.set_checksum(par.as_u16_any(rng)?);
        }

        let payload = match params.opt("payload") {
            Some(par) => self.compile_embedded(par, true)?,
            None => Vec::new(),
        };
        gre.compile(self.ctx, &payload)?;
        Ok(Box::new(gre))
    }

    fn compile_lldp(&mut self, no_eth: bool, params: &ParameterList<'_>) -> Compiled {
        let rng = &self.ctx.rng;
        let mut lldp = LldpPacket::new();
        if !no_eth {
            self.compile_mac_header(params, lldp.frame_mut(), false, true)?;
            self.compile_vlan_tags(params, lldp.frame_mut())?;
        }

        lldp_args::apply(self.ctx, params, &mut lldp)?;

        let with_end = !params.flag_or(rng, "noend", false)?;
        lldp.compile(with_end)?;
        Ok(Box::new(lldp))
    }
}

const NO_FLAGS: TcpFlags = TcpFlags {
    fin: false,
    syn: false,
    rst: false,
    psh: false,
    ack: false,
    urg: false,
    ece: false,
    cwr: false,
    nonce: false,
};

const SYN: TcpFlags = TcpFlags { syn: true, ..NO_FLAGS };
const ACK: TcpFlags = TcpFlags { ack: true, ..NO_FLAGS };
const SYN_ACK: TcpFlags = TcpFlags { syn: true, ack: true, ..NO_FLAGS };
const FIN_ACK: TcpFlags = TcpFlags { fin: true, ack: true, ..NO_FLAGS };
const RST: TcpFlags = TcpFlags { rst: true, ..NO_FLAGS };
