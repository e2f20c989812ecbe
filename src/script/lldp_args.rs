//! LLDP parameter extraction: turns the `lldp(...)` parameter list
//! into TLV builder calls.
//!
//! Core TLVs (chassis ID, port ID, TTL) are always present; everything
//! else is gated on its first parameter, with the remaining fields of
//! the group required once the gate is given. Chassis ID, port ID and
//! management address infer their subtype from the value (IPv4, IPv6,
//! MAC, raw bytes), unless an explicit `...type` forces it.

use md5::{Digest, Md5};

use crate::ctx::Context;
use crate::err::ParamError;
use crate::packet::LldpPacket;
use crate::params::{Parameter, ParameterList};
use crate::rng::Rng;
use crate::val::Uuid;

use super::instruction::BuildError;

/// Default TTL TLV value in seconds.
const DEFAULT_TTL: u16 = 120;

/// Apply all LLDP parameters to the TLV builder in TLV order.
pub(crate) fn apply(
    ctx: &Context,
    params: &ParameterList<'_>,
    lldp: &mut LldpPacket,
) -> Result<(), BuildError> {
    let rng = &ctx.rng;

    chassis_id(ctx, params, lldp)?;
    port_id(ctx, params, lldp)?;
    lldp.add_ttl(params.u16_or(rng, "ttl", 0, u16::MAX, DEFAULT_TTL)?);

    if let Some(par) = params.opt("pdescr") {
        lldp.add_port_description(par.as_stream(rng, 255)?);
    }
    if let Some(par) = params.opt("sysname") {
        lldp.add_system_name(par.as_stream(rng, 255)?);
    }
    if let Some(par) = params.opt("sysdescr") {
        lldp.add_system_description(par.as_stream(rng, 255)?);
    }
    system_capabilities(rng, params, lldp)?;
    management_address(rng, params, lldp)?;

    // IEEE 802.1 TLVs
    if let Some(par) = params.opt("pvid") {
        lldp.add_port_vid(par.as_u16_any(rng)?);
    }
    let mut cursor = params.opt("ppvid");
    while let Some(par) = cursor {
        let vid = par.as_u16_any(rng)?;
        let supported = params.u8_group_or(rng, par, "ppvid", "ppvid-sup", 0, 1, 0)? != 0;
        let enabled = params.u8_group_or(rng, par, "ppvid", "ppvid-en", 0, 1, 0)? != 0;
        lldp.add_protocol_vid(vid, supported, enabled);
        cursor = params.opt_after(par, None, "ppvid");
    }
    let mut cursor = params.opt("vlanvid");
    while let Some(par) = cursor {
        let vid = par.as_u16_any(rng)?;
        let name = params
            .req_after(par, Some("vlanvid"), "vlanname")?
            .as_stream(rng, 32)?;
        lldp.add_vlan_name(vid, name);
        cursor = params.opt_after(par, None, "vlanvid");
    }
    let mut cursor = params.opt("protoid");
    while let Some(par) = cursor {
        lldp.add_protocol_identity(par.as_stream(rng, 255)?);
        cursor = params.opt_after(par, None, "protoid");
    }
    if let Some(par) = params.opt("viddigest") {
        lldp.add_vid_usage_digest(par.as_u32_any(rng)?);
    }
    let mut cursor = params.opt("mgtvid");
    while let Some(par) = cursor {
        lldp.add_management_vid(par.as_u16_any(rng)?);
        cursor = params.opt_after(par, None, "mgtvid");
    }
    if let Some(par) = params.opt("lagcap") {
        let cap = par.as_u8(rng, 0, 1)? != 0;
        let status = params.req("lagstatus")?.as_u8(rng, 0, 1)? != 0;
        let port_type = params.req("lagporttype")?.as_u8(rng, 0, 3)?;
        let port_id = params.req("lagportid")?.as_u32_any(rng)?;
        lldp.add_link_aggregation(cap, status, port_type, port_id);
    }
    if let Some(par) = params.opt("cnpv") {
        let cnpv = par.as_u8_any(rng)?;
        let ready = params.req("cnready")?.as_u8_any(rng)?;
        lldp.add_congestion_notification(cnpv, ready);
    }
    if let Some(par) = params.opt("etswilling") {
        let willing = par.as_u8(rng, 0, 1)? != 0;
        let cbs = params.req("etscbs")?.as_u8(rng, 0, 1)? != 0;
        let max_tc = params.req("etsmaxtc")?.as_u8(rng, 0, 7)?;
        let prio = params.req("etsprio")?.as_u32_any(rng)?;
        let bw = params.req("etsbw")?.as_u64_any(rng)?;
        let tsa = params.req("etstsa")?.as_u64_any(rng)?;
        lldp.add_ets_config(willing, cbs, max_tc, prio, bw, tsa);
    }
    if let Some(par) = params.opt("etsrprio") {
        let prio = par.as_u32_any(rng)?;
        let bw = params.req("etsrbw")?.as_u64_any(rng)?;
        let tsa = params.req("etsrtsa")?.as_u64_any(rng)?;
        lldp.add_ets_recommendation(prio, bw, tsa);
    }
    if let Some(par) = params.opt("pfcwilling") {
        let willing = par.as_u8(rng, 0, 1)? != 0;
        let mbc = params.req("pfcmbc")?.as_u8(rng, 0, 1)? != 0;
        let cap = params.req("pfccap")?.as_u8(rng, 0, 0x0f)?;
        let enable = params.req("pfcenable")?.as_u8_any(rng)?;
        lldp.add_pfc_config(willing, mbc, cap, enable);
    }
    let mut entries = Vec::new();
    let mut cursor = params.opt("apprio");
    while let Some(par) = cursor {
        let prio = par.as_u8(rng, 0, 7)?;
        let sel = params
            .req_after(par, Some("apprio"), "appsel")?
            .as_u8(rng, 0, 7)?;
        let protocol = params
            .req_after(par, Some("apprio"), "approto")?
            .as_u16_any(rng)?;
        entries.push((prio, sel, protocol));
        cursor = params.opt_after(par, None, "apprio");
    }
    if !entries.is_empty() {
        lldp.add_application_priority(&entries);
    }
    if let Some(par) = params.opt("evbbridge") {
        let bridge = par.as_u8_any(rng)?;
        let station = params.req("evbstation")?.as_u8_any(rng)?;
        let retries = params.req("evbretries")?.as_u8(rng, 0, 7)?;
        let rte = params.req("evbrte")?.as_u8(rng, 0, 31)?;
        let mode = params.req("evbmode")?.as_u8(rng, 0, 3)?;
        let rol_rwd = params.req("evbrolrwd")?.as_u8(rng, 0, 1)? != 0;
        let rwd = params.req("evbrwd")?.as_u8(rng, 0, 31)?;
        let rol_rka = params.req("evbrolrka")?.as_u8(rng, 0, 1)? != 0;
        let rka = params.req("evbrka")?.as_u8(rng, 0, 31)?;
        lldp.add_evb(bridge, station, retries, rte, mode, rol_rwd, rwd, rol_rka, rka);
    }
    if let Some(par) = params.opt("cdcprole") {
        let role = par.as_u8(rng, 0, 1)? != 0;
        let s_comp = params.req("cdcpscomp")?.as_u8(rng, 0, 1)? != 0;
        let chn_cap = params.req("cdcpchncap")?.as_u16(rng, 0, 4095)?;
        let mut pairs = Vec::new();
        let mut cursor = params.opt("cdcpscid");
        while let Some(scid_par) = cursor {
            let scid = scid_par.as_u16(rng, 0, 4095)?;
            let svid = params
                .req_after(scid_par, Some("cdcpscid"), "cdcpsvid")?
                .as_u16(rng, 0, 4095)?;
            pairs.push((scid, svid));
            cursor = params.opt_after(scid_par, None, "cdcpscid");
        }
        lldp.add_cdcp(role, s_comp, chn_cap, &pairs);
    }
    let mut entries = Vec::new();
    let mut cursor = params.opt("appvid");
    while let Some(par) = cursor {
        let vid = par.as_u16(rng, 0, 0x03ff)?;
        let sel = params
            .req_after(par, Some("appvid"), "appvsel")?
            .as_u8(rng, 0, 7)?;
        let protocol = params
            .req_after(par, Some("appvid"), "appvproto")?
            .as_u16_any(rng)?;
        entries.push((vid, sel, protocol));
        cursor = params.opt_after(par, None, "appvid");
    }
    if !entries.is_empty() {
        lldp.add_application_vlan(&entries);
    }

    // IEEE 802.3 TLVs
    if let Some(par) = params.opt("mautype") {
        let mau_type = par.as_u16_any(rng)?;
        let supported = params.flag_or(rng, "anegsup", false)?;
        let enabled = params.flag_or(rng, "anegen", false)?;
        let caps = params.req("anegcaps")?.as_u16_any(rng)?;
        lldp.add_mac_phy_status(supported, enabled, caps, mau_type);
    }
    power_via_mdi(rng, params, lldp)?;
    if let Some(par) = params.opt("maxframe") {
        let size = par.as_u16_any(rng)?;
        if size != 0 {
            lldp.add_max_frame_size(size);
        }
    }
    if let Some(par) = params.opt("eeetx") {
        let tx = par.as_u16_any(rng)?;
        let rx = params.req("eeerx")?.as_u16_any(rng)?;
        let fb = params.req("eeefb")?.as_u16_any(rng)?;
        let echo_tx = params.req("eeeechotx")?.as_u16_any(rng)?;
        let echo_rx = params.req("eeeechorx")?.as_u16_any(rng)?;
        lldp.add_eee(tx, rx, fb, echo_tx, echo_rx);
    }
    if let Some(par) = params.opt("fwtx") {
        let tx = par.as_u8(rng, 0, 1)? != 0;
        let rx = params.req("fwrx")?.as_u8(rng, 0, 1)? != 0;
        let echo_tx = params.req("fwechotx")?.as_u8(rng, 0, 1)? != 0;
        let echo_rx = params.req("fwechorx")?.as_u8(rng, 0, 1)? != 0;
        lldp.add_eee_fast_wake(tx, rx, echo_tx, echo_rx);
    }

    // Profinet TLVs
    if let Some(par) = params.opt("pnrxdelayloc") {
        let rx_local = par.as_u32_any(rng)?;
        let rx_remote = params.req("pnrxdelayrem")?.as_u32_any(rng)?;
        let tx_local = params.req("pntxdelayloc")?.as_u32_any(rng)?;
        let tx_remote = params.req("pntxdelayrem")?.as_u32_any(rng)?;
        let cable = params.req("pncabledelay")?.as_u32_any(rng)?;
        lldp.add_pn_delay(rx_local, rx_remote, tx_local, tx_remote, cable);
    }
    if let Some(par) = params.opt("pnrtc3state") {
        let rtc3_state = par.as_u8(rng, 0, 7)?;
        let frag = params.flag_or(rng, "pnrtc3frag", false)?;
        let preamble = params.flag_or(rng, "pnrtc3preamp", false)?;
        let optimized = params.flag_or(rng, "pnrtc3opt", false)?;
        let rtc2_state = params.u16_or(rng, "pnrtc2state", 0, 3, 0)?;
        lldp.add_pn_port_status(rtc2_state, rtc3_state, frag, preamble, optimized);
    }
    if let Some(par) = params.opt("pnalias") {
        lldp.add_pn_alias(par.as_stream(rng, 255)?);
    }
    mrp_port_status(rng, params, lldp)?;
    if let Some(par) = params.opt("pnchassismac") {
        lldp.add_pn_chassis_mac(par.as_mac(rng)?);
    }
    ptcp_status(rng, params, lldp)?;
    if let Some(par) = params.opt("pnmautypeext") {
        lldp.add_pn_mau_type_extension(par.as_u16_any(rng)?);
    }
    if let Some(par) = params.opt("mrpicid") {
        let id = par.as_u16_any(rng)?;
        let role = params.u16_or(rng, "mrpicrole", 0, u16::MAX, 0)?;
        let pos = params.u16_or(rng, "mrpicpos", 0, u16::MAX, 0)?;
        lldp.add_pn_mrp_ic_port_status(id, role, pos);
    }
    if let Some(par) = params.opt("nmedomainuuid") {
        lldp.add_pn_nme_domain_uuid(par.as_uuid(rng)?.octets());
    }
    if let Some(par) = params.opt("nmenameuuid") {
        lldp.add_pn_nme_name_uuid(par.as_uuid(rng)?.octets());
    }
    if let Some(par) = params.opt("nmeparuuid") {
        lldp.add_pn_nme_parameter_uuid(par.as_uuid(rng)?.octets());
    }

    // free-form TLVs
    let mut cursor = params.opt("tlvtype");
    while let Some(par) = cursor {
        let tlv_type = par.as_u8(rng, 0, 127)?;
        let value = params
            .req_after(par, Some("tlvtype"), "tlvvalue")?
            .as_stream(rng, 511)?;
        lldp.add_raw_tlv(tlv_type, value);
        cursor = params.opt_after(par, None, "tlvtype");
    }
    let mut cursor = params.opt("tlvoui");
    while let Some(par) = cursor {
        let oui = par.as_stream(rng, 3)?;
        if oui.len() != 3 {
            return Err(bad_value(par).into());
        }
        let oui = [oui[0], oui[1], oui[2]];
        let subtype = params
            .req_after(par, Some("tlvoui"), "tlvsubtype")?
            .as_u8_any(rng)?;
        let value = params
            .req_after(par, Some("tlvoui"), "tlvdata")?
            .as_stream(rng, 507)?;
        lldp.add_oui_tlv(oui, subtype, value);
        cursor = params.opt_after(par, None, "tlvoui");
    }

    Ok(())
}

fn bad_value(par: &Parameter<'_>) -> ParamError {
    ParamError::BadFormat {
        value: par.value().to_string(),
        span: par.value_span(),
    }
}

/// Chassis ID: explicit subtype, inferred from the value, or the own
/// MAC address as default.
fn chassis_id(
    ctx: &Context,
    params: &ParameterList<'_>,
    lldp: &mut LldpPacket,
) -> Result<(), ParamError> {
    let rng = &ctx.rng;
    if let Some(subtype_par) = params.opt("cidtype") {
        let subtype = subtype_par.as_u8_any(rng)?;
        let id = params.req("cid")?.as_stream(rng, 255)?;
        lldp.add_chassis_id_raw(subtype, id);
    } else if let Some(par) = params.opt("cid") {
        if let Ok(ip) = par.as_ipv4(rng) {
            lldp.add_chassis_id_ipv4(ip);
        } else if let Ok(ip) = par.as_ipv6(rng) {
            lldp.add_chassis_id_ipv6(ip);
        } else if let Ok(mac) = par.as_mac(rng) {
            lldp.add_chassis_id_mac(mac);
        } else {
            // locally assigned bytes as last resort
            lldp.add_chassis_id_raw(7, par.as_stream(rng, 255)?);
        }
    } else {
        lldp.add_chassis_id_mac(ctx.settings.my_mac());
    }
    Ok(())
}

/// Port ID, same resolution order as the chassis ID.
fn port_id(
    ctx: &Context,
    params: &ParameterList<'_>,
    lldp: &mut LldpPacket,
) -> Result<(), ParamError> {
    let rng = &ctx.rng;
    if let Some(subtype_par) = params.opt("pidtype") {
        let subtype = subtype_par.as_u8_any(rng)?;
        let id = params.req("pid")?.as_stream(rng, 255)?;
        lldp.add_port_id_raw(subtype, id);
    } else if let Some(par) = params.opt("pid") {
        if let Ok(ip) = par.as_ipv4(rng) {
            lldp.add_port_id_ipv4(ip);
        } else if let Ok(ip) = par.as_ipv6(rng) {
            lldp.add_port_id_ipv6(ip);
        } else if let Ok(mac) = par.as_mac(rng) {
            lldp.add_port_id_mac(mac);
        } else {
            lldp.add_port_id_raw(7, par.as_stream(rng, 255)?);
        }
    } else {
        lldp.add_port_id_mac(ctx.settings.my_mac());
    }
    Ok(())
}

/// System capabilities TLV, emitted when any capability bit is given;
/// the station bits default to set.
fn system_capabilities(
    rng: &Rng,
    params: &ParameterList<'_>,
    lldp: &mut LldpPacket,
) -> Result<(), ParamError> {
    const BITS: [&str; 8] = [
        "cap-other",
        "cap-repeater",
        "cap-bridge",
        "cap-wlan",
        "cap-router",
        "cap-phone",
        "cap-docsis",
        "cap-station",
    ];
    let any_given = BITS.iter().any(|name| {
        let enabled = format!("{name}-en");
        params.iter().any(|p| p.name() == *name || p.name() == enabled)
    });
    if !any_given {
        return Ok(());
    }

    let mut supported = 0u16;
    let mut enabled = 0u16;
    for (bit, name) in BITS.iter().enumerate() {
        let default = *name == "cap-station";
        if params.flag_or(rng, name, default)? {
            supported |= 1 << bit;
        }
        if params.flag_or(rng, &format!("{name}-en"), default)? {
            enabled |= 1 << bit;
        }
    }
    lldp.add_system_capabilities(supported, enabled);
    Ok(())
}

/// Management address TLV: explicit subtype or inferred from the
/// value; absent without a `mgtaddr`.
fn management_address(
    rng: &Rng,
    params: &ParameterList<'_>,
    lldp: &mut LldpPacket,
) -> Result<(), ParamError> {
    let if_number_subtype = params.u8_or(rng, "ifnumtype", 0, 255, 1)?;
    let if_number = params.u32_or(rng, "ifnum", 0, u32::MAX, 0)?;
    let oid = match params.opt("mgtoid") {
        Some(par) => par.as_stream(rng, 128)?.to_vec(),
        None => Vec::new(),
    };

    if let Some(subtype_par) = params.opt("mgtaddrtype") {
        let subtype = subtype_par.as_u8_any(rng)?;
        let addr = params.req("mgtaddr")?.as_stream(rng, 31)?;
        lldp.add_management_address(subtype, addr, if_number_subtype, if_number, &oid);
    } else if let Some(par) = params.opt("mgtaddr") {
        if let Ok(ip) = par.as_ipv4(rng) {
            lldp.add_management_address(1, &ip.octets(), if_number_subtype, if_number, &oid);
        } else if let Ok(ip) = par.as_ipv6(rng) {
            lldp.add_management_address(2, &ip.octets(), if_number_subtype, if_number, &oid);
        } else {
            let mac = par.as_mac(rng)?;
            lldp.add_management_address(6, &mac.octets(), if_number_subtype, if_number, &oid);
        }
    }
    Ok(())
}

/// Power via MDI: the port class gates the basic TLV; a power type
/// additionally gates the DLL classification extension.
fn power_via_mdi(
    rng: &Rng,
    params: &ParameterList<'_>,
    lldp: &mut LldpPacket,
) -> Result<(), ParamError> {
    let Some(class_par) = params.opt("poeclass") else {
        return Ok(());
    };
    let port_class_pse = class_par.as_u8(rng, 0, 1)? != 0;
    let support = params.req("poesup")?.as_u8(rng, 0, 1)? != 0;
    let state = params.req("poeena")?.as_u8(rng, 0, 1)? != 0;
    let pairs_control = params.req("poepairctrl")?.as_u8(rng, 0, 1)? != 0;
    let power_pair = params.req("poepairs")?.as_u8_any(rng)?;
    let power_class = params.req("poepwrclass")?.as_u8_any(rng)?;

    if let Some(type_par) = params.opt("poetype") {
        let power_type = type_par.as_u8_any(rng)?;
        let power_source = params.req("poesource")?.as_u8_any(rng)?;
        let pd_4pid = params.req("poe4pid")?.as_u8_any(rng)?;
        let power_prio = params.req("poeprio")?.as_u8_any(rng)?;
        let pd_requested = params.req("poepdreq")?.as_f64(0.0, 99.0)?;
        let pse_allocated = params.req("poepsealloc")?.as_f64(0.0, 99.0)?;
        lldp.add_dll_power_via_mdi(
            port_class_pse,
            support,
            state,
            pairs_control,
            power_pair,
            power_class,
            power_type,
            power_source,
            pd_4pid,
            power_prio,
            pd_requested,
            pse_allocated,
        );
    } else {
        lldp.add_basic_power_via_mdi(
            port_class_pse,
            support,
            state,
            pairs_control,
            power_pair,
            power_class,
        );
    }
    Ok(())
}

/// MRP port status: the domain UUID comes either from hashing a domain
/// string with MD5 or from an explicit UUID.
fn mrp_port_status(
    rng: &Rng,
    params: &ParameterList<'_>,
    lldp: &mut LldpPacket,
) -> Result<(), ParamError> {
    let port_state = params.u16_or(rng, "mrpstate", 0, 3, 0)?;
    if let Some(par) = params.opt("mrpdomain") {
        let domain = par.as_stream(rng, usize::MAX)?;
        let digest: [u8; 16] = Md5::digest(domain).into();
        let uuid = Uuid::from_md5(digest);
        lldp.add_pn_mrp_port_status(uuid.octets(), port_state);
    } else if let Some(par) = params.opt("mrpuuid") {
        lldp.add_pn_mrp_port_status(par.as_uuid(rng)?.octets(), port_state);
    }
    Ok(())
}

/// PTCP status, gated on the master source MAC.
fn ptcp_status(
    rng: &Rng,
    params: &ParameterList<'_>,
    lldp: &mut LldpPacket,
) -> Result<(), ParamError> {
    let Some(mac_par) = params.opt("ptcpmac") else {
        return Ok(());
    };
    let mac = mac_par.as_mac(rng)?;
    let domain_uuid = match params.opt("ptcpdomainuuid") {
        Some(par) => par.as_uuid(rng)?,
        None => Uuid::ZERO,
    };
    let ir_data_uuid = match params.opt("ptcpirdatauuid") {
        Some(par) => par.as_uuid(rng)?,
        None => Uuid::ZERO,
    };
    let period = params.u32_or(rng, "ptcpperiod", 0, 0x7fff_ffff, 0)?;
    let red_orange = params.u32_or(rng, "ptcpredorange", 0, 0x7fff_ffff, 0)?;
    let orange = params.u32_or(rng, "ptcporange", 0, 0x7fff_ffff, 0)?;
    let green = params.u32_or(rng, "ptcpgreen", 0, 0x7fff_ffff, 0)?;
    lldp.add_pn_ptcp_status(
        mac,
        domain_uuid.octets(),
        ir_data_uuid.octets(),
        period,
        red_orange,
        orange,
        green,
    );
    Ok(())
}
