//! The process-wide `Engine`: the concrete realization of spec §3's
//! "Compressor" data model, gluing together the context store, profile
//! registry, feedback ring and segmenter behind the control flow described
//! in §2 ("Control flow per compressed packet").
//!
//! This is the engine `rohc-sdk` wraps behind the numbered-return-code
//! public facade (§6); it speaks `Result`/enums, the idiomatic Rust way.

use std::collections::{HashMap, HashSet};

use bytes::BytesMut;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use codec::{crc::Crc, ip};

use crate::{
    context::{ContextStore, ProfileContext, State},
    engine,
    feedback::FeedbackRing,
    packet::{self, CidType},
    profile::ProfileRegistry,
    segment::Rru,
    view::PacketView,
    Error,
};

/// Outcome of a successful `compress`/`get_segment` call (§6 return codes,
/// minus the numeric encoding the sdk facade adds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    NeedSegment,
}

/// Per-packet diagnostics (§6 `get_last_packet_info2`).
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LastPacketInfo {
    pub cid: u16,
    pub packet_type_is_ir: bool,
    pub compressed_len: usize,
    pub uncompressed_len: usize,
}

/// Aggregate counters (§6 `get_general_info`).
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeneralInfo {
    pub contexts_used: usize,
    pub packets_sent: u64,
    pub packets_failed: u64,
}

pub struct Engine {
    cid_type: CidType,
    max_cid: u16,
    mrru: usize,
    window_width: usize,
    ir_refresh: u32,
    fo_refresh: u32,

    profiles: ProfileRegistry,
    contexts: ContextStore,
    feedback: FeedbackRing,
    rru: Rru,

    crc3: Crc,
    crc7: Crc,
    crc8: Crc,

    rng: Box<dyn FnMut() -> u16 + Send>,
    trace: Option<Box<dyn Fn(&str) + Send>>,

    num_packets: u64,
    num_failed: u64,
    last_info: LastPacketInfo,

    /// CIDs of RTP contexts keyed by the RTP port they matched on, so
    /// `remove_rtp_port` can destroy the contexts that port created (S6).
    rtp_cids_by_port: HashMap<u16, HashSet<u16>>,
}

impl Engine {
    pub fn new(cid_type: CidType, max_cid: u16) -> Self {
        Self {
            cid_type,
            max_cid,
            mrru: 0,
            window_width: 4,
            ir_refresh: 1700,
            fo_refresh: 700,
            profiles: ProfileRegistry::new(),
            contexts: ContextStore::new(max_cid),
            feedback: FeedbackRing::new(),
            rru: Rru::default(),
            crc3: Crc::crc3(),
            crc7: Crc::crc7(),
            crc8: Crc::crc8(),
            rng: Box::new(|| rand::random()),
            trace: None,
            num_packets: 0,
            num_failed: 0,
            last_info: LastPacketInfo::default(),
            rtp_cids_by_port: HashMap::new(),
        }
    }

    fn configurable(&self) -> Result<(), Error> {
        if self.num_packets > 0 {
            return Err(Error::InvalidConfig("configuration is immutable once compression has begun"));
        }
        Ok(())
    }

    pub fn set_random_cb(&mut self, cb: impl FnMut() -> u16 + Send + 'static) -> Result<(), Error> {
        self.configurable()?;
        self.rng = Box::new(cb);
        Ok(())
    }

    pub fn set_trace_cb(&mut self, cb: impl Fn(&str) + Send + 'static) {
        self.trace = Some(Box::new(cb));
    }

    pub fn set_wlsb_window_width(&mut self, width: usize) -> Result<(), Error> {
        self.configurable()?;
        if !width.is_power_of_two() {
            return Err(Error::InvalidConfig("window width must be a power of two"));
        }
        self.window_width = width;
        Ok(())
    }

    pub fn set_periodic_refreshes(&mut self, ir: u32, fo: u32) -> Result<(), Error> {
        self.configurable()?;
        if !(ir > fo && fo > 0) {
            return Err(Error::InvalidConfig("periodic refresh requires ir > fo > 0"));
        }
        self.ir_refresh = ir;
        self.fo_refresh = fo;
        Ok(())
    }

    pub fn set_mrru(&mut self, bytes: usize) -> Result<(), Error> {
        self.configurable()?;
        const ROHC_MAX_MRRU: usize = 65535;
        if bytes > ROHC_MAX_MRRU {
            return Err(Error::InvalidConfig("mrru exceeds ROHC_MAX_MRRU"));
        }
        self.mrru = bytes;
        Ok(())
    }

    pub fn enable_profile(&mut self, id: crate::profile::ProfileId, enabled: bool) {
        self.profiles.set_enabled(id, enabled);
    }

    pub fn add_rtp_port(&mut self, port: u16) {
        self.profiles.add_rtp_port(port);
    }

    pub fn remove_rtp_port(&mut self, port: u16) {
        self.profiles.remove_rtp_port(port);

        // any context keyed on that port is destroyed, not just left to
        // time out (S6).
        if let Some(cids) = self.rtp_cids_by_port.remove(&port) {
            for cid in cids {
                self.contexts.destroy(cid);
            }
        }
    }

    pub fn reset_rtp_ports(&mut self) {
        self.profiles.reset_rtp_ports();
        for cids in self.rtp_cids_by_port.values() {
            for &cid in cids {
                self.contexts.destroy(cid);
            }
        }
        self.rtp_cids_by_port.clear();
    }

    pub fn force_contexts_reinit(&mut self) {
        self.contexts.for_each_mut(|ctx| ctx.reinit());
    }

    pub fn get_mrru(&self) -> usize {
        self.mrru
    }

    pub fn get_max_cid(&self) -> u16 {
        self.max_cid
    }

    pub fn get_cid_type(&self) -> CidType {
        self.cid_type
    }

    pub fn get_state_descr(&self, cid: u16) -> Option<&'static str> {
        self.contexts.get(cid).map(|ctx| match ctx.state {
            State::Ir => "IR",
            State::Fo => "FO",
            State::So => "SO",
        })
    }

    pub fn get_last_packet_info(&self) -> LastPacketInfo {
        self.last_info
    }

    pub fn get_general_info(&self) -> GeneralInfo {
        GeneralInfo {
            contexts_used: self.contexts.num_used(),
            packets_sent: self.num_packets,
            packets_failed: self.num_failed,
        }
    }

    pub fn piggyback_feedback(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.feedback.piggyback(bytes)
    }

    pub fn feedback_avail_bytes(&self) -> usize {
        self.feedback.avail_bytes()
    }

    pub fn feedback_remove_locked(&mut self) {
        self.feedback.remove_locked();
    }

    pub fn feedback_unlock(&mut self) {
        self.feedback.unlock();
    }

    /// Handles a decompressor feedback ACK/NACK delivered back to us
    /// (§6 `deliver_feedback`, §7 "Feedback decode"). A reference to a CID
    /// that doesn't exist is dropped with a warning, not an error (S4).
    pub fn deliver_feedback(&mut self, cid: u16, nack: bool) {
        match self.contexts.get_mut(cid) {
            Some(ctx) if nack => {
                log::debug!("NACK for cid {cid}, forcing reinit");
                ctx.reinit();
            }
            Some(_) => {}
            None => log::warn!("feedback for unknown cid {cid}, dropping"),
        }
    }

    fn trace(&self, message: &str) {
        if let Some(cb) = &self.trace {
            cb(message);
        }
    }

    /// §2's control flow: parse → select profile + key → find-or-create
    /// context → drain feedback → encode → append payload → update state.
    pub fn compress(&mut self, now: u64, input: &[u8], out_max: usize) -> Result<(Outcome, BytesMut), Error> {
        let chain = ip::parse(input)?;
        let view = PacketView::new(chain, input);

        let Some((profile, key)) = self.profiles.select(&view) else {
            self.num_failed += 1;
            return Err(Error::NoProfile);
        };

        let mut profile = profile;
        let mut key = key;
        let mut profile_id = profile.id();

        // The chosen profile's header claims more bytes than the packet
        // actually carries (a truncated capture, e.g.): rather than let
        // `header_len_for`'s clamp silently CRC a truncated header, fall
        // back to the Uncompressed profile for this packet.
        if profile_id != crate::profile::ProfileId::Uncompressed
            && !packet::uncompressed_header_fits(profile_id, &view)
        {
            if !self.profiles.is_enabled(crate::profile::ProfileId::Uncompressed) {
                self.num_failed += 1;
                return Err(Error::EncodingFailed);
            }

            let fallback = self
                .profiles
                .get(crate::profile::ProfileId::Uncompressed)
                .expect("just checked enabled");

            let mut fallback_key = None;
            fallback.check_profile(&view, self.profiles.rtp_ports(), &mut fallback_key);

            profile = fallback;
            profile_id = fallback.id();
            key = fallback_key.expect("uncompressed profile always populates a key");
        }

        // A key hit whose context no longer structurally matches (e.g. a
        // tunneling header appeared/disappeared under the same flow key)
        // is treated as if no context existed at all.
        let stale_cid = self
            .contexts
            .find(profile_id, &key)
            .filter(|ctx| !profile.check_context(&ctx.profile_ctx, &view))
            .map(|ctx| ctx.cid);
        if let Some(cid) = stale_cid {
            self.contexts.destroy(cid);
        }

        let cid = match self.contexts.find(profile_id, &key) {
            Some(ctx) => ctx.cid,
            None => {
                let initial_sn = (self.rng)();
                let profile_ctx = profile.create(&view, self.window_width, initial_sn);
                let cid = self.contexts.allocate(profile_id, key, now, profile_ctx)?;

                if profile_id == crate::profile::ProfileId::Rtp {
                    if let Some((src_port, dst_port)) = view.ports() {
                        for port in [src_port, dst_port] {
                            if self.profiles.rtp_ports().contains(&port) {
                                self.rtp_cids_by_port.entry(port).or_default().insert(cid);
                            }
                        }
                    }
                }

                cid
            }
        };

        let mut out = BytesMut::new();
        while self.feedback.get(&mut out) {}

        let ctx = self.contexts.get_mut(cid).expect("just allocated or found");
        ctx.latest_used = now;

        packet::write_cid_prefix(&mut out, self.cid_type, cid);

        // The Uncompressed profile carries no generic block and never
        // leaves the Normal packet format (S5): it skips the packet-type
        // decision and state machine entirely.
        let packet_type_is_ir = if profile_id == crate::profile::ProfileId::Uncompressed {
            packet::build_normal(&mut out, input);
            true
        } else {
            let update = profile.update_fields(ctx, &view);
            let candidate_sn = profile.candidate_sn(ctx, &view);
            ctx.scratch = engine::compute_scratch(ctx, candidate_sn, update);

            let packet_type = engine::decide(ctx);
            self.trace(&format!("cid {cid} state {:?} type {:?}", ctx.state, packet_type));

            match packet_type {
                engine::PacketType::Ir { with_dynamic } => {
                    packet::build_ir(&mut out, profile_id, &self.crc8, &view, candidate_sn, with_dynamic);
                }
                engine::PacketType::IrDyn => {
                    packet::build_ir_dyn(&mut out, profile_id, &self.crc8, &view);
                }
                engine::PacketType::Uo0 => {
                    packet::build_uo0(&mut out, &self.crc3, profile_id, &view, candidate_sn);
                }
                engine::PacketType::Uo1 => {
                    let ip_id = match &ctx.profile_ctx {
                        ProfileContext::Rtp(rtp) => rtp.scaled_ts() as u8,
                        _ => ctx.generic().map(|g| g.outer.ip_id).unwrap_or(0) as u8,
                    };
                    packet::build_uo1(&mut out, &self.crc3, profile_id, &view, candidate_sn, ip_id);
                }
                engine::PacketType::Uor2 { extension } => {
                    let ext = build_extension(extension, ctx, candidate_sn);
                    packet::build_uor2(&mut out, &self.crc7, profile_id, &view, candidate_sn, ext);
                }
            }

            out.extend_from_slice(view.payload());

            if let Some(generic) = ctx.generic_mut() {
                generic.commit_sn(candidate_sn);
            }
            ctx.step_state_machine(engine::IR_REPETITIONS);

            matches!(packet_type, engine::PacketType::Ir { .. })
        };

        self.last_info = LastPacketInfo {
            cid,
            packet_type_is_ir,
            compressed_len: out.len(),
            uncompressed_len: input.len(),
        };
        self.num_packets += 1;

        if out.len() > out_max {
            if self.mrru == 0 {
                self.feedback.unlock();
                return Err(Error::OutputTooSmall { needed: out.len() });
            }

            self.rru.stage(&out, self.mrru)?;
            self.feedback.unlock();
            Ok((Outcome::NeedSegment, BytesMut::new()))
        } else {
            self.feedback.remove_locked();
            Ok((Outcome::Ok, out))
        }
    }

    /// Drains the staged RRU across successive calls (§4.9).
    pub fn get_segment(&mut self, max: usize) -> Result<(Outcome, BytesMut), Error> {
        if !self.rru.is_present() {
            return Err(Error::InvalidConfig("no segment pending"));
        }

        let mut out = BytesMut::new();
        while self.feedback.get(&mut out) {}

        self.rru.get_segment(&mut out, max.saturating_sub(out.len()));
        self.feedback.remove_locked();

        let outcome = if self.rru.is_present() { Outcome::NeedSegment } else { Outcome::Ok };
        Ok((outcome, out))
    }
}

/// Builds the wire-level `Extension` the engine's extension-kind decision
/// asks for, pulling the real SN/IP-ID (or, for RTP, scaled-timestamp)
/// bits out of the context rather than sending an empty placeholder.
fn build_extension(
    kind: engine::ExtensionKind,
    ctx: &crate::context::Context,
    sn: u16,
) -> Option<packet::Extension> {
    use engine::ExtensionKind as Kind;

    if kind == Kind::None {
        return None;
    }

    let sn_bits = ((sn >> 5) & 0x07) as u8;
    let (outer_id, inner_id): (u32, u32) = match &ctx.profile_ctx {
        ProfileContext::Rtp(rtp) => (rtp.scaled_ts(), 0),
        _ => (
            ctx.generic().map(|g| g.outer.ip_id as u32).unwrap_or(0),
            ctx.generic()
                .and_then(|g| g.inner.as_ref())
                .map(|inner| inner.ip_id as u32)
                .unwrap_or(0),
        ),
    };

    Some(match kind {
        Kind::None => unreachable!("handled above"),
        Kind::Zero => packet::Extension::Zero {
            sn_bits,
            outer_ip_id_bits: (outer_id & 0x1f) as u8,
        },
        Kind::One => packet::Extension::One {
            sn_bits,
            outer_ip_id: outer_id as u8,
        },
        Kind::Two => packet::Extension::Two {
            sn_bits,
            outer_ip_id: outer_id as u8,
            inner_ip_id: inner_id as u8,
        },
        Kind::Three => packet::Extension::Three {
            sn_high_bits: (sn >> 5) as u8,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const V4_ICMP: [u8; 84] = {
        let mut p = [0u8; 84];
        p[0] = 0x45;
        p[2] = 0x00;
        p[3] = 84;
        p[8] = 64;
        p[9] = 1; // ICMP
        p[12] = 192;
        p[13] = 0;
        p[14] = 2;
        p[15] = 1;
        p[16] = 192;
        p[17] = 0;
        p[18] = 2;
        p[19] = 2;
        p
    };

    #[test]
    fn first_packet_on_a_flow_is_always_ir() {
        let mut engine = Engine::new(CidType::Small, 15);
        engine.enable_profile(crate::profile::ProfileId::Rtp, false);
        engine.enable_profile(crate::profile::ProfileId::Udp, false);
        engine.enable_profile(crate::profile::ProfileId::UdpLite, false);
        engine.enable_profile(crate::profile::ProfileId::Esp, false);

        let (outcome, out) = engine.compress(1, &V4_ICMP, 1500).unwrap();
        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(out[0] & 0b1111_1110, 0b1111_1100);
    }

    #[test]
    fn repeated_packets_stay_on_the_same_context() {
        let mut engine = Engine::new(CidType::Small, 15);
        for i in 0..3u16 {
            let mut packet = V4_ICMP;
            packet[4] = (i + 1) as u8;
            engine.compress(i as u64, &packet, 1500).unwrap();
        }
        assert_eq!(engine.get_general_info().contexts_used, 1);
    }

    #[test]
    fn oversized_output_without_mrru_is_an_error() {
        let mut engine = Engine::new(CidType::Small, 15);
        let result = engine.compress(1, &V4_ICMP, 1);
        assert!(matches!(result, Err(Error::OutputTooSmall { .. })));
    }
}
