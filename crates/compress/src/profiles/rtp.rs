//! RTP profile (RFC 3095 §5.7, profile 0x0001): the generic IP/UDP chain
//! plus RTP's own sequence number as SN source, a scaled timestamp window
//! for UO-1-TS/UOR-2-TS, and SSRC/marker/payload-type tracking.
//!
//! Timer-based TS compression (RFC 3095 §4.5.4, used when RTP timestamps
//! advance between packets the compressor never sees) is a declared
//! Non-goal; this profile only scales the timestamp relative to SN.

use std::collections::HashSet;

use codec::wlsb::Window;

use crate::{
    context::{Context, ContextKey, GenericContext, ProfileContext},
    profile::{FieldUpdate, Profile, ProfileId},
    profiles::ip_key_parts,
    view::PacketView,
};

/// RTP-specific state layered on top of the generic RFC 3095 block.
#[derive(Debug, Clone)]
pub struct RtpContext {
    pub generic: GenericContext,
    pub ssrc: u32,
    pub payload_type: u8,
    pub marker: bool,
    pub timestamp: u32,
    pub ts_window: Window,
    /// TS per SN step observed on the first few packets, used to scale
    /// subsequent timestamps (RFC 3095 §4.5.4's non-timer path).
    pub ts_stride: u32,
}

impl RtpContext {
    /// The timestamp expressed in SN-stride units rather than raw RTP
    /// clock ticks, so its W-LSB window tracks a slowly-changing quantity
    /// instead of one that jumps by `ts_stride` on every packet.
    pub fn scaled_ts(&self) -> u32 {
        if self.ts_stride > 0 {
            self.timestamp / self.ts_stride
        } else {
            self.timestamp
        }
    }
}

pub struct RtpProfile;

const PROTO_UDP: u8 = 17;

impl Profile for RtpProfile {
    fn id(&self) -> ProfileId {
        ProfileId::Rtp
    }

    fn description(&self) -> &'static str {
        "RTP-over-UDP: generic chain plus SSRC/timestamp, SN taken from the RTP header"
    }

    fn check_profile(&self, view: &PacketView, rtp_ports: &HashSet<u16>, key: &mut Option<ContextKey>) -> bool {
        if view.chain.outer.next_protocol != PROTO_UDP {
            return false;
        }

        let Some((src_port, dst_port)) = view.ports() else {
            return false;
        };

        if !rtp_ports.contains(&src_port) && !rtp_ports.contains(&dst_port) {
            return false;
        }

        let Some(rtp) = view.rtp() else {
            return false;
        };

        let (src, dst) = ip_key_parts(view);
        *key = Some(ContextKey::from_parts(&[
            &src,
            &dst,
            &src_port.to_be_bytes(),
            &dst_port.to_be_bytes(),
            &rtp.ssrc.to_be_bytes(),
        ]));

        true
    }

    fn check_context(&self, profile_ctx: &ProfileContext, view: &PacketView) -> bool {
        match (profile_ctx, view.rtp()) {
            (ProfileContext::Rtp(rtp_ctx), Some(rtp)) => rtp_ctx.ssrc == rtp.ssrc,
            _ => false,
        }
    }

    fn create(&self, view: &PacketView, window_width: usize, initial_sn: u16) -> ProfileContext {
        let outer_id = view.chain.outer.ip_id_or_flow as u16;
        let inner_id = view.chain.inner.map(|inner| inner.ip_id_or_flow as u16);
        let rtp = view.rtp().expect("check_profile guarantees a parseable RTP header");

        ProfileContext::Rtp(RtpContext {
            generic: GenericContext::new(window_width, initial_sn, outer_id, inner_id),
            ssrc: rtp.ssrc,
            payload_type: rtp.payload_type,
            marker: rtp.marker,
            timestamp: rtp.timestamp,
            ts_window: Window::new(window_width, 32),
            ts_stride: 0,
        })
    }

    fn update_fields(&self, ctx: &mut Context, view: &PacketView) -> FieldUpdate {
        let mut update = FieldUpdate::default();
        let Some(rtp) = view.rtp() else {
            return update;
        };

        if let Some(generic) = ctx.generic_mut() {
            if generic.outer.observe(view.chain.outer.ip_id_or_flow as u16) {
                update.dynamic_changed += 1;
            }
        }

        if let ProfileContext::Rtp(rtp_ctx) = &mut ctx.profile_ctx {
            if rtp_ctx.payload_type != rtp.payload_type {
                // payload type is part of the RTP static chain; a change
                // forces a full context refresh.
                update.static_changed = true;
            }

            let sn_delta = rtp.sequence_number.wrapping_sub(rtp_ctx.generic.sn).max(1);
            let ts_delta = rtp.timestamp.wrapping_sub(rtp_ctx.timestamp);
            if rtp_ctx.ts_stride == 0 && sn_delta > 0 {
                rtp_ctx.ts_stride = ts_delta / sn_delta as u32;
            }

            if rtp.timestamp != rtp_ctx.timestamp {
                update.dynamic_changed += 1;
            }
            if rtp.marker != rtp_ctx.marker {
                update.dynamic_changed += 1;
            }

            rtp_ctx.timestamp = rtp.timestamp;
            rtp_ctx.marker = rtp.marker;
            rtp_ctx.payload_type = rtp.payload_type;
            rtp_ctx.ts_window.add(rtp_ctx.scaled_ts());
        }

        update
    }

    fn candidate_sn(&self, ctx: &Context, view: &PacketView) -> u16 {
        view.rtp().map(|rtp| rtp.sequence_number).unwrap_or_else(|| {
            ctx.generic().map(|g| g.next_sn()).unwrap_or(0)
        })
    }
}
