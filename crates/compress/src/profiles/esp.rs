//! ESP profile (RFC 3095 §5, profile 0x0003): keyed on the Security
//! Parameters Index. ESP's own sequence-number field is not tracked
//! separately (Non-goal: "ESP sequence tracking") — this profile relies on
//! the generic RFC 3095 SN exactly like IP-only/UDP do.

use std::collections::HashSet;

use crate::{
    context::{Context, ContextKey, GenericContext, ProfileContext},
    profile::{FieldUpdate, Profile, ProfileId},
    profiles::ip_key_parts,
    view::PacketView,
};

pub struct EspProfile;

const PROTO_ESP: u8 = 50;

impl Profile for EspProfile {
    fn id(&self) -> ProfileId {
        ProfileId::Esp
    }

    fn description(&self) -> &'static str {
        "ESP: generic IP chain keyed on the Security Parameters Index"
    }

    fn check_profile(&self, view: &PacketView, _rtp_ports: &HashSet<u16>, key: &mut Option<ContextKey>) -> bool {
        if view.chain.outer.next_protocol != PROTO_ESP {
            return false;
        }

        let payload = view.payload();
        if payload.len() < 4 {
            return false;
        }

        let (src, dst) = ip_key_parts(view);
        *key = Some(ContextKey::from_parts(&[&src, &dst, &payload[0..4]]));
        true
    }

    fn check_context(&self, profile_ctx: &ProfileContext, view: &PacketView) -> bool {
        matches!(profile_ctx, ProfileContext::Esp(g) if g.inner.is_some() == view.chain.inner.is_some())
    }

    fn create(&self, view: &PacketView, window_width: usize, initial_sn: u16) -> ProfileContext {
        let outer_id = view.chain.outer.ip_id_or_flow as u16;
        let inner_id = view.chain.inner.map(|inner| inner.ip_id_or_flow as u16);

        ProfileContext::Esp(GenericContext::new(window_width, initial_sn, outer_id, inner_id))
    }

    fn update_fields(&self, ctx: &mut Context, view: &PacketView) -> FieldUpdate {
        let mut update = FieldUpdate::default();

        if let Some(generic) = ctx.generic_mut() {
            if generic.outer.observe(view.chain.outer.ip_id_or_flow as u16) {
                update.dynamic_changed += 1;
            }
        }

        update
    }
}
