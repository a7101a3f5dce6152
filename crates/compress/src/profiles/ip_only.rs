//! IP-only profile (RFC 3843): no transport-layer awareness at all, the
//! baseline every other profile's generic chain extends.

use std::collections::HashSet;

use crate::{
    context::{Context, ContextKey, GenericContext, ProfileContext},
    profile::{FieldUpdate, Profile, ProfileId},
    profiles::ip_key_parts,
    view::PacketView,
};

pub struct IpOnlyProfile;

impl Profile for IpOnlyProfile {
    fn id(&self) -> ProfileId {
        ProfileId::IpOnly
    }

    fn description(&self) -> &'static str {
        "IP-only: static/dynamic chains over the outer (and optional inner) IP header only"
    }

    fn check_profile(&self, view: &PacketView, _rtp_ports: &HashSet<u16>, key: &mut Option<ContextKey>) -> bool {
        let (src, dst) = ip_key_parts(view);
        *key = Some(ContextKey::from_parts(&[&src, &dst, &[view.chain.outer.next_protocol]]));
        true
    }

    fn check_context(&self, profile_ctx: &ProfileContext, view: &PacketView) -> bool {
        matches!(profile_ctx, ProfileContext::IpOnly(g) if g.inner.is_some() == view.chain.inner.is_some())
    }

    fn create(&self, view: &PacketView, window_width: usize, initial_sn: u16) -> ProfileContext {
        let outer_id = view.chain.outer.ip_id_or_flow as u16;
        let inner_id = view.chain.inner.map(|inner| inner.ip_id_or_flow as u16);

        ProfileContext::IpOnly(GenericContext::new(window_width, initial_sn, outer_id, inner_id))
    }

    fn update_fields(&self, ctx: &mut Context, view: &PacketView) -> FieldUpdate {
        let mut update = FieldUpdate::default();

        if let Some(generic) = ctx.generic_mut() {
            if generic.outer.observe(view.chain.outer.ip_id_or_flow as u16) {
                update.dynamic_changed += 1;
            }

            if let (Some(inner_state), Some(inner_chain)) = (generic.inner.as_mut(), view.chain.inner) {
                if inner_state.observe(inner_chain.ip_id_or_flow as u16) {
                    update.dynamic_changed += 1;
                }
            }
        }

        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::ip;

    const V4_UDP: [u8; 28] = [
        0x45, 0x00, 0x00, 0x1c, 0x00, 0x01, 0x00, 0x00, 0x40, 0x11, 0x00, 0x00, 192, 0, 2, 1, 192,
        0, 2, 2, 0x13, 0x88, 0x13, 0x89, 0x00, 0x08, 0x00, 0x00,
    ];

    #[test]
    fn accepts_any_valid_ip_chain() {
        let chain = ip::parse(&V4_UDP).unwrap();
        let view = PacketView::new(chain, &V4_UDP);
        let mut key = None;

        assert!(IpOnlyProfile.check_profile(&view, &HashSet::new(), &mut key));
        assert!(key.is_some());
    }
}
