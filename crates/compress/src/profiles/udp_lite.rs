//! UDP-Lite profile (RFC 4019, profile 0x0007): identical framework to
//! UDP, distinguished only by the IP protocol number and checksum-coverage
//! dynamic field (RFC 3828).

use std::collections::HashSet;

use crate::{
    context::{Context, ContextKey, GenericContext, ProfileContext},
    profile::{FieldUpdate, Profile, ProfileId},
    profiles::ip_key_parts,
    view::PacketView,
};

pub struct UdpLiteProfile;

const PROTO_UDP_LITE: u8 = 136;

impl Profile for UdpLiteProfile {
    fn id(&self) -> ProfileId {
        ProfileId::UdpLite
    }

    fn description(&self) -> &'static str {
        "UDP-Lite: UDP's generic chain, keyed on IP protocol 136"
    }

    fn check_profile(&self, view: &PacketView, _rtp_ports: &HashSet<u16>, key: &mut Option<ContextKey>) -> bool {
        if view.chain.outer.next_protocol != PROTO_UDP_LITE {
            return false;
        }

        let Some((src_port, dst_port)) = view.ports() else {
            return false;
        };

        let (src, dst) = ip_key_parts(view);
        *key = Some(ContextKey::from_parts(&[
            &src,
            &dst,
            &src_port.to_be_bytes(),
            &dst_port.to_be_bytes(),
        ]));

        true
    }

    fn check_context(&self, profile_ctx: &ProfileContext, view: &PacketView) -> bool {
        matches!(profile_ctx, ProfileContext::UdpLite(g) if g.inner.is_some() == view.chain.inner.is_some())
    }

    fn create(&self, view: &PacketView, window_width: usize, initial_sn: u16) -> ProfileContext {
        let outer_id = view.chain.outer.ip_id_or_flow as u16;
        let inner_id = view.chain.inner.map(|inner| inner.ip_id_or_flow as u16);

        ProfileContext::UdpLite(GenericContext::new(window_width, initial_sn, outer_id, inner_id))
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
