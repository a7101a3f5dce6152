//! UDP profile (RFC 3095 §5 profile 0x0002): IP-only's generic chain plus
//! the UDP source/destination port pair in the static chain.

use std::collections::HashSet;

use crate::{
    context::{Context, ContextKey, GenericContext, ProfileContext},
    profile::{FieldUpdate, Profile, ProfileId},
    profiles::ip_key_parts,
    view::PacketView,
};

pub struct UdpProfile;

const PROTO_UDP: u8 = 17;

impl Profile for UdpProfile {
    fn id(&self) -> ProfileId {
        ProfileId::Udp
    }

    fn description(&self) -> &'static str {
        "UDP: generic IP chain plus the UDP port pair"
    }

    fn check_profile(&self, view: &PacketView, _rtp_ports: &HashSet<u16>, key: &mut Option<ContextKey>) -> bool {
        if view.chain.outer.next_protocol != PROTO_UDP {
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
        matches!(profile_ctx, ProfileContext::Udp(g) if g.inner.is_some() == view.chain.inner.is_some())
    }

    fn create(&self, view: &PacketView, window_width: usize, initial_sn: u16) -> ProfileContext {
        let outer_id = view.chain.outer.ip_id_or_flow as u16;
        let inner_id = view.chain.inner.map(|inner| inner.ip_id_or_flow as u16);

        ProfileContext::Udp(GenericContext::new(window_width, initial_sn, outer_id, inner_id))
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
