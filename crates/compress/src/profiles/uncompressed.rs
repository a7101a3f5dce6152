//! Uncompressed profile (RFC 3095 §5.10, profile 0x0000): the catch-all
//! floor of the priority order. Carries no RFC 3095 generic block at all —
//! every packet goes out as a Normal packet (§6 wire format), header and
//! payload untouched.

use std::collections::HashSet;

use crate::{
    context::{Context, ContextKey, ProfileContext},
    profile::{FieldUpdate, Profile, ProfileId},
    view::PacketView,
};

pub struct UncompressedProfile;

impl Profile for UncompressedProfile {
    fn id(&self) -> ProfileId {
        ProfileId::Uncompressed
    }

    fn description(&self) -> &'static str {
        "Uncompressed: passes packets through as Normal packets, no header compression"
    }

    /// Always accepts: this is the floor every other profile is tried
    /// before (§4.4 priority order).
    fn check_profile(&self, view: &PacketView, _rtp_ports: &HashSet<u16>, key: &mut Option<ContextKey>) -> bool {
        *key = Some(ContextKey::from_parts(&[view.bytes]));
        true
    }

    fn check_context(&self, profile_ctx: &ProfileContext, _view: &PacketView) -> bool {
        matches!(profile_ctx, ProfileContext::Uncompressed)
    }

    fn create(&self, _view: &PacketView, _window_width: usize, _initial_sn: u16) -> ProfileContext {
        ProfileContext::Uncompressed
    }

    fn update_fields(&self, _ctx: &mut Context, _view: &PacketView) -> FieldUpdate {
        FieldUpdate::default()
    }

    fn candidate_sn(&self, _ctx: &Context, _view: &PacketView) -> u16 {
        0
    }
}
