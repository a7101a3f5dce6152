//! Profile registry & selector (§4.4): a priority-ordered list of
//! per-protocol compression strategies, each exposing the same capability
//! set so the engine never needs to know which profile it is driving.

use std::collections::HashSet;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::view::PacketView;

use crate::context::{Context, ContextKey, ProfileContext};

/// The 16-bit ROHC profile identifier (RFC 3095 §8, RFC 3843/3828).
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProfileId {
    Uncompressed = 0x0000,
    Rtp = 0x0001,
    Udp = 0x0002,
    Esp = 0x0003,
    IpOnly = 0x0004,
    /// Declared but not implemented (§4.4 footnote): `check_profile` always
    /// returns `false`.
    Tcp = 0x0006,
    UdpLite = 0x0007,
}

impl ProfileId {
    pub fn wire_id(self) -> u16 {
        self as u16
    }
}

/// Outcome of feeding one packet's header fields into a profile's
/// dynamic-field tracking: whether a static field changed (forcing
/// re-initialization), and how many dynamic fields changed this packet.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldUpdate {
    pub static_changed: bool,
    pub dynamic_changed: u8,
}

/// The capability set every profile implements (§4.4). Modeled as a trait
/// object rather than an inheritance hierarchy: the engine holds
/// `&dyn Profile` and never downcasts. Profiles are stateless values; the
/// registry carries the only piece of profile-adjacent mutable state
/// (`rtp_ports`) and passes it in explicitly.
pub trait Profile: Send + Sync {
    fn id(&self) -> ProfileId;

    fn description(&self) -> &'static str;

    /// Does this profile claim `chain`? On success, fills `key` with the
    /// flow-matching key it would use.
    fn check_profile(&self, view: &PacketView, rtp_ports: &HashSet<u16>, key: &mut Option<ContextKey>) -> bool;

    /// Does an existing context of this profile still match `chain`
    /// (beyond the key, e.g. IP version hasn't flipped)?
    fn check_context(&self, profile_ctx: &ProfileContext, view: &PacketView) -> bool;

    /// Builds a fresh profile-specific context block from the first packet
    /// on this flow.
    fn create(&self, view: &PacketView, window_width: usize, initial_sn: u16) -> ProfileContext;

    /// Updates IP-ID/RND/NBO/SID tracking (and any profile-specific
    /// dynamic fields) from the current packet, returning what changed.
    fn update_fields(&self, ctx: &mut Context, view: &PacketView) -> FieldUpdate;

    /// The SN this packet should be encoded against. Most profiles
    /// maintain their own monotonic counter (`ctx.generic().next_sn()`);
    /// RTP instead uses the wire RTP sequence number as its SN source
    /// (§4.4 "profile ID, SN source, ...").
    fn candidate_sn(&self, ctx: &Context, _view: &PacketView) -> u16 {
        ctx.generic().map(|g| g.next_sn()).unwrap_or(0)
    }
}

/// Static, priority-ordered profile list (§4.4): RTP before UDP so
/// RTP-over-UDP is recognized first, IP-only after all transport-aware
/// profiles, Uncompressed as the floor that always accepts.
pub struct ProfileRegistry {
    profiles: Vec<(Box<dyn Profile>, bool)>,
    rtp_ports: HashSet<u16>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        use crate::profiles::{
            esp::EspProfile, ip_only::IpOnlyProfile, rtp::RtpProfile, udp::UdpProfile,
            udp_lite::UdpLiteProfile, uncompressed::UncompressedProfile,
        };

        let order: Vec<Box<dyn Profile>> = vec![
            Box::new(RtpProfile),
            Box::new(UdpProfile),
            Box::new(UdpLiteProfile),
            Box::new(EspProfile),
            Box::new(IpOnlyProfile),
            Box::new(UncompressedProfile),
        ];

        Self {
            profiles: order.into_iter().map(|p| (p, true)).collect(),
            rtp_ports: [5004].into_iter().collect(),
        }
    }

    pub fn set_enabled(&mut self, id: ProfileId, enabled: bool) {
        if let Some((_, flag)) = self.profiles.iter_mut().find(|(p, _)| p.id() == id) {
            *flag = enabled;
        }
    }

    pub fn is_enabled(&self, id: ProfileId) -> bool {
        self.profiles.iter().any(|(p, flag)| p.id() == id && *flag)
    }

    pub fn add_rtp_port(&mut self, port: u16) {
        self.rtp_ports.insert(port);
    }

    pub fn remove_rtp_port(&mut self, port: u16) {
        self.rtp_ports.remove(&port);
    }

    pub fn reset_rtp_ports(&mut self) {
        self.rtp_ports.clear();
    }

    pub fn rtp_ports(&self) -> &HashSet<u16> {
        &self.rtp_ports
    }

    /// Iterates enabled profiles in priority order, returning the first
    /// that accepts `chain`, along with the key it computed.
    pub fn select(&self, view: &PacketView) -> Option<(&dyn Profile, ContextKey)> {
        for (profile, enabled) in &self.profiles {
            if !enabled {
                continue;
            }

            let mut key = None;
            if profile.check_profile(view, &self.rtp_ports, &mut key) {
                if let Some(key) = key {
                    return Some((profile.as_ref(), key));
                }
            }
        }

        None
    }

    pub fn get(&self, id: ProfileId) -> Option<&dyn Profile> {
        self.profiles.iter().find(|(p, _)| p.id() == id).map(|(p, _)| p.as_ref())
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_tries_rtp_before_ip_only() {
        let registry = ProfileRegistry::new();
        let ids: Vec<_> = registry.profiles.iter().map(|(p, _)| p.id()).collect();

        let rtp_pos = ids.iter().position(|id| *id == ProfileId::Rtp).unwrap();
        let ip_pos = ids.iter().position(|id| *id == ProfileId::IpOnly).unwrap();
        let uncompressed_pos = ids.iter().position(|id| *id == ProfileId::Uncompressed).unwrap();

        assert!(rtp_pos < ip_pos);
        assert!(ip_pos < uncompressed_pos);
    }

    #[test]
    fn disabling_a_profile_excludes_it_from_selection() {
        let mut registry = ProfileRegistry::new();
        registry.set_enabled(ProfileId::Rtp, false);
        registry.set_enabled(ProfileId::Udp, false);
        assert!(!registry.is_enabled(ProfileId::Rtp));
    }

    #[test]
    fn removing_an_rtp_port_forgets_it() {
        let mut registry = ProfileRegistry::new();
        registry.add_rtp_port(1234);
        assert!(registry.rtp_ports().contains(&1234));

        registry.remove_rtp_port(1234);
        assert!(!registry.rtp_ports().contains(&1234));
    }
}
