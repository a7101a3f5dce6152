//! Packet-type decision (§4.6): turns a context's scratch predicates into
//! one of the RFC 3095 packet families.

use crate::context::{Context, GenericContext, ProfileContext, Scratch, State};
use crate::profile::FieldUpdate;

/// Which UOR-2 extension (if any) a packet carries (§4.6/§5.7.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    None,
    Zero,
    One,
    Two,
    Three,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Ir { with_dynamic: bool },
    IrDyn,
    Uo0,
    Uo1,
    Uor2 { extension: ExtensionKind },
}

/// Computes this packet's scratch predicates (§4.6) from the candidate SN
/// and the context's W-LSB windows, given what `update_fields` observed.
pub fn compute_scratch(ctx: &Context, candidate_sn: u16, update: FieldUpdate) -> Scratch {
    let Some(generic) = ctx.generic() else {
        return Scratch {
            send_static: update.static_changed,
            send_dynamic: update.dynamic_changed,
            ..Scratch::default()
        };
    };

    let sn_k = sn_k_needed(generic, candidate_sn);

    // RTP folds its scaled timestamp into the same W-LSB slot UO-1/UOR-2
    // use for outer IP-ID: once `ts_stride` has stabilized, the existing
    // packet-type decision tree converges to a minimal encoding on its own
    // without needing a TS-specific packet family.
    let (outer_ip_id_k, inner_ip_id_k) = if let ProfileContext::Rtp(rtp) = &ctx.profile_ctx {
        let width = rtp.ts_window.width();
        let p = (width / 2).saturating_sub(1) as i64;
        (rtp.ts_window.k_needed(rtp.scaled_ts(), p), None)
    } else {
        let outer_k = generic.outer.ip_id_window.k_needed(generic.outer.ip_id as u32, 0);
        let inner_k = generic
            .inner
            .as_ref()
            .map(|inner| inner.ip_id_window.k_needed(inner.ip_id as u32, 0));
        (outer_k, inner_k)
    };

    Scratch {
        sn_4bits_possible: sn_k <= 4,
        sn_5bits_possible: sn_k <= 5,
        sn_13bits_possible: sn_k <= 13,
        no_outer_ip_id_bits_required: outer_ip_id_k == 0,
        is_outer_ip_id_6bits_possible: outer_ip_id_k <= 6,
        no_inner_ip_id_bits_required: inner_ip_id_k.map(|k| k == 0).unwrap_or(true),
        send_static: update.static_changed,
        send_dynamic: update.dynamic_changed,
        sn_k,
        outer_ip_id_k,
        inner_ip_id_k,
    }
}

/// Picks which UOR-2 extension (if any) carries the bits the base 5-bit SN
/// field can't: extra SN bits beyond 5, plus whatever outer/inner IP-ID (or,
/// for RTP, scaled-timestamp) bits haven't converged yet (§4.6).
fn choose_extension(scratch: &Scratch, dual_ip: bool) -> ExtensionKind {
    let extra_sn_bits = scratch.sn_k.saturating_sub(5);
    let outer_k = scratch.outer_ip_id_k;
    let inner_k = scratch.inner_ip_id_k.unwrap_or(0);

    if extra_sn_bits == 0 && outer_k == 0 && (!dual_ip || inner_k == 0) {
        ExtensionKind::None
    } else if extra_sn_bits > 3 {
        ExtensionKind::Three
    } else if dual_ip && inner_k > 0 {
        ExtensionKind::Two
    } else if outer_k > 5 {
        ExtensionKind::One
    } else {
        ExtensionKind::Zero
    }
}

fn sn_k_needed(generic: &GenericContext, candidate_sn: u16) -> u32 {
    generic.sn_window.k_needed(candidate_sn as u32, -1)
}

/// Per §4.5/§4.6: given the context's current state and this packet's
/// scratch, picks the packet type and reports the repetition-number
/// argument `step_state_machine` should use afterwards.
pub fn decide(ctx: &Context) -> PacketType {
    let scratch = &ctx.scratch;
    let dual_ip = ctx.generic().map(|g| g.inner.is_some()).unwrap_or(false);

    match ctx.state {
        State::Ir => PacketType::Ir {
            with_dynamic: true,
        },
        State::Fo => {
            let sid_unconverged = ctx
                .generic()
                .map(|g| {
                    let outer_unconverged = !g.outer.sid.converged(IR_REPETITIONS);
                    let inner_unconverged = g
                        .inner
                        .as_ref()
                        .map(|inner| !inner.sid.converged(IR_REPETITIONS))
                        .unwrap_or(false);
                    outer_unconverged || inner_unconverged
                })
                .unwrap_or(false);

            let dynamic_limit = if dual_ip { 4 } else { 2 };

            if sid_unconverged {
                PacketType::IrDyn
            } else if scratch.send_static && scratch.sn_13bits_possible {
                PacketType::Uor2 { extension: choose_extension(scratch, dual_ip) }
            } else if scratch.send_dynamic > dynamic_limit {
                PacketType::IrDyn
            } else if scratch.sn_13bits_possible {
                PacketType::Uor2 { extension: choose_extension(scratch, dual_ip) }
            } else {
                PacketType::IrDyn
            }
        }
        State::So => {
            let ip_id_ok = if dual_ip {
                scratch.no_outer_ip_id_bits_required && scratch.no_inner_ip_id_bits_required
            } else {
                scratch.no_outer_ip_id_bits_required
            };

            if scratch.sn_4bits_possible && ip_id_ok {
                PacketType::Uo0
            } else if scratch.sn_5bits_possible
                && scratch.is_outer_ip_id_6bits_possible
                && (!dual_ip || scratch.no_inner_ip_id_bits_required)
            {
                PacketType::Uo1
            } else if scratch.sn_13bits_possible {
                PacketType::Uor2 { extension: choose_extension(scratch, dual_ip) }
            } else {
                PacketType::IrDyn
            }
        }
    }
}

/// Optimistic-approach repetition number (§4.5): how many consecutive
/// packets an IP header's RND/NBO/SID flags must hold before a state
/// transition out of IR/FO is allowed.
pub const IR_REPETITIONS: u8 = 3;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, ContextKey, GenericContext, ProfileContext};
    use crate::profile::ProfileId;

    fn fresh_ctx() -> Context {
        let generic = GenericContext::new(4, 0, 1, None);
        Context::new(0, ProfileId::IpOnly, ContextKey::from_parts(&[&[1]]), 0, ProfileContext::IpOnly(generic))
    }

    #[test]
    fn ir_state_always_emits_ir() {
        let ctx = fresh_ctx();
        assert_eq!(decide(&ctx), PacketType::Ir { with_dynamic: true });
    }

    #[test]
    fn so_state_with_tiny_deltas_emits_uo0() {
        let mut ctx = fresh_ctx();
        ctx.state = State::So;
        ctx.scratch.sn_4bits_possible = true;
        ctx.scratch.no_outer_ip_id_bits_required = true;
        assert_eq!(decide(&ctx), PacketType::Uo0);
    }

    #[test]
    fn so_state_falls_back_to_ir_dyn_when_nothing_fits() {
        let mut ctx = fresh_ctx();
        ctx.state = State::So;
        assert_eq!(decide(&ctx), PacketType::IrDyn);
    }

    #[test]
    fn so_state_picks_uor2_with_no_extension_when_everything_converged() {
        let mut ctx = fresh_ctx();
        ctx.state = State::So;
        ctx.scratch.sn_13bits_possible = true;
        ctx.scratch.no_outer_ip_id_bits_required = true;
        assert_eq!(decide(&ctx), PacketType::Uor2 { extension: ExtensionKind::None });
    }

    #[test]
    fn so_state_picks_uor2_extension_zero_for_small_outer_ip_id_delta() {
        let mut ctx = fresh_ctx();
        ctx.state = State::So;
        ctx.scratch.sn_13bits_possible = true;
        ctx.scratch.outer_ip_id_k = 4;
        assert_eq!(decide(&ctx), PacketType::Uor2 { extension: ExtensionKind::Zero });
    }

    #[test]
    fn so_state_picks_uor2_extension_one_for_large_outer_ip_id_delta() {
        let mut ctx = fresh_ctx();
        ctx.state = State::So;
        ctx.scratch.sn_13bits_possible = true;
        ctx.scratch.outer_ip_id_k = 8;
        assert_eq!(decide(&ctx), PacketType::Uor2 { extension: ExtensionKind::One });
    }

    #[test]
    fn so_state_picks_uor2_extension_three_for_wide_sn_jump() {
        let mut ctx = fresh_ctx();
        ctx.state = State::So;
        ctx.scratch.sn_13bits_possible = true;
        ctx.scratch.sn_k = 10;
        assert_eq!(decide(&ctx), PacketType::Uor2 { extension: ExtensionKind::Three });
    }
}
