//! Per-flow compression context (RFC 3095 §5.3) and the fixed-capacity
//! store that owns them.

use codec::wlsb::Window;

use crate::profile::ProfileId;

/// RFC 3095 §5.3.1 state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Initialization & Refresh: full static + dynamic chain sent.
    Ir,
    /// First Order: partial updates, dynamic chain on change.
    Fo,
    /// Second Order: minimal updates (UO-0/UO-1/UOR-2).
    So,
}

/// Compressor-side operating mode. Only U-mode compression is implemented;
/// O/R-mode require decompressor-driven feedback semantics (mode transition
/// requests, ACK-gated state advance) that a compressor-only core has no
/// peer to negotiate with, so they stay declared but unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    U,
    O,
    R,
}

/// Opaque per-flow matching key, computed by the owning profile from
/// header fields (source/destination address, plus transport-specific
/// discriminators such as ports or SSRC).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey(Vec<u8>);

impl ContextKey {
    pub fn from_parts(parts: &[&[u8]]) -> Self {
        let mut bytes = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
        for part in parts {
            bytes.extend_from_slice(part);
        }

        Self(bytes)
    }
}

/// A repetition counter tracking "how many consecutive packets has this
/// boolean property held": bumped on a repeat observation, reset on a
/// flip. Used for RND/NBO/SID convergence (§4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct RepetitionCounter {
    value: bool,
    count: u8,
}

impl RepetitionCounter {
    pub fn observe(&mut self, value: bool) {
        if value == self.value {
            self.count = self.count.saturating_add(1);
        } else {
            self.value = value;
            self.count = 0;
        }
    }

    pub fn value(&self) -> bool {
        self.value
    }

    /// True once the property has held for at least `required` consecutive
    /// observations (the "optimistic approach" repetition number of §4.5).
    pub fn converged(&self, required: u8) -> bool {
        self.count >= required
    }
}

/// Per-IP-header flags and W-LSB state shared by every profile built on
/// top of an IPv4 header (RFC 3095 §5.7.7).
#[derive(Debug, Clone)]
pub struct IpFieldState {
    pub ip_id: u16,
    pub ip_id_window: Window,
    /// Random IP-ID (no discernible pattern): RFC 3095 disables delta
    /// coding and sends the ID verbatim while this holds.
    pub rnd: RepetitionCounter,
    /// Network byte order IP-ID.
    pub nbo: RepetitionCounter,
    /// Static IDentification: IP-ID stays constant across packets.
    pub sid: RepetitionCounter,
}

impl IpFieldState {
    /// Observes a freshly-arrived IP-ID, updating RND/NBO/SID repetition
    /// counters and the W-LSB window. Returns whether the ID actually
    /// changed, i.e. whether this is a dynamic-field change for §4.6.
    pub fn observe(&mut self, new_id: u16) -> bool {
        let delta = new_id.wrapping_sub(self.ip_id);
        let sequential = delta == 1;
        let changed = new_id != self.ip_id;

        self.rnd.observe(!sequential);
        self.nbo.observe(true);
        self.sid.observe(!changed);

        self.ip_id = new_id;
        self.ip_id_window.add(new_id as u32);

        changed
    }

    pub fn new(window_width: usize, initial_ip_id: u16) -> Self {
        Self {
            ip_id: initial_ip_id,
            ip_id_window: Window::new(window_width, 16),
            rnd: RepetitionCounter::default(),
            nbo: RepetitionCounter::default(),
            sid: RepetitionCounter::default(),
        }
    }
}

/// The profile-agnostic RFC 3095 block embedded in every IP-based profile's
/// context (§3 "generic RFC 3095 context").
#[derive(Debug, Clone)]
pub struct GenericContext {
    pub sn: u16,
    pub sn_window: Window,
    pub outer: IpFieldState,
    pub inner: Option<IpFieldState>,
}

impl GenericContext {
    pub fn new(window_width: usize, initial_sn: u16, outer_ip_id: u16, inner_ip_id: Option<u16>) -> Self {
        Self {
            sn: initial_sn,
            sn_window: Window::new(window_width, 16),
            outer: IpFieldState::new(window_width, outer_ip_id),
            inner: inner_ip_id.map(|id| IpFieldState::new(window_width, id)),
        }
    }

    /// Advances SN by one, modulo 2^16 (invariant I5).
    pub fn next_sn(&self) -> u16 {
        self.sn.wrapping_add(1)
    }

    pub fn commit_sn(&mut self, sn: u16) {
        self.sn = sn;
        self.sn_window.add(sn as u32);
    }
}

/// Scratch computed fresh for each packet (§4.6); never persisted across
/// calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scratch {
    pub sn_4bits_possible: bool,
    pub sn_5bits_possible: bool,
    pub sn_13bits_possible: bool,
    pub no_outer_ip_id_bits_required: bool,
    pub is_outer_ip_id_6bits_possible: bool,
    pub no_inner_ip_id_bits_required: bool,
    pub send_static: bool,
    pub send_dynamic: u8,
    /// Raw W-LSB `k` values behind the booleans above, needed to pick a
    /// UOR-2 extension (§4.6) rather than just whether a fixed-width field
    /// suffices.
    pub sn_k: u32,
    pub outer_ip_id_k: u32,
    pub inner_ip_id_k: Option<u32>,
}

/// The profile-specific block a context carries, modeled as a sum type
/// rather than a trait object per the "capability set" design note.
#[derive(Debug, Clone)]
pub enum ProfileContext {
    IpOnly(GenericContext),
    Udp(GenericContext),
    UdpLite(GenericContext),
    Esp(GenericContext),
    Rtp(crate::profiles::rtp::RtpContext),
    Uncompressed,
}

/// One active flow.
#[derive(Debug, Clone)]
pub struct Context {
    pub cid: u16,
    pub profile_id: ProfileId,
    pub key: ContextKey,
    pub state: State,
    pub mode: Mode,
    pub used: bool,
    pub first_used: u64,
    pub latest_used: u64,
    pub packets_in_state: u32,
    pub packets_since_ir: u32,
    pub packets_since_fo_refresh: u32,
    pub total_packets: u64,
    pub scratch: Scratch,
    pub profile_ctx: ProfileContext,
}

impl Context {
    pub fn new(
        cid: u16,
        profile_id: ProfileId,
        key: ContextKey,
        now: u64,
        profile_ctx: ProfileContext,
    ) -> Self {
        Self {
            cid,
            profile_id,
            key,
            state: State::Ir,
            mode: Mode::U,
            used: true,
            first_used: now,
            latest_used: now,
            packets_in_state: 0,
            packets_since_ir: 0,
            packets_since_fo_refresh: 0,
            total_packets: 0,
            scratch: Scratch::default(),
            profile_ctx,
        }
    }

    pub fn generic(&self) -> Option<&GenericContext> {
        match &self.profile_ctx {
            ProfileContext::IpOnly(g)
            | ProfileContext::Udp(g)
            | ProfileContext::UdpLite(g)
            | ProfileContext::Esp(g) => Some(g),
            ProfileContext::Rtp(r) => Some(&r.generic),
            ProfileContext::Uncompressed => None,
        }
    }

    pub fn generic_mut(&mut self) -> Option<&mut GenericContext> {
        match &mut self.profile_ctx {
            ProfileContext::IpOnly(g)
            | ProfileContext::Udp(g)
            | ProfileContext::UdpLite(g)
            | ProfileContext::Esp(g) => Some(g),
            ProfileContext::Rtp(r) => Some(&mut r.generic),
            ProfileContext::Uncompressed => None,
        }
    }

    /// Forces a transition back to IR, as done by `force_contexts_reinit`,
    /// link re-establishment, or NACK feedback (§4.5).
    pub fn reinit(&mut self) {
        self.state = State::Ir;
        self.packets_in_state = 0;
        self.packets_since_ir = 0;
    }

    fn advance_state(&mut self, to: State) {
        self.state = to;
        self.packets_in_state = 0;
    }

    /// Applies the §4.5 transition rules given this packet's scratch and
    /// the repetition counters of the active IP headers. Called *after*
    /// packet-type selection, i.e. it governs the *next* packet.
    pub fn step_state_machine(&mut self, ir_repetitions: u8) {
        const MAX_IR_COUNT: u32 = 3;
        const MAX_FO_COUNT: u32 = 3;
        const CHANGE_TO_IR_COUNT: u32 = 1700;
        const CHANGE_TO_FO_COUNT: u32 = 700;

        self.packets_in_state += 1;
        self.packets_since_ir += 1;
        self.total_packets += 1;

        let ip_headers_converged = match self.generic() {
            Some(generic) => {
                let outer_ok = generic.outer.rnd.converged(ir_repetitions)
                    && generic.outer.nbo.converged(ir_repetitions)
                    && generic.outer.sid.converged(ir_repetitions);
                let inner_ok = generic
                    .inner
                    .as_ref()
                    .map(|inner| {
                        inner.rnd.converged(ir_repetitions)
                            && inner.nbo.converged(ir_repetitions)
                            && inner.sid.converged(ir_repetitions)
                    })
                    .unwrap_or(true);
                outer_ok && inner_ok
            }
            None => true,
        };

        match self.state {
            State::Ir => {
                if self.packets_in_state >= MAX_IR_COUNT && !self.scratch.send_static && ip_headers_converged {
                    self.advance_state(State::Fo);
                }
            }
            State::Fo => {
                if self.packets_since_ir >= CHANGE_TO_IR_COUNT {
                    self.reinit();
                } else if self.packets_in_state >= MAX_FO_COUNT
                    && !self.scratch.send_static
                    && self.scratch.send_dynamic == 0
                    && ip_headers_converged
                {
                    self.advance_state(State::So);
                    self.packets_since_fo_refresh = 0;
                }
            }
            State::So => {
                self.packets_since_fo_refresh += 1;

                if self.packets_since_ir >= CHANGE_TO_IR_COUNT {
                    self.reinit();
                } else if self.packets_since_fo_refresh >= CHANGE_TO_FO_COUNT {
                    self.advance_state(State::Fo);
                }
            }
        }
    }
}

/// Fixed-capacity CID-indexed store with lowest-free-slot allocation and
/// LRU eviction (§4.3, Design Notes "Context array with recycling").
pub struct ContextStore {
    slots: Vec<Option<Context>>,
    used: usize,
}

impl ContextStore {
    pub fn new(max_cid: u16) -> Self {
        Self {
            slots: (0..=max_cid).map(|_| None).collect(),
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn num_used(&self) -> usize {
        self.used
    }

    /// Finds a context matching `profile_id`/`key`, scanning at most until
    /// `num_used` matches have been visited (§4.3).
    pub fn find(&mut self, profile_id: ProfileId, key: &ContextKey) -> Option<&mut Context> {
        let mut visited = 0;

        for slot in self.slots.iter_mut() {
            if let Some(ctx) = slot {
                visited += 1;
                if ctx.profile_id == profile_id && &ctx.key == key {
                    return Some(ctx);
                }

                if visited >= self.used {
                    break;
                }
            }
        }

        None
    }

    pub fn get_mut(&mut self, cid: u16) -> Option<&mut Context> {
        self.slots.get_mut(cid as usize)?.as_mut()
    }

    pub fn get(&self, cid: u16) -> Option<&Context> {
        self.slots.get(cid as usize)?.as_ref()
    }

    /// Allocates a slot for a new context: the lowest free CID, or the
    /// least-recently-used occupied one if the store is full.
    pub fn allocate(
        &mut self,
        profile_id: ProfileId,
        key: ContextKey,
        now: u64,
        profile_ctx: ProfileContext,
    ) -> Result<u16, crate::Error> {
        if let Some(cid) = self.slots.iter().position(|s| s.is_none()) {
            self.slots[cid] = Some(Context::new(cid as u16, profile_id, key, now, profile_ctx));
            self.used += 1;
            return Ok(cid as u16);
        }

        let victim = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|c| (i, c.latest_used)))
            .min_by_key(|&(_, latest_used)| latest_used)
            .map(|(i, _)| i)
            .ok_or(crate::Error::ContextsFull)?;

        self.slots[victim] = Some(Context::new(victim as u16, profile_id, key, now, profile_ctx));
        Ok(victim as u16)
    }

    /// Drops a context, invoking no per-profile destructor beyond dropping
    /// its block (profile blocks hold no external resources in this core).
    pub fn destroy(&mut self, cid: u16) {
        if let Some(slot) = self.slots.get_mut(cid as usize) {
            if slot.take().is_some() {
                self.used -= 1;
            }
        }
    }

    pub fn touch(&mut self, cid: u16, now: u64) {
        if let Some(Some(ctx)) = self.slots.get_mut(cid as usize) {
            ctx.latest_used = now;
        }
    }

    /// Forces every occupied context through `f` (used by
    /// `force_contexts_reinit`).
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut Context)) {
        for slot in self.slots.iter_mut().flatten() {
            f(slot);
        }
    }
}
