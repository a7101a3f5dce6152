//! # ROHC Compressor SDK
//!
//! The public facade over [`rohc_compress`]: gathers the context store,
//! profile registry, state machine, feedback ring and segmenter behind the
//! `Compressor` type and the numbered-return-code API surface of RFC
//! 3095-family implementations (§6).
//!
//! This crate intentionally does not expose the deprecated compatibility
//! shims such implementations typically carry — only the current surface.

use compress::{
    compressor::{Engine, Outcome},
    packet::CidType,
    profile::ProfileId,
    Error,
};

/// `compress`/`get_segment` return codes (§6). `NEED_SEGMENT` carries the
/// number of bytes actually written to the caller's buffer this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NeedSegment(usize),
    Error,
}

impl Status {
    pub const ERROR_CODE: i32 = -5;

    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 1,
            Status::NeedSegment(n) => n.max(1) as i32,
            Status::Error => Self::ERROR_CODE,
        }
    }
}

/// A ROHC compressor instance: one per point-to-point link (§5, "multiple
/// compressor instances run independently without shared state").
pub struct Compressor {
    engine: Engine,
}

impl Compressor {
    /// `new(cid_type, max_cid)` (§6).
    pub fn new(cid_type: CidType, max_cid: u16) -> Self {
        Self {
            engine: Engine::new(cid_type, max_cid),
        }
    }

    pub fn set_traces_cb(&mut self, cb: impl Fn(&str) + Send + 'static) {
        self.engine.set_trace_cb(cb);
    }

    pub fn set_random_cb(&mut self, cb: impl FnMut() -> u16 + Send + 'static) -> Status {
        to_status_unit(self.engine.set_random_cb(cb))
    }

    pub fn enable_profile(&mut self, id: ProfileId) {
        self.engine.enable_profile(id, true);
    }

    pub fn disable_profile(&mut self, id: ProfileId) {
        self.engine.enable_profile(id, false);
    }

    pub fn set_wlsb_window_width(&mut self, width: usize) -> Status {
        to_status_unit(self.engine.set_wlsb_window_width(width))
    }

    pub fn set_periodic_refreshes(&mut self, ir: u32, fo: u32) -> Status {
        to_status_unit(self.engine.set_periodic_refreshes(ir, fo))
    }

    pub fn set_mrru(&mut self, bytes: usize) -> Status {
        to_status_unit(self.engine.set_mrru(bytes))
    }

    pub fn add_rtp_port(&mut self, port: u16) -> Status {
        if port == 0 {
            return Status::Error;
        }
        self.engine.add_rtp_port(port);
        Status::Ok
    }

    pub fn remove_rtp_port(&mut self, port: u16) {
        self.engine.remove_rtp_port(port);
    }

    pub fn reset_rtp_ports(&mut self) {
        self.engine.reset_rtp_ports();
    }

    /// `compress(arrival_time, in, in_len, out, out_max)` (§6).
    pub fn compress(&mut self, arrival_time: u64, input: &[u8], out: &mut [u8]) -> Status {
        match self.engine.compress(arrival_time, input, out.len()) {
            Ok((Outcome::Ok, bytes)) => {
                out[..bytes.len()].copy_from_slice(&bytes);
                Status::Ok
            }
            Ok((Outcome::NeedSegment, _)) => Status::NeedSegment(0),
            Err(_) => Status::Error,
        }
    }

    /// `get_segment(out, max)` (§6).
    pub fn get_segment(&mut self, out: &mut [u8]) -> Status {
        match self.engine.get_segment(out.len()) {
            Ok((outcome, bytes)) => {
                out[..bytes.len()].copy_from_slice(&bytes);
                match outcome {
                    Outcome::Ok => Status::Ok,
                    Outcome::NeedSegment => Status::NeedSegment(bytes.len()),
                }
            }
            Err(_) => Status::Error,
        }
    }

    pub fn piggyback_feedback(&mut self, bytes: &[u8]) -> Status {
        to_status_unit(self.engine.piggyback_feedback(bytes))
    }

    /// `deliver_feedback` (§6, §7 "Feedback decode"): a malformed or
    /// unknown CID is dropped with a warning, never surfaced as an error
    /// (S4).
    pub fn deliver_feedback(&mut self, cid: u16, nack: bool) {
        self.engine.deliver_feedback(cid, nack);
    }

    pub fn feedback_flush(&mut self) {
        self.engine.feedback_remove_locked();
    }

    pub fn feedback_avail_bytes(&self) -> usize {
        self.engine.feedback_avail_bytes()
    }

    pub fn feedback_remove_locked(&mut self) {
        self.engine.feedback_remove_locked();
    }

    pub fn feedback_unlock(&mut self) {
        self.engine.feedback_unlock();
    }

    pub fn force_contexts_reinit(&mut self) {
        self.engine.force_contexts_reinit();
    }

    pub fn get_last_packet_info2(&self) -> compress::compressor::LastPacketInfo {
        self.engine.get_last_packet_info()
    }

    pub fn get_general_info(&self) -> compress::compressor::GeneralInfo {
        self.engine.get_general_info()
    }

    pub fn get_mrru(&self) -> usize {
        self.engine.get_mrru()
    }

    pub fn get_max_cid(&self) -> u16 {
        self.engine.get_max_cid()
    }

    pub fn get_cid_type(&self) -> CidType {
        self.engine.get_cid_type()
    }

    pub fn get_state_descr(&self, cid: u16) -> Option<&'static str> {
        self.engine.get_state_descr(cid)
    }
}

fn to_status_unit(result: Result<(), Error>) -> Status {
    match result {
        Ok(()) => Status::Ok,
        Err(err) => {
            log::warn!("rejected configuration change: {err}");
            Status::Error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V4_ICMP: [u8; 84] = {
        let mut p = [0u8; 84];
        p[0] = 0x45;
        p[3] = 84;
        p[8] = 64;
        p[9] = 1;
        p[12] = 192;
        p[14] = 2;
        p[15] = 1;
        p[16] = 192;
        p[18] = 2;
        p[19] = 2;
        p
    };

    #[test]
    fn compresses_the_first_packet_as_ir() {
        let mut compressor = Compressor::new(CidType::Small, 15);
        let mut out = [0u8; 200];

        let status = compressor.compress(1, &V4_ICMP, &mut out);
        assert_eq!(status, Status::Ok);
        assert_eq!(status.code(), 1);
    }

    #[test]
    fn setters_are_rejected_after_the_first_packet() {
        let mut compressor = Compressor::new(CidType::Small, 15);
        let mut out = [0u8; 200];
        compressor.compress(1, &V4_ICMP, &mut out);

        assert_eq!(compressor.set_mrru(500), Status::Error);
    }

    #[test]
    fn feedback_for_an_unknown_cid_is_dropped_quietly() {
        let mut compressor = Compressor::new(CidType::Small, 15);
        compressor.deliver_feedback(3, true);
    }
}
