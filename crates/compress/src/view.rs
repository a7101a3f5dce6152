//! A parsed uncompressed packet together with the raw bytes it was parsed
//! from, so profiles can peek past the IP chain into the transport header
//! (UDP ports, RTP SSRC/sequence number/timestamp) without re-parsing.

use codec::ip::Chain;

#[derive(Debug, Clone, Copy)]
pub struct PacketView<'a> {
    pub chain: Chain,
    pub bytes: &'a [u8],
}

impl<'a> PacketView<'a> {
    pub fn new(chain: Chain, bytes: &'a [u8]) -> Self {
        Self { chain, bytes }
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[self.chain.payload_offset..]
    }

    /// First two big-endian 16-bit words of the transport payload, the
    /// source/destination ports shared by UDP, UDP-Lite and (inside the
    /// UDP payload) RTP-over-UDP.
    pub fn ports(&self) -> Option<(u16, u16)> {
        let payload = self.payload();
        if payload.len() < 4 {
            return None;
        }

        Some((
            u16::from_be_bytes([payload[0], payload[1]]),
            u16::from_be_bytes([payload[2], payload[3]]),
        ))
    }

    /// The RTP header, if the payload (after an 8-byte UDP header) looks
    /// like one: version 2, at least 12 bytes.
    pub fn rtp(&self) -> Option<RtpView> {
        let payload = self.payload();
        if payload.len() < 8 + 12 {
            return None;
        }

        let rtp = &payload[8..];
        if rtp[0] >> 6 != 2 {
            return None;
        }

        Some(RtpView {
            marker: rtp[1] & 0x80 != 0,
            payload_type: rtp[1] & 0x7f,
            sequence_number: u16::from_be_bytes([rtp[2], rtp[3]]),
            timestamp: u32::from_be_bytes([rtp[4], rtp[5], rtp[6], rtp[7]]),
            ssrc: u32::from_be_bytes([rtp[8], rtp[9], rtp[10], rtp[11]]),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpView {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}
