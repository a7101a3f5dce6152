//! Demonstration harness wiring configuration and logging around
//! `rohc-sdk` (§6a). Not part of the compressor core's contract — a
//! scaffold for exercising the library by hand.

pub mod config;

use std::collections::HashMap;

use sdk::{Compressor, Status};

use crate::config::{Stream, StreamProfile};

/// Aggregate stats printed after a synthetic run (§6a).
#[derive(Debug, Default)]
pub struct Stats {
    pub packets: u32,
    pub original_bytes: usize,
    pub compressed_bytes: usize,
    pub packet_types: HashMap<&'static str, u32>,
}

impl Stats {
    pub fn record(&mut self, original_len: usize, compressed_len: usize, kind: &'static str) {
        self.packets += 1;
        self.original_bytes += original_len;
        self.compressed_bytes += compressed_len;
        *self.packet_types.entry(kind).or_insert(0) += 1;
    }

    pub fn compression_ratio(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        self.compressed_bytes as f64 / self.original_bytes as f64
    }
}

fn ipv4_udp_packet(id: u16, src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let udp_len = 8 + payload.len();
    let total_len = 20 + udp_len;

    let mut packet = vec![0u8; total_len];
    packet[0] = 0x45;
    packet[2..4].copy_from_slice(&(total_len as u16).to_be_bytes());
    packet[4..6].copy_from_slice(&id.to_be_bytes());
    packet[6] = 0x40;
    packet[8] = 64;
    packet[9] = 17;
    packet[12..16].copy_from_slice(&[192, 0, 2, 1]);
    packet[16..20].copy_from_slice(&[192, 0, 2, 2]);
    packet[20..22].copy_from_slice(&src_port.to_be_bytes());
    packet[22..24].copy_from_slice(&dst_port.to_be_bytes());
    packet[24..26].copy_from_slice(&(udp_len as u16).to_be_bytes());
    packet[28..28 + payload.len()].copy_from_slice(payload);

    packet
}

fn ipv4_icmp_packet(id: u16) -> Vec<u8> {
    let mut packet = vec![0u8; 84];
    packet[0] = 0x45;
    packet[2..4].copy_from_slice(&84u16.to_be_bytes());
    packet[4..6].copy_from_slice(&id.to_be_bytes());
    packet[8] = 64;
    packet[9] = 1;
    packet[12..16].copy_from_slice(&[192, 0, 2, 1]);
    packet[16..20].copy_from_slice(&[192, 0, 2, 2]);
    packet
}

fn rtp_packet(id: u16, sn: u16, ts: u32, rtp_port: u16) -> Vec<u8> {
    let mut rtp = vec![0x80, 0x00];
    rtp.extend_from_slice(&sn.to_be_bytes());
    rtp.extend_from_slice(&ts.to_be_bytes());
    rtp.extend_from_slice(&0xdead_beefu32.to_be_bytes());
    rtp.extend_from_slice(&[0u8; 32]);

    ipv4_udp_packet(id, 40000, rtp_port, &rtp)
}

/// Builds one synthetic packet for step `i` of the configured stream.
pub fn synth_packet(stream: &Stream, i: u32) -> Vec<u8> {
    let id = (i + 1) as u16;
    match stream.profile {
        StreamProfile::IpOnly | StreamProfile::Uncompressed => ipv4_icmp_packet(id),
        StreamProfile::Udp => ipv4_udp_packet(id, 40000, 7000, b"payload"),
        StreamProfile::UdpLite => {
            let mut packet = ipv4_udp_packet(id, 40000, 7000, b"payload");
            packet[9] = 136;
            packet
        }
        StreamProfile::Esp => {
            let mut packet = ipv4_udp_packet(id, 0, 0, b"");
            packet[9] = 50;
            packet
        }
        StreamProfile::Rtp => rtp_packet(id, i as u16, i * 160, stream.rtp_port),
    }
}

fn packet_type_label(status: Status, first_byte: Option<u8>) -> &'static str {
    match (status, first_byte) {
        (Status::NeedSegment(_), _) => "segmented",
        (_, Some(b)) if b & 0b1111_1110 == 0b1111_1100 => "IR/Normal",
        (_, Some(b)) if b == 0b1111_1000 => "IR-DYN",
        (_, Some(b)) if b >> 7 == 0 => "UO-0",
        (_, Some(b)) if b >> 6 == 0b10 => "UO-1",
        (_, Some(b)) if b >> 5 == 0b110 => "UOR-2",
        _ => "unknown",
    }
}

/// Runs the configured synthetic stream through a fresh `Compressor` and
/// returns aggregate stats.
pub fn run_stream(stream: &Stream, max_cid: u16, mrru: usize) -> Stats {
    use compress::profile::ProfileId;

    let mut compressor = Compressor::new(compress::packet::CidType::Small, max_cid);
    if stream.profile == StreamProfile::Rtp {
        compressor.add_rtp_port(stream.rtp_port);
    }
    if mrru > 0 {
        let _ = compressor.set_mrru(mrru);
    }

    if matches!(stream.profile, StreamProfile::Uncompressed) {
        compressor.disable_profile(ProfileId::Rtp);
        compressor.disable_profile(ProfileId::Udp);
        compressor.disable_profile(ProfileId::UdpLite);
        compressor.disable_profile(ProfileId::Esp);
        compressor.disable_profile(ProfileId::IpOnly);
    }

    let mut stats = Stats::default();
    let mut out = vec![0u8; 1500];

    for i in 0..stream.packets {
        let packet = synth_packet(stream, i);
        let status = compressor.compress(i as u64, &packet, &mut out);
        let kind = packet_type_label(status, out.first().copied());
        let compressed_len = compressor.get_last_packet_info2().compressed_len;
        stats.record(packet.len(), compressed_len, kind);
    }

    stats
}
