//! Byte-exact ROHC packet construction (§4.7, §6 wire format).
//!
//! Every builder here writes the CID prefix, the packet-type-specific
//! header, and (for IR/IR-DYN) the static/dynamic chains, leaving the
//! caller to append the payload. The CRC fields always protect the
//! *original* uncompressed header bytes, never the compressed output.

use bytes::{BufMut, BytesMut};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use codec::{crc::Crc, ip::Header, sdvl};

use crate::{profile::ProfileId, view::PacketView};

/// CID addressing mode (§6 "CID type"): small CIDs use the Add-CID octet,
/// large CIDs an SDVL-encoded value after the packet-type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CidType {
    Small,
    Large,
}

/// Writes the CID prefix ahead of the packet-type byte. For CID 0 in
/// small-CID mode, nothing is written (§6 "CID 0 has no Add-CID octet").
pub fn write_cid_prefix(out: &mut BytesMut, cid_type: CidType, cid: u16) {
    match cid_type {
        CidType::Small if cid == 0 => {}
        CidType::Small => out.put_u8(0xe0 | (cid as u8 & 0x0f)),
        CidType::Large => {
            // written after the packet-type byte per RFC 3095 §5.2.4; the
            // caller interleaves by calling this again once the type byte
            // is known. Kept as a single entry point for both cases.
            sdvl::encode(out, cid as u32).expect("CID fits in SDVL range");
        }
    }
}

fn transport_len_for(profile_id: ProfileId) -> usize {
    match profile_id {
        ProfileId::Udp | ProfileId::UdpLite => 8,
        ProfileId::Rtp => 8 + 12,
        ProfileId::Esp => 8,
        ProfileId::IpOnly | ProfileId::Tcp | ProfileId::Uncompressed => 0,
    }
}

fn header_len_for(profile_id: ProfileId, view: &PacketView) -> usize {
    (view.chain.payload_offset + transport_len_for(profile_id)).min(view.bytes.len())
}

/// Whether the profile's declared header actually fits within the captured
/// bytes. `header_len_for` clamps to `view.bytes.len()` so it never panics,
/// but a clamp here means the CRC would silently cover a truncated header
/// instead of the real one — callers should treat a `false` result as an
/// encoding failure and fall back rather than emit a corrupt packet.
pub fn uncompressed_header_fits(profile_id: ProfileId, view: &PacketView) -> bool {
    view.chain.payload_offset + transport_len_for(profile_id) <= view.bytes.len()
}

/// The bytes of the original uncompressed header the CRC protects.
pub fn uncompressed_header_bytes<'a>(profile_id: ProfileId, view: &PacketView<'a>) -> &'a [u8] {
    &view.bytes[..header_len_for(profile_id, view)]
}

fn push_ip_static_chain(out: &mut BytesMut, header: &Header) {
    match header.source {
        codec::ip::Address::V4(addr) => {
            out.put_u8(4);
            out.put_slice(&addr.octets());
        }
        codec::ip::Address::V6(addr) => {
            out.put_u8(6);
            out.put_slice(&addr.octets());
        }
    }

    match header.destination {
        codec::ip::Address::V4(addr) => out.put_slice(&addr.octets()),
        codec::ip::Address::V6(addr) => out.put_slice(&addr.octets()),
    }

    out.put_u8(header.next_protocol);
}

fn push_ip_dynamic_chain(out: &mut BytesMut, header: &Header) {
    out.put_u8(header.tos_tc);
    out.put_u8(header.ttl_hl);
    out.put_u16(header.ip_id_or_flow as u16);
    out.put_u8(header.df as u8);
}

/// Builds the IP-based static chain (outer, then optional inner) shared by
/// every profile built on `GenericContext` (§4.7 "static chain").
pub fn static_chain(out: &mut BytesMut, view: &PacketView) {
    push_ip_static_chain(out, &view.chain.outer);
    if let Some(inner) = view.chain.inner {
        push_ip_static_chain(out, &inner);
    }
}

/// Builds the IP-based dynamic chain (§4.7 "dynamic chain").
pub fn dynamic_chain(out: &mut BytesMut, view: &PacketView) {
    push_ip_dynamic_chain(out, &view.chain.outer);
    if let Some(inner) = view.chain.inner {
        push_ip_dynamic_chain(out, &inner);
    }
}

/// IR packet (§6): `1111110D`, D=1 iff a dynamic chain follows.
pub fn build_ir(
    out: &mut BytesMut,
    profile_id: ProfileId,
    crc8: &Crc,
    view: &PacketView,
    sn: u16,
    with_dynamic: bool,
) {
    out.put_u8(0b1111_1100 | with_dynamic as u8);
    out.put_u8(profile_id.wire_id() as u8);

    let crc = crc8.compute(uncompressed_header_bytes(profile_id, view));
    out.put_u8(crc);

    static_chain(out, view);
    if with_dynamic {
        dynamic_chain(out, view);
    }

    if !matches!(profile_id, ProfileId::Rtp) {
        out.put_u16(sn);
    }
}

/// IR-DYN packet (§6): `11111000`, profile ID, CRC-8, dynamic chain only.
pub fn build_ir_dyn(out: &mut BytesMut, profile_id: ProfileId, crc8: &Crc, view: &PacketView) {
    out.put_u8(0b1111_1000);
    out.put_u8(profile_id.wire_id() as u8);

    let crc = crc8.compute(uncompressed_header_bytes(profile_id, view));
    out.put_u8(crc);

    dynamic_chain(out, view);
}

/// UO-0 packet (§6): `0SSSSCCC`, S = 4 SN LSBs, C = 3-bit CRC.
pub fn build_uo0(out: &mut BytesMut, crc3: &Crc, profile_id: ProfileId, view: &PacketView, sn: u16) {
    let crc = crc3.compute(uncompressed_header_bytes(profile_id, view));
    let sn_bits = (sn & 0x0f) as u8;
    out.put_u8((sn_bits << 3) | (crc & 0x07));
}

/// UO-1 packet (§6): first byte `10IIIIII` (6 IP-ID LSBs), second byte
/// `SSSSSCCC` (5 SN LSBs, 3-bit CRC).
pub fn build_uo1(
    out: &mut BytesMut,
    crc3: &Crc,
    profile_id: ProfileId,
    view: &PacketView,
    sn: u16,
    ip_id_lsb: u8,
) {
    out.put_u8(0b1000_0000 | (ip_id_lsb & 0x3f));

    let crc = crc3.compute(uncompressed_header_bytes(profile_id, view));
    let sn_bits = (sn & 0x1f) as u8;
    out.put_u8((sn_bits << 3) | (crc & 0x07));
}

/// A UOR-2 extension (RFC 3095 §5.7.5): carries whatever the base 5-bit SN
/// field of the UOR-2 packet can't, once the engine has decided the base
/// field alone isn't enough headroom.
pub enum Extension {
    /// 1 byte: 3 extra SN bits plus up to 5 outer IP-ID LSBs.
    Zero { sn_bits: u8, outer_ip_id_bits: u8 },
    /// 2 bytes: 3 extra SN bits plus a full outer IP-ID byte.
    One { sn_bits: u8, outer_ip_id: u8 },
    /// 3 bytes: 3 extra SN bits plus full outer and inner IP-ID bytes.
    Two { sn_bits: u8, outer_ip_id: u8, inner_ip_id: u8 },
    /// 1 byte: the 8 SN bits above the base 5, for when more SN headroom
    /// is needed than extensions 0-2's 3-bit field can carry.
    Three { sn_high_bits: u8 },
}

/// UOR-2 packet (§6): first byte `110SSSSS` (5 SN LSBs), second byte
/// `MXCCCCCC` (M = mode, X = extension-present, 7-bit CRC).
pub fn build_uor2(
    out: &mut BytesMut,
    crc7: &Crc,
    profile_id: ProfileId,
    view: &PacketView,
    sn: u16,
    extension: Option<Extension>,
) {
    out.put_u8(0b1100_0000 | (sn & 0x1f) as u8);

    let crc = crc7.compute(uncompressed_header_bytes(profile_id, view));
    let mode_bit = 0u8; // U-mode only.
    let x_bit = extension.is_some() as u8;
    out.put_u8((mode_bit << 7) | (x_bit << 6) | (crc & 0x7f));

    match extension {
        None => {}
        Some(Extension::Zero { sn_bits, outer_ip_id_bits }) => {
            out.put_u8(((sn_bits & 0x07) << 5) | (outer_ip_id_bits & 0x1f));
        }
        Some(Extension::One { sn_bits, outer_ip_id }) => {
            out.put_u8((sn_bits & 0x07) << 5);
            out.put_u8(outer_ip_id);
        }
        Some(Extension::Two { sn_bits, outer_ip_id, inner_ip_id }) => {
            out.put_u8((sn_bits & 0x07) << 5);
            out.put_u8(outer_ip_id);
            out.put_u8(inner_ip_id);
        }
        Some(Extension::Three { sn_high_bits }) => {
            out.put_u8(sn_high_bits);
        }
    }
}

/// Normal/Uncompressed packet (§6 scenario S5): `11111100` + raw header +
/// payload, verbatim.
pub fn build_normal(out: &mut BytesMut, raw_packet: &[u8]) {
    out.put_u8(0b1111_1100);
    out.put_slice(raw_packet);
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
    fn small_cid_zero_has_no_add_cid_octet() {
        let mut out = BytesMut::new();
        write_cid_prefix(&mut out, CidType::Small, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn small_cid_nonzero_is_an_add_cid_octet() {
        let mut out = BytesMut::new();
        write_cid_prefix(&mut out, CidType::Small, 3);
        assert_eq!(&out[..], &[0xe3]);
    }

    #[test]
    fn uo0_packs_four_sn_bits_and_three_crc_bits() {
        let chain = ip::parse(&V4_UDP).unwrap();
        let view = PacketView::new(chain, &V4_UDP);
        let crc3 = Crc::crc3();

        let mut out = BytesMut::new();
        build_uo0(&mut out, &crc3, ProfileId::IpOnly, &view, 0x1234);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0] >> 7, 0);
        assert_eq!((out[0] >> 3) & 0x0f, 0x4);
    }

    #[test]
    fn ir_sets_the_dynamic_flag_bit() {
        let chain = ip::parse(&V4_UDP).unwrap();
        let view = PacketView::new(chain, &V4_UDP);
        let crc8 = Crc::crc8();

        let mut with_dyn = BytesMut::new();
        build_ir(&mut with_dyn, ProfileId::IpOnly, &crc8, &view, 7, true);
        assert_eq!(with_dyn[0], 0b1111_1101);

        let mut without_dyn = BytesMut::new();
        build_ir(&mut without_dyn, ProfileId::IpOnly, &crc8, &view, 7, false);
        assert_eq!(without_dyn[0], 0b1111_1100);
    }

    #[test]
    fn uor2_without_extension_clears_the_x_bit() {
        let chain = ip::parse(&V4_UDP).unwrap();
        let view = PacketView::new(chain, &V4_UDP);
        let crc7 = Crc::crc7();

        let mut out = BytesMut::new();
        build_uor2(&mut out, &crc7, ProfileId::IpOnly, &view, 0x1234, None);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0] >> 5, 0b110);
        assert_eq!(out[0] & 0x1f, 0x14);
        assert_eq!(out[1] & 0b0100_0000, 0, "x bit must be clear with no extension");
    }

    #[test]
    fn uor2_extension_zero_packs_sn_and_outer_ip_id_into_one_byte() {
        let chain = ip::parse(&V4_UDP).unwrap();
        let view = PacketView::new(chain, &V4_UDP);
        let crc7 = Crc::crc7();

        let mut out = BytesMut::new();
        build_uor2(
            &mut out,
            &crc7,
            ProfileId::IpOnly,
            &view,
            0x1234,
            Some(Extension::Zero { sn_bits: 0x05, outer_ip_id_bits: 0x0a }),
        );

        assert_eq!(out.len(), 3);
        assert_ne!(out[1] & 0b0100_0000, 0, "x bit must be set once an extension is present");
        assert_eq!(out[2] >> 5, 0x05);
        assert_eq!(out[2] & 0x1f, 0x0a);
    }

    #[test]
    fn uor2_extension_two_carries_both_outer_and_inner_ip_id_bytes() {
        let chain = ip::parse(&V4_UDP).unwrap();
        let view = PacketView::new(chain, &V4_UDP);
        let crc7 = Crc::crc7();

        let mut out = BytesMut::new();
        build_uor2(
            &mut out,
            &crc7,
            ProfileId::IpOnly,
            &view,
            0x1234,
            Some(Extension::Two { sn_bits: 0x03, outer_ip_id: 0xaa, inner_ip_id: 0xbb }),
        );

        assert_eq!(out.len(), 5);
        assert_eq!(out[2] >> 5, 0x03);
        assert_eq!(out[3], 0xaa);
        assert_eq!(out[4], 0xbb);
    }

    #[test]
    fn uor2_extension_three_is_a_single_sn_high_byte() {
        let chain = ip::parse(&V4_UDP).unwrap();
        let view = PacketView::new(chain, &V4_UDP);
        let crc7 = Crc::crc7();

        let mut out = BytesMut::new();
        build_uor2(
            &mut out,
            &crc7,
            ProfileId::IpOnly,
            &view,
            0x1234,
            Some(Extension::Three { sn_high_bits: 0x42 }),
        );

        assert_eq!(out.len(), 3);
        assert_eq!(out[2], 0x42);
    }
}
