//! Per-profile specializations of the generic RFC 3095 framework (§4.4,
//! §4.6 "other profiles extend with...").

pub mod esp;
pub mod ip_only;
pub mod rtp;
pub mod udp;
pub mod udp_lite;
pub mod uncompressed;

use codec::ip::Address;

use crate::view::PacketView;

/// Address bytes used as the IP-identifying part of every profile's
/// context key.
pub(crate) fn address_bytes(addr: &Address) -> Vec<u8> {
    match addr {
        Address::V4(v4) => v4.octets().to_vec(),
        Address::V6(v6) => v6.octets().to_vec(),
    }
}

pub(crate) fn ip_key_parts(view: &PacketView) -> (Vec<u8>, Vec<u8>) {
    (
        address_bytes(&view.chain.outer.source),
        address_bytes(&view.chain.outer.destination),
    )
}
