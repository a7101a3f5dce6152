//! ## Robust Header Compression (ROHC) — wire primitives
//!
//! [RFC3095]: https://tools.ietf.org/html/rfc3095
//! [RFC1662]: https://tools.ietf.org/html/rfc1662
//!
//! ROHC [RFC3095] compresses the headers of IP/UDP/RTP (and similar) flows
//! down to a handful of bytes by replacing most fields with small deltas
//! relative to a context the decompressor maintains in lock-step with the
//! compressor. This crate provides the protocol-agnostic building blocks
//! that the encoding is built from: Self-Describing Variable-Length
//! integers (SDVL), Window-based Least Significant Bits (W-LSB) encoding,
//! the ROHC CRC families, the FCS-32 checksum used by segmentation
//! [RFC1662], and a minimal IPv4/IPv6 header parser.
//!
//! None of this crate performs I/O; it only encodes and decodes bytes.

pub mod crc;
pub mod error;
pub mod ip;
pub mod sdvl;
pub mod wlsb;

pub use self::error::Error;
