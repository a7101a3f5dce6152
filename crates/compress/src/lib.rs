//! RFC 3095 ROHC compressor engine: per-flow contexts, profile selection,
//! the generic state machine and packet-type decision, per-profile
//! specializations, the feedback ring, and MRRU-bounded segmentation.
//!
//! `rohc-sdk` wraps [`compressor::Engine`] behind the numbered-return-code
//! public facade; this crate speaks `Result`s and enums throughout.

pub mod compressor;
pub mod context;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod packet;
pub mod profile;
pub mod profiles;
pub mod segment;
pub mod view;

pub use self::error::Error;
