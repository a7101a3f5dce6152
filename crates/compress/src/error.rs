use std::fmt;

use codec::Error as CodecError;

#[derive(Debug)]
pub enum Error {
    /// No enabled profile's `check_profile` accepted the packet.
    NoProfile,
    /// The context array is full and held no evictable victim.
    ContextsFull,
    /// The feedback ring had no room for a `piggyback` call.
    FeedbackFull,
    /// The chosen profile (and the Uncompressed fallback) both failed to
    /// encode this packet.
    EncodingFailed,
    /// `compress` could not fit the packet and MRRU forbids segmentation.
    OutputTooSmall { needed: usize },
    /// A setter was called after the first packet was compressed, or with
    /// an out-of-range argument.
    InvalidConfig(&'static str),
    /// Failure parsing the packet's own IP/transport headers.
    Codec(CodecError),
}

impl Error {
    /// Whether the engine may still retry this packet with a different
    /// (more conservative) encoding path, per the §7 "Encoding fallback"
    /// rule.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EncodingFailed)
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoProfile => write!(f, "no enabled profile accepted this packet"),
            Self::ContextsFull => write!(f, "context array full, no evictable victim"),
            Self::FeedbackFull => write!(f, "feedback ring full"),
            Self::EncodingFailed => write!(f, "profile encoding failed"),
            Self::OutputTooSmall { needed } => {
                write!(f, "output buffer too small, needed {needed} bytes")
            }
            Self::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
            Self::Codec(inner) => write!(f, "codec error: {inner}"),
        }
    }
}

impl From<CodecError> for Error {
    fn from(inner: CodecError) -> Self {
        Self::Codec(inner)
    }
}
