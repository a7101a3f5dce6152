use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// An SDVL-encoded value does not fit in 29 bits.
    SdvlOverflow,
    /// The input buffer ended before a full SDVL value could be read.
    SdvlTruncated,
    /// The IP version nibble was neither 4 nor 6.
    UnsupportedIpVersion(u8),
    /// The buffer is shorter than the header it claims to carry.
    IpTruncated,
    /// A third, doubly-nested IP header was found; only one level of
    /// tunneling is supported.
    IpTooManyHeaders,
    /// The declared total/payload length disagrees with the buffer length.
    IpLengthMismatch,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SdvlOverflow => write!(f, "sdvl: value does not fit in 29 bits"),
            Self::SdvlTruncated => write!(f, "sdvl: truncated input"),
            Self::UnsupportedIpVersion(v) => write!(f, "ip: unsupported version {v}"),
            Self::IpTruncated => write!(f, "ip: buffer shorter than declared header"),
            Self::IpTooManyHeaders => write!(f, "ip: more than one level of IP-in-IP tunneling"),
            Self::IpLengthMismatch => write!(f, "ip: declared length disagrees with buffer"),
        }
    }
}
