//! Self-Describing Variable-Length encoding (RFC 3095 §5.2.4).
//!
//! The top bits of the first byte announce the encoded length, so a
//! decoder never needs to know the field width up front:
//!
//! ```text
//! 0xxxxxxx                          ->  7 bits,  1 byte
//! 10xxxxxx xxxxxxxx                 -> 14 bits,  2 bytes
//! 110xxxxx xxxxxxxx xxxxxxxx         -> 21 bits,  3 bytes
//! 111xxxxx xxxxxxxx xxxxxxxx xxxxxxxx -> 29 bits, 4 bytes
//! ```

use bytes::BufMut;

use crate::Error;

const MAX_VALUE: u32 = (1 << 29) - 1;

/// Number of bytes [`encode`] would need for `value`, without writing it.
///
/// # Test
///
/// ```
/// use rohc_codec::sdvl::encoded_len;
///
/// assert_eq!(encoded_len(0).unwrap(), 1);
/// assert_eq!(encoded_len(127).unwrap(), 1);
/// assert_eq!(encoded_len(128).unwrap(), 2);
/// assert_eq!(encoded_len(16_383).unwrap(), 2);
/// assert_eq!(encoded_len(16_384).unwrap(), 3);
/// assert_eq!(encoded_len(2_097_151).unwrap(), 3);
/// assert_eq!(encoded_len(2_097_152).unwrap(), 4);
/// assert!(encoded_len(1 << 29).is_err());
/// ```
pub fn encoded_len(value: u32) -> Result<usize, Error> {
    Ok(match value {
        v if v < (1 << 7) => 1,
        v if v < (1 << 14) => 2,
        v if v < (1 << 21) => 3,
        v if v <= MAX_VALUE => 4,
        _ => return Err(Error::SdvlOverflow),
    })
}

/// Appends the SDVL encoding of `value` to `out`.
///
/// # Test
///
/// ```
/// use bytes::BytesMut;
/// use rohc_codec::sdvl::encode;
///
/// let mut out = BytesMut::new();
/// encode(&mut out, 15).unwrap();
/// assert_eq!(&out[..], &[0x0f]);
///
/// let mut out = BytesMut::new();
/// encode(&mut out, 300).unwrap();
/// assert_eq!(&out[..], &[0x81, 0x2c]);
/// ```
pub fn encode(out: &mut impl BufMut, value: u32) -> Result<(), Error> {
    match encoded_len(value)? {
        1 => out.put_u8(value as u8),
        2 => out.put_u16((0b10 << 14) | value as u16),
        3 => {
            let encoded = (0b110u32 << 21) | value;
            out.put_u8((encoded >> 16) as u8);
            out.put_u16(encoded as u16);
        }
        4 => out.put_u32((0b111u32 << 29) | value),
        _ => unreachable!(),
    }

    Ok(())
}

/// Decodes one SDVL value from the front of `bytes`, returning the value
/// and the number of bytes consumed.
///
/// # Test
///
/// ```
/// use rohc_codec::sdvl::decode;
///
/// assert_eq!(decode(&[0x0f]).unwrap(), (15, 1));
/// assert_eq!(decode(&[0x81, 0x2c]).unwrap(), (300, 2));
/// assert!(decode(&[]).is_err());
/// assert!(decode(&[0x81]).is_err());
/// ```
pub fn decode(bytes: &[u8]) -> Result<(u32, usize), Error> {
    let first = *bytes.first().ok_or(Error::SdvlTruncated)?;

    let len = if first & 0x80 == 0 {
        1
    } else if first & 0xc0 == 0x80 {
        2
    } else if first & 0xe0 == 0xc0 {
        3
    } else {
        4
    };

    if bytes.len() < len {
        return Err(Error::SdvlTruncated);
    }

    let value = match len {
        1 => first as u32,
        2 => (u16::from_be_bytes([bytes[0], bytes[1]]) & 0x3fff) as u32,
        3 => {
            let hi = (bytes[0] & 0x1f) as u32;
            let lo = u16::from_be_bytes([bytes[1], bytes[2]]) as u32;
            (hi << 16) | lo
        }
        4 => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) & 0x1fff_ffff,
        _ => unreachable!(),
    };

    Ok((value, len))
}
