//! ROHC segmentation (§4.9): when a compressed packet plus a trailing
//! FCS-32 fits within MRRU but not the caller's output buffer, it is
//! staged as an RRU and drained across successive `get_segment` calls.

use bytes::{BufMut, BytesMut};

use codec::crc::fcs32;

/// Buffered oversized ROHC packet awaiting segmentation (§3 "RRU").
#[derive(Debug, Default)]
pub struct Rru {
    data: Vec<u8>,
    offset: usize,
}

impl Rru {
    /// Stages `header ++ payload ++ FCS-32(header ++ payload)` (§4.9).
    /// Fails if the total would exceed `mrru`.
    pub fn stage(&mut self, header_and_payload: &[u8], mrru: usize) -> Result<(), crate::Error> {
        let total = header_and_payload.len() + 4;
        if total > mrru {
            return Err(crate::Error::OutputTooSmall { needed: total });
        }

        let mut buf = BytesMut::with_capacity(total);
        buf.put_slice(header_and_payload);
        buf.put_u32(fcs32(header_and_payload));

        self.data = buf.to_vec();
        self.offset = 0;

        Ok(())
    }

    pub fn is_present(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Emits the next segment into `out`, sized to fill `max` after the
    /// leading type byte (§6: `0xFE` non-final, `0xFF` final).
    pub fn get_segment(&mut self, out: &mut BytesMut, max: usize) -> bool {
        if !self.is_present() || max == 0 {
            return false;
        }

        let budget = max - 1;
        let take = budget.min(self.remaining());
        let is_final = take == self.remaining();

        out.put_u8(if is_final { 0xff } else { 0xfe });
        out.put_slice(&self.data[self.offset..self.offset + take]);
        self.offset += take;

        if is_final {
            self.data.clear();
            self.offset = 0;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_across_multiple_calls_and_marks_the_last_final() {
        let mut rru = Rru::default();
        let payload = vec![0x11u8; 25];
        rru.stage(&payload, 1500).unwrap();

        let mut first = BytesMut::new();
        assert!(rru.get_segment(&mut first, 11));
        assert_eq!(first[0], 0xfe);
        assert_eq!(first.len(), 11);

        let mut second = BytesMut::new();
        while rru.is_present() {
            second.clear();
            rru.get_segment(&mut second, 100);
        }
        assert_eq!(second[0], 0xff);
    }

    #[test]
    fn rejects_staging_beyond_mrru() {
        let mut rru = Rru::default();
        let payload = vec![0u8; 1500];
        assert!(rru.stage(&payload, 1000).is_err());
    }

    #[test]
    fn never_writes_more_than_max_bytes() {
        let mut rru = Rru::default();
        rru.stage(&[0x11u8; 25], 1500).unwrap();

        let mut out = BytesMut::new();
        assert!(!rru.get_segment(&mut out, 0), "max=0 leaves no room for even the marker byte");
        assert!(out.is_empty());

        let mut out = BytesMut::new();
        assert!(rru.get_segment(&mut out, 1), "max=1 still has room for the marker byte");
        assert_eq!(out.len(), 1, "max=1 must not carry any payload data");
    }
}
