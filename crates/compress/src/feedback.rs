//! Feedback ring with two-phase commit (§4.8, Design Notes "Feedback
//! two-phase commit"): an index triple (`first`, `first_unlocked`, `next`)
//! over a fixed-size ring of entries, so a failing `compress` can restore
//! feedback that was tentatively handed to `get` without losing it.

use bytes::{BufMut, BytesMut};

/// RFC 3095 doesn't expose this constant; chosen as a small power of two
/// (§9 open question).
pub const FEEDBACK_RING_SIZE: usize = 64;

#[derive(Debug, Clone, Default)]
struct Entry {
    data: Vec<u8>,
    locked: bool,
}

/// A ring of pending feedback entries. `first..first_unlocked` holds
/// entries already returned by `get` and awaiting `remove_locked`/`unlock`;
/// `first_unlocked..next` holds entries not yet handed out.
pub struct FeedbackRing {
    entries: Vec<Entry>,
    first: usize,
    first_unlocked: usize,
    next: usize,
}

impl FeedbackRing {
    pub fn new() -> Self {
        Self {
            entries: (0..FEEDBACK_RING_SIZE).map(|_| Entry::default()).collect(),
            first: 0,
            first_unlocked: 0,
            next: 0,
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_full(&self) -> bool {
        self.first == self.next && !self.entries[self.first].data.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.first == self.next && self.entries[self.first].data.is_empty()
    }

    /// Admits `bytes` into the ring tail (§4.8 `piggyback`). Fails if the
    /// ring has no free slot.
    pub fn piggyback(&mut self, bytes: &[u8]) -> Result<(), crate::Error> {
        if self.is_full() {
            log::warn!("feedback ring full, dropping {} bytes", bytes.len());
            return Err(crate::Error::FeedbackFull);
        }

        let len = self.len();
        self.entries[self.next] = Entry { data: bytes.to_vec(), locked: false };
        self.next = (self.next + 1) % len;

        Ok(())
    }

    /// Returns the next unlocked entry formatted per RFC 3095 §5.2.2, and
    /// marks it locked. At most one entry is returned per call.
    pub fn get(&mut self, out: &mut BytesMut) -> bool {
        if self.first_unlocked == self.next && self.entries[self.first_unlocked].data.is_empty() {
            return false;
        }

        let len = self.len();
        let idx = self.first_unlocked;
        let data = &self.entries[idx].data;

        if data.len() < 8 {
            out.put_u8(0b1111_0000 | data.len() as u8);
        } else {
            out.put_u8(0b1111_0000);
            out.put_u8(data.len() as u8);
        }
        out.put_slice(data);

        self.entries[idx].locked = true;
        self.first_unlocked = (self.first_unlocked + 1) % len;

        true
    }

    /// Commits every locked entry up to `first_unlocked`, freeing its slot.
    pub fn remove_locked(&mut self) {
        let len = self.len();
        while self.first != self.first_unlocked {
            self.entries[self.first] = Entry::default();
            self.first = (self.first + 1) % len;
        }
    }

    /// Rolls back: clears the locked flag on every entry from `first` to
    /// `first_unlocked`, returning them to "pending" without losing data.
    pub fn unlock(&mut self) {
        let len = self.len();
        let mut i = self.first;
        while i != self.first_unlocked {
            self.entries[i].locked = false;
            i = (i + 1) % len;
        }
        self.first_unlocked = self.first;
    }

    /// Total bytes currently pending across unlocked entries.
    pub fn avail_bytes(&self) -> usize {
        let len = self.len();
        let mut total = 0;
        let mut i = self.first_unlocked;
        while i != self.next {
            total += self.entries[i].data.len();
            i = (i + 1) % len;
        }
        total
    }
}

impl Default for FeedbackRing {
    fn default() -> Self {
        Self::new()
    }
}
