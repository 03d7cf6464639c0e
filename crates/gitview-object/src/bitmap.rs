//! Reachability bitmaps.
//!
//! A bitmap index assigns every object a position and stores, for selected
//! commits, a bitmap with one bit set per object reachable from that commit.
//! Stored bitmaps use git's EWAH encoding:
//!
//! ```text
//! bit_count (4) | word_count (4) | word (8) * word_count | last_rlw_pos (4)
//! ```
//!
//! All integers are big-endian. Each run-length word (RLW) holds the fill bit
//! in bit 0, the fill run length in bits 1-32 and the number of literal words
//! that follow in bits 33-63.

use std::collections::HashMap;

use crate::{ObjectId, StoreError};

const MAX_RUN: u64 = 0xFFFF_FFFF;
const MAX_LITERALS: u64 = 0x7FFF_FFFF;

/// A dense bitset over object positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u64>,
}

impl Bitmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bit for `pos`.
    pub fn set(&mut self, pos: u32) {
        let (word, bit) = split(pos);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << bit;
    }

    /// Is the bit for `pos` set?
    pub fn contains(&self, pos: u32) -> bool {
        let (word, bit) = split(pos);
        self.words
            .get(word)
            .is_some_and(|w| w & (1u64 << bit) != 0)
    }

    /// In-place union.
    pub fn or_assign(&mut self, other: &Bitmap) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (dst, src) in self.words.iter_mut().zip(&other.words) {
            *dst |= *src;
        }
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Iterate over set positions in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &w)| {
            (0..64u32)
                .filter(move |bit| w & (1u64 << bit) != 0)
                .map(move |bit| i as u32 * 64 + bit)
        })
    }

    /// Encode as an EWAH stream.
    pub fn to_ewah(&self) -> Vec<u8> {
        let words = &self.words;
        let mut encoded: Vec<u64> = Vec::new();
        let mut last_rlw = 0usize;
        let mut i = 0;

        while i < words.len() || encoded.is_empty() {
            let mut fill_bit = false;
            let mut run = 0u64;
            if let Some(&w) = words.get(i) {
                if w == 0 || w == u64::MAX {
                    fill_bit = w == u64::MAX;
                    while i < words.len() && words[i] == w && run < MAX_RUN {
                        run += 1;
                        i += 1;
                    }
                }
            }

            let literal_start = i;
            while i < words.len()
                && words[i] != 0
                && words[i] != u64::MAX
                && ((i - literal_start) as u64) < MAX_LITERALS
            {
                i += 1;
            }
            let literals = (i - literal_start) as u64;

            last_rlw = encoded.len();
            encoded.push(u64::from(fill_bit) | (run << 1) | (literals << 33));
            encoded.extend_from_slice(&words[literal_start..i]);
        }

        let mut buf = Vec::with_capacity(12 + encoded.len() * 8);
        buf.extend_from_slice(&((words.len() * 64) as u32).to_be_bytes());
        buf.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
        for word in &encoded {
            buf.extend_from_slice(&word.to_be_bytes());
        }
        buf.extend_from_slice(&(last_rlw as u32).to_be_bytes());
        buf
    }

    /// Decode an EWAH stream starting at `pos`.
    ///
    /// Returns the bitmap and the offset just past the stream.
    pub fn from_ewah(data: &[u8], pos: usize) -> Result<(Self, usize), StoreError> {
        let bit_count = read_u32(data, pos, "EWAH header")? as usize;
        let word_count = read_u32(data, pos + 4, "EWAH header")? as usize;

        let mut words: Vec<u64> = Vec::with_capacity(bit_count.div_ceil(64));
        let mut wpos = pos + 8;
        let mut remaining = word_count;

        while remaining > 0 {
            let rlw = read_u64(data, wpos, "EWAH data")?;
            wpos += 8;
            remaining -= 1;

            let fill = if rlw & 1 != 0 { u64::MAX } else { 0 };
            let run = ((rlw >> 1) & MAX_RUN) as usize;
            let literals = (rlw >> 33) as usize;

            if words.len() + run > bit_count.div_ceil(64) {
                return Err(StoreError::InvalidBitmap(
                    "EWAH run exceeds bit count".into(),
                ));
            }
            words.resize(words.len() + run, fill);

            if literals > remaining {
                return Err(StoreError::InvalidBitmap("truncated EWAH literal".into()));
            }
            for _ in 0..literals {
                words.push(read_u64(data, wpos, "EWAH literal")?);
                wpos += 8;
                remaining -= 1;
            }
        }

        // Trailing position of the last RLW; only needed by writers.
        read_u32(data, wpos, "EWAH trailer")?;
        wpos += 4;

        let mut bitmap = Self { words };
        bitmap.truncate_bits(bit_count);
        Ok((bitmap, wpos))
    }

    fn truncate_bits(&mut self, bit_count: usize) {
        self.words.truncate(bit_count.div_ceil(64));
        let tail = bit_count % 64;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }
}

fn split(pos: u32) -> (usize, u32) {
    ((pos / 64) as usize, pos % 64)
}

fn read_u32(data: &[u8], pos: usize, what: &str) -> Result<u32, StoreError> {
    data.get(pos..pos + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| StoreError::InvalidBitmap(format!("truncated {what}")))
}

fn read_u64(data: &[u8], pos: usize, what: &str) -> Result<u64, StoreError> {
    data.get(pos..pos + 8)
        .map(|b| u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .ok_or_else(|| StoreError::InvalidBitmap(format!("truncated {what}")))
}

/// A precomputed reachability index.
pub trait BitmapIndex: Send + Sync {
    /// The bit position assigned to `oid`, if the index covers it.
    fn position(&self, oid: &ObjectId) -> Option<u32>;

    /// The stored reachability bitmap of `commit`, if one was selected.
    ///
    /// The bitmap includes the commit's own position.
    fn bitmap(&self, commit: &ObjectId) -> Result<Option<Bitmap>, StoreError>;
}

/// A bitmap index held in memory, entries kept EWAH-encoded like an on-disk
/// `.bitmap` file.
#[derive(Debug, Clone, Default)]
pub struct MemoryBitmapIndex {
    positions: HashMap<ObjectId, u32>,
    entries: HashMap<ObjectId, Vec<u8>>,
}

impl MemoryBitmapIndex {
    /// Create an index covering `objects`. Positions follow sorted id order.
    pub fn new(objects: impl IntoIterator<Item = ObjectId>) -> Self {
        let mut oids: Vec<ObjectId> = objects.into_iter().collect();
        oids.sort();
        oids.dedup();
        let positions = oids
            .into_iter()
            .enumerate()
            .map(|(i, oid)| (oid, i as u32))
            .collect();
        Self {
            positions,
            entries: HashMap::new(),
        }
    }

    /// Store the reachability bitmap for `commit`.
    pub fn add_bitmap(&mut self, commit: ObjectId, bitmap: &Bitmap) {
        self.entries.insert(commit, bitmap.to_ewah());
    }

    /// Number of commits with a stored bitmap.
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Does `commit` have a stored bitmap?
    pub fn has_bitmap(&self, commit: &ObjectId) -> bool {
        self.entries.contains_key(commit)
    }
}

impl BitmapIndex for MemoryBitmapIndex {
    fn position(&self, oid: &ObjectId) -> Option<u32> {
        self.positions.get(oid).copied()
    }

    fn bitmap(&self, commit: &ObjectId) -> Result<Option<Bitmap>, StoreError> {
        match self.entries.get(commit) {
            Some(data) => Ok(Some(Bitmap::from_ewah(data, 0)?.0)),
            None => Ok(None),
        }
    }
}
