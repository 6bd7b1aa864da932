// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SequenceNumberSet: base + bitmap of at most 256 bits.
//!
//! Bit `i` (MSB-first within each 32-bit word) stands for `base + i`. Used by
//! Gap (`gap_list`) and AckNack (`reader_sn_state`).

use crate::config::MAX_BITMAP_BITS;
use crate::types::SequenceNumber;
use crate::{Error, Result};

pub const WORD_BITS: u32 = 32;
pub const BITMAP_WORDS: usize = 8;

/// SequenceNumberSet representation used by GAP/ACKNACK submessages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceNumberSet {
    base: SequenceNumber,
    num_bits: u32,
    bitmap: [u32; BITMAP_WORDS],
}

impl SequenceNumberSet {
    /// Maximum number of bitmap bits (RTPS limit).
    pub const MAX_BITS: u32 = MAX_BITMAP_BITS;

    /// Create an empty set with the provided base sequence number.
    pub fn empty(base: SequenceNumber) -> Self {
        Self {
            base,
            num_bits: 0,
            bitmap: [0; BITMAP_WORDS],
        }
    }

    /// Create from explicit sequence numbers.
    ///
    /// Returns `None` if any member falls outside `[base, base + 256)`.
    pub fn from_sequences<I>(base: SequenceNumber, sequences: I) -> Option<Self>
    where
        I: IntoIterator<Item = SequenceNumber>,
    {
        let mut set = Self::empty(base);
        for seq in sequences {
            if !set.insert(seq) {
                return None;
            }
        }
        Some(set)
    }

    /// Like [`from_sequences`](Self::from_sequences) but silently drops
    /// members beyond the 256-bit window instead of failing.
    pub fn from_sequences_truncated<I>(base: SequenceNumber, sequences: I) -> Self
    where
        I: IntoIterator<Item = SequenceNumber>,
    {
        let mut set = Self::empty(base);
        for seq in sequences {
            if !set.insert(seq) && seq >= base {
                // Members arrive ascending from callers; nothing further fits
                break;
            }
        }
        set
    }

    /// Construct from raw bitmap words (decoder side).
    pub fn from_raw(base: SequenceNumber, num_bits: u32, words: &[u32]) -> Result<Self> {
        if !base.is_valid() {
            return Err(Error::DeserializeFailed(format!(
                "SequenceNumberSet base {} is not valid",
                base
            )));
        }
        if num_bits > MAX_BITMAP_BITS || words.len() > BITMAP_WORDS {
            return Err(Error::DeserializeFailed(format!(
                "SequenceNumberSet too large: {} bits",
                num_bits
            )));
        }

        let mut bitmap = [0u32; BITMAP_WORDS];
        for (idx, word) in words.iter().enumerate() {
            bitmap[idx] = *word;
        }
        Ok(Self {
            base,
            num_bits,
            bitmap,
        })
    }

    /// Add one member. Returns false when it lies outside the window.
    pub fn insert(&mut self, seq: SequenceNumber) -> bool {
        let Some(offset) = self.offset_of(seq) else {
            return false;
        };
        self.bitmap[(offset / WORD_BITS) as usize] |= 1 << (31 - offset % WORD_BITS);
        self.num_bits = self.num_bits.max(offset + 1);
        true
    }

    pub fn contains(&self, seq: SequenceNumber) -> bool {
        match self.offset_of(seq) {
            Some(offset) if offset < self.num_bits => {
                self.bitmap[(offset / WORD_BITS) as usize] & (1 << (31 - offset % WORD_BITS)) != 0
            }
            _ => false,
        }
    }

    fn offset_of(&self, seq: SequenceNumber) -> Option<u32> {
        let offset = seq.value().checked_sub(self.base.value())?;
        if (0..i64::from(MAX_BITMAP_BITS)).contains(&offset) {
            u32::try_from(offset).ok()
        } else {
            None
        }
    }

    /// Number of bitmap words that need to be transmitted.
    pub fn word_count(&self) -> usize {
        self.num_bits.div_ceil(WORD_BITS) as usize
    }

    /// Base sequence number of the set.
    pub fn base(&self) -> SequenceNumber {
        self.base
    }

    /// Number of bitmap bits actually used.
    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    /// Access bitmap word for encoding purposes.
    pub fn bitmap_word(&self, idx: usize) -> u32 {
        self.bitmap.get(idx).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.bitmap.iter().all(|w| *w == 0)
    }

    pub fn len(&self) -> usize {
        self.bitmap.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate through all sequence numbers contained in the set, ascending.
    pub fn iter(&self) -> SequenceNumberIter {
        SequenceNumberIter {
            base: self.base,
            num_bits: self.num_bits,
            bitmap: self.bitmap,
            index: 0,
        }
    }
}

/// Iterator over sequences contained in a `SequenceNumberSet`.
#[derive(Clone)]
pub struct SequenceNumberIter {
    base: SequenceNumber,
    num_bits: u32,
    bitmap: [u32; BITMAP_WORDS],
    index: u32,
}

impl Iterator for SequenceNumberIter {
    type Item = SequenceNumber;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.num_bits {
            let offset = self.index;
            let word = (offset / WORD_BITS) as usize;
            let mask = 1u32 << (31 - offset % WORD_BITS);
            self.index += 1;
            if self.bitmap[word] & mask != 0 {
                return Some(self.base + i64::from(offset));
            }
        }
        None
    }
}

impl IntoIterator for &SequenceNumberSet {
    type Item = SequenceNumber;
    type IntoIter = SequenceNumberIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sn(v: i64) -> SequenceNumber {
        SequenceNumber::new(v)
    }

    fn values(set: &SequenceNumberSet) -> Vec<i64> {
        set.iter().map(SequenceNumber::value).collect()
    }

    #[test]
    fn test_members_iterate_ascending() {
        let set = SequenceNumberSet::from_sequences(sn(1), [sn(5), sn(1), sn(4), sn(2)])
            .expect("within window");
        assert_eq!(values(&set), vec![1, 2, 4, 5]);
        assert_eq!(set.num_bits(), 5);
        assert_eq!(set.len(), 4);
        assert!(set.contains(sn(4)));
        assert!(!set.contains(sn(3)));
    }

    #[test]
    fn test_msb_first_bit_layout() {
        let set = SequenceNumberSet::from_sequences(sn(10), [sn(10), sn(42)]).expect("set");
        assert_eq!(set.bitmap_word(0), 0x8000_0000);
        assert_eq!(set.bitmap_word(1), 0x8000_0000);
        assert_eq!(set.word_count(), 2);
    }

    #[test]
    fn test_window_rejects_out_of_range() {
        assert!(SequenceNumberSet::from_sequences(sn(10), [sn(9)]).is_none());
        assert!(SequenceNumberSet::from_sequences(sn(10), [sn(10 + 256)]).is_none());
        assert!(SequenceNumberSet::from_sequences(sn(10), [sn(10 + 255)]).is_some());
    }

    #[test]
    fn test_truncated_keeps_window_prefix() {
        let set = SequenceNumberSet::from_sequences_truncated(sn(1), (1..=300).map(sn));
        assert_eq!(set.len(), 256);
        assert_eq!(set.num_bits(), 256);
        assert_eq!(set.iter().last(), Some(sn(256)));
    }

    #[test]
    fn test_empty_set() {
        let set = SequenceNumberSet::empty(sn(7));
        assert!(set.is_empty());
        assert_eq!(set.word_count(), 0);
        assert_eq!(set.iter().next(), None);
        assert_eq!(set.base(), sn(7));
    }

    #[test]
    fn test_from_raw_validates() {
        let set = SequenceNumberSet::from_raw(sn(1), 32, &[0x4000_0000]).expect("raw");
        assert_eq!(values(&set), vec![2]);
        assert!(matches!(
            SequenceNumberSet::from_raw(sn(0), 0, &[]),
            Err(Error::DeserializeFailed(_))
        ));
        assert!(matches!(
            SequenceNumberSet::from_raw(sn(1), 257, &[]),
            Err(Error::DeserializeFailed(_))
        ));
    }
}
