// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS sequence numbers and per-writer generation.
//!
//! On the wire a sequence number is a signed high / unsigned low pair combined
//! as `high * 2^32 + low`. Sequence number 0 is never valid; writers assign
//! strictly increasing values starting at 1.

use std::fmt;
use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicI64, Ordering};

/// 64-bit RTPS sequence number.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SequenceNumber(i64);

/// SEQUENCENUMBER_UNKNOWN (high = -1, low = 0).
pub const SEQUENCENUMBER_UNKNOWN: SequenceNumber = SequenceNumber(-(1_i64 << 32));

impl SequenceNumber {
    /// Zero: "nothing yet" marker, never a valid change.
    pub const ZERO: SequenceNumber = SequenceNumber(0);
    pub const MAX: SequenceNumber = SequenceNumber(i64::MAX);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Combine the wire representation `high * 2^32 + low`.
    pub fn from_parts(high: i32, low: u32) -> Self {
        Self((i64::from(high) << 32) | i64::from(low))
    }

    pub fn high(self) -> i32 {
        (self.0 >> 32) as i32
    }

    pub fn low(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Valid sequence numbers are strictly positive.
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    #[inline]
    pub fn prev(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// Iterate `self..end` (exclusive).
    pub fn range_to(self, end: SequenceNumber) -> impl Iterator<Item = SequenceNumber> {
        (self.0..end.0).map(SequenceNumber)
    }

    /// Iterate `self..=end` (inclusive).
    pub fn range_through(self, end: SequenceNumber) -> impl Iterator<Item = SequenceNumber> {
        (self.0..=end.0).map(SequenceNumber)
    }
}

impl Add<i64> for SequenceNumber {
    type Output = SequenceNumber;

    fn add(self, rhs: i64) -> Self::Output {
        SequenceNumber(self.0.saturating_add(rhs))
    }
}

impl Sub<i64> for SequenceNumber {
    type Output = SequenceNumber;

    fn sub(self, rhs: i64) -> Self::Output {
        SequenceNumber(self.0.saturating_sub(rhs))
    }
}

impl From<i64> for SequenceNumber {
    fn from(value: i64) -> Self {
        SequenceNumber(value)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SN({})", self.0)
    }
}

/// Sequence number generator (per-writer)
///
/// Generates monotonically increasing sequence numbers starting at 1.
///
/// # Thread Safety
///
/// All methods are thread-safe via `AtomicI64`.
#[derive(Debug)]
pub struct SeqNumGenerator {
    /// Next sequence number to assign
    next: AtomicI64,
}

impl SeqNumGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(1),
        }
    }

    /// Get next sequence number (monotonically increasing)
    #[inline]
    pub fn next(&self) -> SequenceNumber {
        // fetch_add returns OLD value, so result is the seq we should use
        SequenceNumber(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Highest sequence number assigned so far (`ZERO` before the first write).
    #[inline]
    pub fn last(&self) -> SequenceNumber {
        SequenceNumber(self.next.load(Ordering::Relaxed) - 1)
    }
}

impl Default for SeqNumGenerator {
    fn default() -> Self {
        Self::new()
    }
}
