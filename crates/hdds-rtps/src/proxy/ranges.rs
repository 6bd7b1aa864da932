// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sorted set of sequence numbers stored as merged inclusive ranges.
//!
//! Adjacent and overlapping ranges are merged on insert, so memory follows
//! the number of discontinuities, not the number of members.

use std::collections::BTreeMap;

use crate::types::SequenceNumber;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SeqRangeSet {
    /// start -> end, both inclusive; never overlapping or adjacent.
    ranges: BTreeMap<SequenceNumber, SequenceNumber>,
}

impl SeqRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored ranges.
    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn contains(&self, seq: SequenceNumber) -> bool {
        self.ranges
            .range(..=seq)
            .next_back()
            .is_some_and(|(_, &end)| end >= seq)
    }

    /// End of the range holding `seq`, if any.
    pub fn run_end(&self, seq: SequenceNumber) -> Option<SequenceNumber> {
        self.ranges
            .range(..=seq)
            .next_back()
            .filter(|&(_, &end)| end >= seq)
            .map(|(_, &end)| end)
    }

    /// Add `start..=end`. Empty ranges are ignored.
    pub fn insert(&mut self, start: SequenceNumber, end: SequenceNumber) {
        if start > end {
            return;
        }
        let (mut start, mut end) = (start, end);
        if let Some((&prev_start, &prev_end)) = self.ranges.range(..start).next_back() {
            if prev_end >= start.prev() {
                start = prev_start;
                end = end.max(prev_end);
            }
        }
        let absorbed: Vec<SequenceNumber> = self
            .ranges
            .range(start..=end.next())
            .map(|(&s, _)| s)
            .collect();
        for s in absorbed {
            if let Some(e) = self.ranges.remove(&s) {
                end = end.max(e);
            }
        }
        self.ranges.insert(start, end);
    }

    /// Remove `start..=end`, splitting ranges that straddle either bound.
    pub fn remove(&mut self, start: SequenceNumber, end: SequenceNumber) {
        if start > end {
            return;
        }
        if let Some((&prev_start, &prev_end)) = self.ranges.range(..start).next_back() {
            if prev_end >= start {
                self.ranges.insert(prev_start, start.prev());
                if prev_end > end {
                    self.ranges.insert(end.next(), prev_end);
                }
            }
        }
        let inside: Vec<SequenceNumber> = self.ranges.range(start..=end).map(|(&s, _)| s).collect();
        for s in inside {
            if let Some(e) = self.ranges.remove(&s) {
                if e > end {
                    self.ranges.insert(end.next(), e);
                }
            }
        }
    }

    /// Sub-ranges of `start..=end` not in the set, ascending.
    pub fn uncovered(
        &self,
        start: SequenceNumber,
        end: SequenceNumber,
    ) -> impl Iterator<Item = (SequenceNumber, SequenceNumber)> + '_ {
        let straddling = self
            .ranges
            .range(..start)
            .next_back()
            .filter(|&(_, &e)| e >= start);
        let mut covered = straddling
            .into_iter()
            .chain(self.ranges.range(start..=end.max(start)))
            .map(|(&s, &e)| (s, e));
        let mut cursor = start;
        let mut done = start > end;
        std::iter::from_fn(move || {
            while !done {
                match covered.next() {
                    Some((s, e)) if s > cursor => {
                        let hole = (cursor, s.prev());
                        done = e >= end;
                        cursor = e.next();
                        return Some(hole);
                    }
                    Some((_, e)) => {
                        if e >= end {
                            done = true;
                        } else {
                            cursor = cursor.max(e.next());
                        }
                    }
                    None => {
                        done = true;
                        return Some((cursor, end));
                    }
                }
            }
            None
        })
    }
}
