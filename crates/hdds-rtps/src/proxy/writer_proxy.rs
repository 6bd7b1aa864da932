// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader-side model of one matched remote writer.
//!
//! Status per sequence number follows a one-way lattice:
//! `Unknown -> {Missing | Received | Lost}`, `Missing -> {Received | Lost}`.
//! Received and Lost are terminal.
//!
//! Storage is range based so neither a heartbeat announcing `[1, 2^40]` nor
//! a Gap naming the same span materialises per-number entries:
//! - everything in `(lost_floor, available_max]` is resolved and not stored
//! - `resolved` records resolved numbers outside that window, as ranges
//! - everything `<= lost_floor` not recorded is Lost
//! - everything in `(available_max, missing_ceiling]` not recorded is Missing
//! - everything above is Unknown
//!
//! Gap-declared numbers are additionally kept in `irrelevant`.

use super::ranges::SeqRangeSet;
use crate::messages::SequenceNumberSet;
use crate::types::{EntityId, Guid, Locator, SequenceNumber};

/// Reception status of one sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeFromWriterStatus {
    Unknown,
    Missing,
    Received,
    Lost,
}

/// What happened to an incoming Data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDisposition {
    /// First arrival; the change belongs in the cache.
    Accepted,
    /// Below the next expected sequence number (old or already resolved).
    Stale,
    /// Already received out of order.
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct WriterProxy {
    remote_writer_guid: Guid,
    remote_group_entity_id: EntityId,
    unicast_locators: Vec<Locator>,
    multicast_locators: Vec<Locator>,
    /// Received or gap-declared numbers not implied by the window above.
    resolved: SeqRangeSet,
    irrelevant: SeqRangeSet,
    lost_floor: SequenceNumber,
    missing_ceiling: SequenceNumber,
    /// Every number `<= available_max` is received or lost; the next one
    /// never is.
    available_max: SequenceNumber,
    last_heartbeat_count: Option<i32>,
    acknack_count: i32,
}

impl WriterProxy {
    pub fn new(
        remote_writer_guid: Guid,
        unicast_locators: Vec<Locator>,
        multicast_locators: Vec<Locator>,
    ) -> Self {
        Self {
            remote_writer_guid,
            remote_group_entity_id: EntityId::default(),
            unicast_locators,
            multicast_locators,
            resolved: SeqRangeSet::new(),
            irrelevant: SeqRangeSet::new(),
            lost_floor: SequenceNumber::ZERO,
            missing_ceiling: SequenceNumber::ZERO,
            available_max: SequenceNumber::ZERO,
            last_heartbeat_count: None,
            acknack_count: 0,
        }
    }

    pub fn with_group_entity_id(mut self, group: EntityId) -> Self {
        self.remote_group_entity_id = group;
        self
    }

    pub fn remote_writer_guid(&self) -> Guid {
        self.remote_writer_guid
    }

    pub fn remote_group_entity_id(&self) -> EntityId {
        self.remote_group_entity_id
    }

    pub fn unicast_locators(&self) -> &[Locator] {
        &self.unicast_locators
    }

    pub fn multicast_locators(&self) -> &[Locator] {
        &self.multicast_locators
    }

    /// Where AckNacks go: unicast when known, otherwise multicast.
    pub fn reply_locators(&self) -> &[Locator] {
        if self.unicast_locators.is_empty() {
            &self.multicast_locators
        } else {
            &self.unicast_locators
        }
    }

    pub fn status(&self, seq: SequenceNumber) -> ChangeFromWriterStatus {
        if self.resolved.contains(seq) {
            ChangeFromWriterStatus::Received
        } else if seq <= self.lost_floor {
            ChangeFromWriterStatus::Lost
        } else if seq <= self.available_max {
            ChangeFromWriterStatus::Received
        } else if seq <= self.missing_ceiling {
            ChangeFromWriterStatus::Missing
        } else {
            ChangeFromWriterStatus::Unknown
        }
    }

    /// False only for numbers a Gap declared irrelevant.
    pub fn is_relevant(&self, seq: SequenceNumber) -> bool {
        !self.irrelevant.contains(seq)
    }

    /// Highest number below which nothing is left unresolved.
    pub fn available_changes_max(&self) -> SequenceNumber {
        self.available_max
    }

    /// Next sequence number the reader will accept.
    pub fn expected_seq(&self) -> SequenceNumber {
        self.available_max.next()
    }

    /// Ranges held to answer `status`/`is_relevant`; grows with
    /// discontinuities, not with traffic.
    pub fn tracked_ranges(&self) -> usize {
        self.resolved.range_count() + self.irrelevant.range_count()
    }

    /// Mark everything below `first_available` not yet received as lost.
    pub fn lost_changes_update(&mut self, first_available: SequenceNumber) {
        let floor = first_available.prev();
        if floor > self.lost_floor {
            // The implied window shrinks; record what it covered below the new floor
            self.resolved
                .insert(self.lost_floor.next(), floor.min(self.available_max));
            self.lost_floor = floor;
            self.advance();
        }
    }

    /// Mark everything up to `last_available` still unknown as missing.
    pub fn missing_changes_update(&mut self, last_available: SequenceNumber) {
        if last_available > self.missing_ceiling {
            self.missing_ceiling = last_available;
        }
    }

    /// Apply a heartbeat's announced range.
    pub fn on_heartbeat(&mut self, first_available: SequenceNumber, last_available: SequenceNumber) {
        self.lost_changes_update(first_available);
        self.missing_changes_update(last_available);
    }

    /// Record an incoming Data.
    ///
    /// Numbers skipped between the expected one and `seq` become missing so
    /// the hole is repaired instead of silently ignored.
    pub fn on_data_received(&mut self, seq: SequenceNumber) -> DataDisposition {
        let expected = self.expected_seq();
        if seq < expected {
            return DataDisposition::Stale;
        }
        if self.resolved.contains(seq) {
            return DataDisposition::Duplicate;
        }
        if seq > expected {
            self.missing_changes_update(seq.prev());
        }
        self.received_change_set(seq);
        DataDisposition::Accepted
    }

    /// Mark `seq` received (best-effort path, no loss tracking).
    pub fn received_change_set(&mut self, seq: SequenceNumber) {
        // At or below available_max everything is already received or lost
        if seq <= self.available_max {
            return;
        }
        self.resolved.insert(seq, seq);
        self.advance();
    }

    /// Mark `seq` resolved without data (Gap).
    pub fn irrelevant_change_set(&mut self, seq: SequenceNumber) {
        self.irrelevant_changes_set(seq, seq);
    }

    /// Mark `first..=last` resolved without data. Numbers already resolved
    /// or lost keep their status.
    pub fn irrelevant_changes_set(&mut self, first: SequenceNumber, last: SequenceNumber) {
        let first = first.max(self.available_max.next());
        if first > last {
            return;
        }
        let fresh: Vec<(SequenceNumber, SequenceNumber)> =
            self.resolved.uncovered(first, last).collect();
        for (start, end) in fresh {
            self.irrelevant.insert(start, end);
        }
        self.resolved.insert(first, last);
        self.advance();
    }

    /// Apply a Gap: the contiguous run `gap_start..gap_list.base` plus every
    /// member of `gap_list`.
    pub fn on_gap(&mut self, gap_start: SequenceNumber, gap_list: &SequenceNumberSet) {
        let first = gap_start.max(SequenceNumber::new(1));
        self.irrelevant_changes_set(first, gap_list.base().prev());
        for seq in gap_list.iter() {
            if seq.is_valid() {
                self.irrelevant_change_set(seq);
            }
        }
    }

    /// Missing numbers, ascending.
    pub fn missing_changes(&self) -> impl Iterator<Item = SequenceNumber> + '_ {
        self.resolved
            .uncovered(self.available_max.next(), self.missing_ceiling)
            .flat_map(|(start, end)| start.range_through(end))
    }

    pub fn has_missing_changes(&self) -> bool {
        // available_max + 1 is never resolved, so it is missing once announced
        self.missing_ceiling > self.available_max
    }

    /// AckNack state: base acknowledges everything resolved, set requests
    /// the missing numbers that fit the 256-bit window.
    pub fn reader_sn_state(&self) -> SequenceNumberSet {
        SequenceNumberSet::from_sequences_truncated(self.expected_seq(), self.missing_changes())
    }

    /// Accept a heartbeat count; stale or replayed counts are refused.
    pub fn accept_heartbeat_count(&mut self, count: i32) -> bool {
        match self.last_heartbeat_count {
            Some(last) if count <= last => false,
            _ => {
                self.last_heartbeat_count = Some(count);
                true
            }
        }
    }

    /// Next AckNack count for this writer (starts at 1).
    pub fn next_acknack_count(&mut self) -> i32 {
        self.acknack_count = self.acknack_count.wrapping_add(1);
        self.acknack_count
    }

    fn advance(&mut self) {
        if self.lost_floor > self.available_max {
            self.available_max = self.lost_floor;
        }
        if let Some(end) = self.resolved.run_end(self.available_max.next()) {
            self.available_max = end;
        }
        self.resolved
            .remove(self.lost_floor.next(), self.available_max);
    }
}
