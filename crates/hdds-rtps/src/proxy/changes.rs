// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-change delivery bookkeeping shared by ReaderProxy and ReaderLocator.
//!
//! Lifecycle of one entry:
//! ```text
//! unsent (push) ──pop──> underway ──ack──> acknowledged
//! unacknowledged (pull)      │  ^
//!                        nack│  │pop (repair)
//!                            v  │
//!                         requested
//! ```
//! Entries hold the sequence number and status only, never the payload.

use std::collections::BTreeMap;

use crate::types::SequenceNumber;
use crate::{Error, Result};

/// Delivery status of one change towards one reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeForReaderStatus {
    Unsent,
    Unacknowledged,
    Requested,
    Acknowledged,
    Underway,
}

/// One change as seen by one reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeForReader {
    pub sequence_number: SequenceNumber,
    pub status: ChangeForReaderStatus,
    /// False: the reader must be sent a Gap instead of the Data.
    pub is_relevant: bool,
}

/// Ordered status table for one reader.
#[derive(Debug, Clone)]
pub struct ChangesForReader {
    changes: BTreeMap<SequenceNumber, ChangeForReader>,
    push_mode: bool,
}

impl ChangesForReader {
    pub fn new(push_mode: bool) -> Self {
        Self {
            changes: BTreeMap::new(),
            push_mode,
        }
    }

    pub fn push_mode(&self) -> bool {
        self.push_mode
    }

    /// Register a change with the push/pull initial status.
    pub fn add(&mut self, seq: SequenceNumber, is_relevant: bool) -> Result<()> {
        let status = if self.push_mode {
            ChangeForReaderStatus::Unsent
        } else {
            ChangeForReaderStatus::Unacknowledged
        };
        self.add_with_status(seq, status, is_relevant)
    }

    /// Register a change with an explicit status (late-joiner seeding).
    pub fn add_with_status(
        &mut self,
        seq: SequenceNumber,
        status: ChangeForReaderStatus,
        is_relevant: bool,
    ) -> Result<()> {
        if self.changes.contains_key(&seq) {
            return Err(Error::PreconditionViolated(format!(
                "change {} already tracked for reader",
                seq
            )));
        }
        self.changes.insert(
            seq,
            ChangeForReader {
                sequence_number: seq,
                status,
                is_relevant,
            },
        );
        Ok(())
    }

    pub fn get(&self, seq: SequenceNumber) -> Option<&ChangeForReader> {
        self.changes.get(&seq)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeForReader> {
        self.changes.values()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn pop_lowest(&mut self, status: ChangeForReaderStatus) -> Option<ChangeForReader> {
        let entry = self.changes.values_mut().find(|c| c.status == status)?;
        entry.status = ChangeForReaderStatus::Underway;
        Some(*entry)
    }

    /// Lowest unsent change, now underway.
    pub fn pop_next_unsent(&mut self) -> Option<ChangeForReader> {
        self.pop_lowest(ChangeForReaderStatus::Unsent)
    }

    /// Lowest requested change, now underway.
    pub fn pop_next_requested(&mut self) -> Option<ChangeForReader> {
        self.pop_lowest(ChangeForReaderStatus::Requested)
    }

    /// Mark named changes requested. Unknown numbers and unsent changes are
    /// left alone. Returns how many entries became requested.
    pub fn set_requested<I>(&mut self, sequences: I) -> usize
    where
        I: IntoIterator<Item = SequenceNumber>,
    {
        let mut count = 0;
        for seq in sequences {
            if let Some(entry) = self.changes.get_mut(&seq) {
                match entry.status {
                    ChangeForReaderStatus::Unacknowledged
                    | ChangeForReaderStatus::Acknowledged
                    | ChangeForReaderStatus::Underway => {
                        entry.status = ChangeForReaderStatus::Requested;
                        count += 1;
                    }
                    ChangeForReaderStatus::Requested | ChangeForReaderStatus::Unsent => {}
                }
            }
        }
        count
    }

    /// Track requested numbers in `1..=last` that this table does not hold
    /// (never registered, or already pruned) as requested and irrelevant, so
    /// the repair answers them with a Gap. Returns how many were added.
    pub fn request_untracked<I>(&mut self, sequences: I, last: SequenceNumber) -> usize
    where
        I: IntoIterator<Item = SequenceNumber>,
    {
        let mut count = 0;
        for seq in sequences {
            if seq.is_valid() && seq <= last && !self.changes.contains_key(&seq) {
                self.changes.insert(
                    seq,
                    ChangeForReader {
                        sequence_number: seq,
                        status: ChangeForReaderStatus::Requested,
                        is_relevant: false,
                    },
                );
                count += 1;
            }
        }
        count
    }

    /// Acknowledge every change below `base`. Returns how many changed.
    ///
    /// Afterwards no entry below `base` is left unacknowledged. This covers
    /// requested and unsent entries as well as underway and unacknowledged
    /// ones: an AckNack base states the reader holds everything before it,
    /// whatever the writer last believed about those changes.
    pub fn set_acked(&mut self, base: SequenceNumber) -> usize {
        let mut count = 0;
        for entry in self.changes.range_mut(..base).map(|(_, e)| e) {
            if entry.status != ChangeForReaderStatus::Acknowledged {
                entry.status = ChangeForReaderStatus::Acknowledged;
                count += 1;
            }
        }
        count
    }

    /// Requested entries go back to unacknowledged (empty AckNack).
    pub fn clear_requested(&mut self) {
        for entry in self.changes.values_mut() {
            if entry.status == ChangeForReaderStatus::Requested {
                entry.status = ChangeForReaderStatus::Unacknowledged;
            }
        }
    }

    /// Re-mark every not yet acknowledged change unsent (resend period).
    pub fn unsent_changes_reset(&mut self) {
        for entry in self.changes.values_mut() {
            if entry.status != ChangeForReaderStatus::Acknowledged {
                entry.status = ChangeForReaderStatus::Unsent;
            }
        }
    }

    /// Turn a change into a Gap for this reader. False if not tracked.
    pub fn mark_irrelevant(&mut self, seq: SequenceNumber) -> bool {
        match self.changes.get_mut(&seq) {
            Some(entry) => {
                entry.is_relevant = false;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, seq: SequenceNumber) -> Option<ChangeForReader> {
        self.changes.remove(&seq)
    }

    /// Drop acknowledged entries below `floor`. Returns how many were removed.
    pub fn prune_acknowledged(&mut self, floor: SequenceNumber) -> usize {
        self.prune_below(floor, |status| status == ChangeForReaderStatus::Acknowledged)
    }

    /// Drop entries below `floor` that were sent at least once and are not
    /// waiting on a repair. Returns how many were removed.
    pub fn prune_delivered(&mut self, floor: SequenceNumber) -> usize {
        self.prune_below(floor, |status| {
            !matches!(
                status,
                ChangeForReaderStatus::Unsent | ChangeForReaderStatus::Requested
            )
        })
    }

    fn prune_below<F>(&mut self, floor: SequenceNumber, settled: F) -> usize
    where
        F: Fn(ChangeForReaderStatus) -> bool,
    {
        let doomed: Vec<SequenceNumber> = self
            .changes
            .range(..floor)
            .filter(|(_, c)| settled(c.status))
            .map(|(&seq, _)| seq)
            .collect();
        for seq in &doomed {
            self.changes.remove(seq);
        }
        doomed.len()
    }

    fn any(&self, status: ChangeForReaderStatus) -> bool {
        self.changes.values().any(|c| c.status == status)
    }

    pub fn has_unsent(&self) -> bool {
        self.any(ChangeForReaderStatus::Unsent)
    }

    pub fn has_requested(&self) -> bool {
        self.any(ChangeForReaderStatus::Requested)
    }

    /// Anything the reader still owes an acknowledgement for.
    pub fn has_unacked(&self) -> bool {
        self.changes
            .values()
            .any(|c| c.status != ChangeForReaderStatus::Acknowledged)
    }

    /// Acknowledged, or never tracked for this reader.
    pub fn is_acked(&self, seq: SequenceNumber) -> bool {
        self.changes
            .get(&seq)
            .map_or(true, |c| c.status == ChangeForReaderStatus::Acknowledged)
    }

    pub fn requested_changes(&self) -> Vec<SequenceNumber> {
        self.with_status(ChangeForReaderStatus::Requested)
    }

    pub fn unsent_changes(&self) -> Vec<SequenceNumber> {
        self.with_status(ChangeForReaderStatus::Unsent)
    }

    fn with_status(&self, status: ChangeForReaderStatus) -> Vec<SequenceNumber> {
        self.changes
            .values()
            .filter(|c| c.status == status)
            .map(|c| c.sequence_number)
            .collect()
    }
}
