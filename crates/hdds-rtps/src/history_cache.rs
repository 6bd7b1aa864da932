// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-endpoint store of CacheChanges.
//!
//! Ordered by (sequence number, writer GUID). A writer cache only ever holds
//! its own changes, so the key degenerates to the sequence number; a reader
//! cache receiving from several writers keeps their sequence spaces apart.
//!
//! History policy is enforced on insert: `KeepLast(n)` evicts the lowest
//! sequence number once the cache would exceed `n` changes and hands the
//! evicted change back so the writer can tell its proxies. `KeepAll` never
//! evicts.

use std::collections::BTreeMap;

use crate::config::HistoryKind;
use crate::types::{CacheChange, Guid, SequenceNumber};
use crate::{Error, Result};

type ChangeKey = (SequenceNumber, Guid);

/// Ordered history of one endpoint.
#[derive(Debug, Clone, Default)]
pub struct HistoryCache {
    changes: BTreeMap<ChangeKey, CacheChange>,
    history: HistoryKind,
}

impl HistoryCache {
    /// Empty cache keeping all history.
    pub fn new() -> Self {
        Self::with_history(HistoryKind::KeepAll)
    }

    pub fn with_history(history: HistoryKind) -> Self {
        Self {
            changes: BTreeMap::new(),
            history,
        }
    }

    pub fn history(&self) -> HistoryKind {
        self.history
    }

    /// Insert a change.
    ///
    /// Returns the change evicted by `KeepLast`, if any. Fails with
    /// `PreconditionViolated` when the (sequence number, writer) pair is
    /// already cached or the sequence number is not valid.
    pub fn add_change(&mut self, change: CacheChange) -> Result<Option<CacheChange>> {
        let seq = change.sequence_number();
        if !seq.is_valid() {
            return Err(Error::PreconditionViolated(format!(
                "sequence number {} is not valid",
                seq
            )));
        }
        let key = (seq, change.writer_guid());
        if self.changes.contains_key(&key) {
            return Err(Error::PreconditionViolated(format!(
                "sequence number {} from {} already cached",
                seq,
                change.writer_guid()
            )));
        }
        self.changes.insert(key, change);

        let evicted = match self.history {
            HistoryKind::KeepLast(depth) if self.changes.len() > depth as usize => {
                self.changes.pop_first().map(|(_, evicted)| evicted)
            }
            _ => None,
        };
        if let Some(evicted) = &evicted {
            log::trace!(
                "[history] KeepLast evicted seq={} writer={}",
                evicted.sequence_number(),
                evicted.writer_guid()
            );
        }
        Ok(evicted)
    }

    /// Remove and return a change. `PreconditionViolated` if absent.
    pub fn remove_change(&mut self, writer: &Guid, seq: SequenceNumber) -> Result<CacheChange> {
        self.changes.remove(&(seq, *writer)).ok_or_else(|| {
            Error::PreconditionViolated(format!(
                "sequence number {} from {} not in cache",
                seq, writer
            ))
        })
    }

    pub fn get_change(&self, writer: &Guid, seq: SequenceNumber) -> Option<&CacheChange> {
        self.changes.get(&(seq, *writer))
    }

    pub fn contains(&self, writer: &Guid, seq: SequenceNumber) -> bool {
        self.changes.contains_key(&(seq, *writer))
    }

    /// Lowest cached sequence number, `None` when empty.
    pub fn seq_num_min(&self) -> Option<SequenceNumber> {
        self.changes.keys().next().map(|(seq, _)| *seq)
    }

    /// Highest cached sequence number, `None` when empty.
    pub fn seq_num_max(&self) -> Option<SequenceNumber> {
        self.changes.keys().next_back().map(|(seq, _)| *seq)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes in ascending sequence order.
    pub fn iter(&self) -> impl Iterator<Item = &CacheChange> {
        self.changes.values()
    }

    /// Remove the lowest change (application `take`).
    pub fn take_first(&mut self) -> Result<CacheChange> {
        self.changes
            .pop_first()
            .map(|(_, change)| change)
            .ok_or(Error::NoData)
    }

    /// Drop every change of `writer` with sequence number `<= seq`.
    ///
    /// Returns the removed changes in ascending order.
    pub fn remove_changes_up_to(&mut self, writer: &Guid, seq: SequenceNumber) -> Vec<CacheChange> {
        let keys: Vec<ChangeKey> = self
            .changes
            .range(..=(seq, Guid::from_bytes([0xFF; 16])))
            .filter(|((_, guid), _)| guid == writer)
            .map(|(key, _)| *key)
            .collect();
        keys.into_iter()
            .filter_map(|key| self.changes.remove(&key))
            .collect()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }
}
