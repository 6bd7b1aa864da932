// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Anonymous destination of a stateless writer.
//!
//! Same per-change bookkeeping as a ReaderProxy, keyed by locator rather
//! than by reader GUID. Always push mode.

use super::changes::{ChangeForReader, ChangesForReader};
use crate::types::{CacheChange, Locator, SequenceNumber};
use crate::Result;

#[derive(Debug, Clone)]
pub struct ReaderLocator {
    locator: Locator,
    expects_inline_qos: bool,
    changes: ChangesForReader,
}

impl ReaderLocator {
    pub fn new(locator: Locator, expects_inline_qos: bool) -> Self {
        Self {
            locator,
            expects_inline_qos,
            changes: ChangesForReader::new(true),
        }
    }

    pub fn locator(&self) -> Locator {
        self.locator
    }

    pub fn expects_inline_qos(&self) -> bool {
        self.expects_inline_qos
    }

    pub fn add_change(&mut self, change: &CacheChange) -> Result<()> {
        self.changes.add(change.sequence_number(), true)
    }

    pub fn changes(&self) -> &ChangesForReader {
        &self.changes
    }

    pub fn changes_mut(&mut self) -> &mut ChangesForReader {
        &mut self.changes
    }

    pub fn pop_next_unsent_change(&mut self) -> Option<ChangeForReader> {
        self.changes.pop_next_unsent()
    }

    pub fn pop_next_requested_change(&mut self) -> Option<ChangeForReader> {
        self.changes.pop_next_requested()
    }

    pub fn set_requested_changes<I>(&mut self, sequences: I) -> usize
    where
        I: IntoIterator<Item = SequenceNumber>,
    {
        self.changes.set_requested(sequences)
    }

    pub fn unsent_changes_reset(&mut self) {
        self.changes.unsent_changes_reset();
    }
}
