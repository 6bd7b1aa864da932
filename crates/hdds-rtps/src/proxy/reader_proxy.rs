// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer-side model of one matched remote reader.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::changes::{ChangeForReader, ChangesForReader};
use crate::types::{CacheChange, EntityId, Guid, Locator, SequenceNumber};
use crate::Result;

/// Decides whether a change is relevant to one reader. Irrelevant changes
/// are announced with a Gap instead of being sent.
pub type RelevanceFilter = Arc<dyn Fn(&CacheChange) -> bool + Send + Sync>;

/// Matched remote reader.
#[derive(Clone)]
pub struct ReaderProxy {
    remote_reader_guid: Guid,
    remote_group_entity_id: EntityId,
    unicast_locators: Vec<Locator>,
    multicast_locators: Vec<Locator>,
    expects_inline_qos: bool,
    is_active: bool,
    changes: ChangesForReader,
    filter: Option<RelevanceFilter>,
    last_acknack_count: Option<i32>,
    last_repair: Option<Instant>,
}

impl ReaderProxy {
    pub fn new(
        remote_reader_guid: Guid,
        unicast_locators: Vec<Locator>,
        multicast_locators: Vec<Locator>,
        push_mode: bool,
    ) -> Self {
        Self {
            remote_reader_guid,
            remote_group_entity_id: EntityId::default(),
            unicast_locators,
            multicast_locators,
            expects_inline_qos: false,
            is_active: true,
            changes: ChangesForReader::new(push_mode),
            filter: None,
            last_acknack_count: None,
            last_repair: None,
        }
    }

    pub fn with_expects_inline_qos(mut self, expects: bool) -> Self {
        self.expects_inline_qos = expects;
        self
    }

    pub fn with_group_entity_id(mut self, group: EntityId) -> Self {
        self.remote_group_entity_id = group;
        self
    }

    pub fn with_filter(mut self, filter: RelevanceFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn remote_reader_guid(&self) -> Guid {
        self.remote_reader_guid
    }

    pub fn remote_group_entity_id(&self) -> EntityId {
        self.remote_group_entity_id
    }

    pub fn expects_inline_qos(&self) -> bool {
        self.expects_inline_qos
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn unicast_locators(&self) -> &[Locator] {
        &self.unicast_locators
    }

    pub fn multicast_locators(&self) -> &[Locator] {
        &self.multicast_locators
    }

    /// Destination for submessages: unicast when known, otherwise multicast.
    pub fn locators(&self) -> &[Locator] {
        if self.unicast_locators.is_empty() {
            &self.multicast_locators
        } else {
            &self.unicast_locators
        }
    }

    /// Track a change with the push/pull initial status; relevance comes from
    /// the filter (always relevant without one).
    pub fn add_change(&mut self, change: &CacheChange) -> Result<()> {
        let relevant = self.filter.as_ref().map_or(true, |f| f(change));
        self.changes.add(change.sequence_number(), relevant)
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

    pub fn set_acked_changes(&mut self, base: SequenceNumber) -> usize {
        self.changes.set_acked(base)
    }

    /// Accept an AckNack count; stale or replayed counts are refused.
    pub fn accept_acknack_count(&mut self, count: i32) -> bool {
        match self.last_acknack_count {
            Some(last) if count <= last => false,
            _ => {
                self.last_acknack_count = Some(count);
                true
            }
        }
    }

    pub fn note_repair(&mut self, now: Instant) {
        self.last_repair = Some(now);
    }

    /// True while `now` lies within `window` of the last repair burst.
    pub fn in_suppression_window(&self, now: Instant, window: Duration) -> bool {
        if window.is_zero() {
            return false;
        }
        self.last_repair
            .is_some_and(|at| now.saturating_duration_since(at) < window)
    }
}

impl fmt::Debug for ReaderProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderProxy")
            .field("remote_reader_guid", &self.remote_reader_guid)
            .field("locators", &self.locators())
            .field("expects_inline_qos", &self.expects_inline_qos)
            .field("is_active", &self.is_active)
            .field("changes", &self.changes)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ChangeForReaderStatus;
    use crate::types::{ChangeKind, HANDLE_NIL};
    use std::net::Ipv4Addr;

    fn change(seq: i64, payload: &[u8]) -> CacheChange {
        CacheChange::new(
            ChangeKind::Alive,
            Guid::unknown(),
            HANDLE_NIL,
            SequenceNumber::new(seq),
            payload.to_vec(),
        )
    }

    #[test]
    fn test_filter_sets_relevance() {
        let filter: RelevanceFilter = Arc::new(|c: &CacheChange| !c.data().is_empty());
        let mut proxy = ReaderProxy::new(Guid::unknown(), Vec::new(), Vec::new(), true)
            .with_filter(filter);
        proxy.add_change(&change(1, b"x")).expect("1");
        proxy.add_change(&change(2, b"")).expect("2");

        assert!(proxy.changes().get(SequenceNumber::new(1)).expect("1").is_relevant);
        assert!(!proxy.changes().get(SequenceNumber::new(2)).expect("2").is_relevant);
    }

    #[test]
    fn test_requested_then_repaired_in_order() {
        let mut proxy = ReaderProxy::new(Guid::unknown(), Vec::new(), Vec::new(), true);
        for seq in 1..=5 {
            proxy.add_change(&change(seq, b"d")).expect("add");
        }
        while proxy.pop_next_unsent_change().is_some() {}
        let requested = [1, 2, 4, 5].map(SequenceNumber::new);
        proxy.set_requested_changes(requested);
        let repaired: Vec<SequenceNumber> = std::iter::from_fn(|| proxy.pop_next_requested_change())
            .map(|c| c.sequence_number)
            .collect();
        assert_eq!(repaired, requested.to_vec());
        assert_eq!(
            proxy.changes().get(SequenceNumber::new(3)).map(|c| c.status),
            Some(ChangeForReaderStatus::Underway)
        );
    }

    #[test]
    fn test_locators_prefer_unicast() {
        let uc = Locator::udpv4(Ipv4Addr::new(10, 0, 0, 1), 7411);
        let mc = Locator::udpv4(Ipv4Addr::new(239, 255, 0, 1), 7400);
        let proxy = ReaderProxy::new(Guid::unknown(), vec![uc], vec![mc], true);
        assert_eq!(proxy.locators(), &[uc]);
        let proxy = ReaderProxy::new(Guid::unknown(), Vec::new(), vec![mc], true);
        assert_eq!(proxy.locators(), &[mc]);
    }

    #[test]
    fn test_acknack_count_and_suppression() {
        let mut proxy = ReaderProxy::new(Guid::unknown(), Vec::new(), Vec::new(), true);
        assert!(proxy.accept_acknack_count(1));
        assert!(!proxy.accept_acknack_count(1));
        assert!(proxy.accept_acknack_count(2));

        let t0 = Instant::now();
        let window = Duration::from_millis(50);
        assert!(!proxy.in_suppression_window(t0, window));
        proxy.note_repair(t0);
        assert!(proxy.in_suppression_window(t0 + Duration::from_millis(10), window));
        assert!(!proxy.in_suppression_window(t0 + Duration::from_millis(60), window));
        assert!(!proxy.in_suppression_window(t0, Duration::ZERO));
    }
}
