// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer endpoint behaviour.
//!
//! One type covers all four variants chosen by [`WriterConfig`]:
//! - stateful writers keep one [`ReaderProxy`] per matched reader and
//!   address Data/Gap/Heartbeat to the reader's entity id
//! - stateless writers keep one [`ReaderLocator`] per destination and
//!   address everything to `ENTITYID_UNKNOWN`
//!
//! Reliable writers additionally announce (Heartbeat) and repair (AckNack ->
//! nack-response delay -> Data or Gap).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use super::effect::{Effect, TimerKey, TimerKind};
use super::writer_fsm::{
    announce_transition, push_transition, repair_transition, AnnounceAction, AnnounceEvent,
    AnnounceState, PushAction, PushEvent, PushState, RepairAction, RepairEvent, RepairState,
};
use crate::config::{DurabilityKind, WriterConfig};
use crate::history_cache::HistoryCache;
use crate::messages::{
    AckNackSubmessage, DataSubmessage, GapSubmessage, HeartbeatSubmessage, InfoTimestamp,
    ReceiverContext, SequenceNumberSet, Submessage,
};
use crate::metrics::ReliableMetrics;
use crate::proxy::{ChangeForReader, ChangeForReaderStatus, ChangesForReader, ReaderLocator, ReaderProxy};
use crate::types::{
    CacheChange, ChangeKind, EntityId, Guid, GuidPrefix, InstanceHandle, Locator, ParameterList,
    SeqNumGenerator, SequenceNumber, Time, ENTITYID_UNKNOWN, HANDLE_NIL,
};
use crate::{Error, Result};

/// Submessage delivered to a writer.
#[derive(Debug, Clone, Copy)]
pub enum WriterInput<'a> {
    AckNack(&'a AckNackSubmessage),
}

#[derive(Debug)]
struct MatchedReader {
    proxy: ReaderProxy,
    push: PushState,
    announce: AnnounceState,
    repair: RepairState,
}

#[derive(Debug)]
struct LocatorState {
    locator: ReaderLocator,
    push: PushState,
    repair: RepairState,
}

/// Writer endpoint: cache, sequence generator, matched readers and state
/// machines.
#[derive(Debug)]
pub struct Writer {
    guid: Guid,
    config: WriterConfig,
    cache: HistoryCache,
    seq_gen: SeqNumGenerator,
    readers: BTreeMap<Guid, MatchedReader>,
    locators: BTreeMap<Locator, LocatorState>,
    /// Stateless writers announce once for all locators.
    announce: AnnounceState,
    heartbeat_count: i32,
    deleted: bool,
    metrics: Arc<ReliableMetrics>,
}

impl Writer {
    pub fn new(guid: Guid, config: WriterConfig, metrics: Arc<ReliableMetrics>) -> Result<Self> {
        if !guid.entity_id.is_writer() {
            return Err(Error::PreconditionViolated(format!(
                "{} is not a writer entity",
                guid
            )));
        }
        config.validate()?;
        log::debug!(
            "[writer] created {} reliable={} stateful={} push={}",
            guid,
            config.is_reliable(),
            config.stateful,
            config.push_mode
        );
        Ok(Self {
            guid,
            cache: HistoryCache::with_history(config.history),
            config,
            seq_gen: SeqNumGenerator::new(),
            readers: BTreeMap::new(),
            locators: BTreeMap::new(),
            announce: AnnounceState::Idle,
            heartbeat_count: 0,
            deleted: false,
            metrics,
        })
    }

    /// Periodic timers to arm once the writer is registered.
    pub fn start(&self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.config.is_reliable() {
            effects.push(Effect::arm_periodic(
                TimerKey::new(self.guid, TimerKind::Heartbeat),
                self.config.heartbeat_period,
            ));
        }
        if !self.config.stateful {
            if let Some(period) = self.config.resend_data_period {
                effects.push(Effect::arm_periodic(
                    TimerKey::new(self.guid, TimerKind::ResendData),
                    period,
                ));
            }
        }
        effects
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn cache(&self) -> &HistoryCache {
        &self.cache
    }

    /// Highest sequence number assigned so far.
    pub fn last_sequence_number(&self) -> SequenceNumber {
        self.seq_gen.last()
    }

    pub fn heartbeat_count(&self) -> i32 {
        self.heartbeat_count
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    // ------------------------------------------------------------------
    // Application API
    // ------------------------------------------------------------------

    /// Build the next change of this writer. Dispose and unregister carry
    /// their kind as status info; keyed changes carry the key hash.
    pub fn new_change(
        &self,
        kind: ChangeKind,
        data: impl Into<Arc<[u8]>>,
        handle: InstanceHandle,
    ) -> CacheChange {
        let mut inline_qos = ParameterList::new();
        if handle != HANDLE_NIL {
            inline_qos = inline_qos.with_key_hash(handle.0);
        }
        if kind != ChangeKind::Alive {
            inline_qos = inline_qos.with_status_info(kind.status_info_flags());
        }
        CacheChange::new(kind, self.guid, handle, self.seq_gen.next(), data)
            .with_inline_qos(inline_qos)
            .with_source_timestamp(Time::now())
    }

    pub fn write(
        &mut self,
        data: impl Into<Arc<[u8]>>,
        handle: InstanceHandle,
    ) -> Result<(SequenceNumber, Vec<Effect>)> {
        self.publish(ChangeKind::Alive, data.into(), handle)
    }

    pub fn dispose(&mut self, handle: InstanceHandle) -> Result<(SequenceNumber, Vec<Effect>)> {
        self.publish(ChangeKind::Disposed, Arc::from(Vec::new()), handle)
    }

    pub fn unregister(&mut self, handle: InstanceHandle) -> Result<(SequenceNumber, Vec<Effect>)> {
        self.publish(ChangeKind::Unregistered, Arc::from(Vec::new()), handle)
    }

    fn publish(
        &mut self,
        kind: ChangeKind,
        data: Arc<[u8]>,
        handle: InstanceHandle,
    ) -> Result<(SequenceNumber, Vec<Effect>)> {
        if self.deleted {
            return Err(Error::PreconditionViolated(format!(
                "writer {} is deleted",
                self.guid
            )));
        }
        let change = self.new_change(kind, data, handle);
        let seq = change.sequence_number();
        let effects = self.add_change(change)?;
        Ok((seq, effects))
    }

    /// Store a change and register it with every proxy (`new_change` in
    /// the always-active region), then push to readers that are idle.
    pub fn add_change(&mut self, change: CacheChange) -> Result<Vec<Effect>> {
        if change.writer_guid() != self.guid {
            return Err(Error::PreconditionViolated(format!(
                "change from {} offered to writer {}",
                change.writer_guid(),
                self.guid
            )));
        }
        let seq = change.sequence_number();
        let evicted = self.cache.add_change(change)?;

        if let Some(stored) = self.cache.get_change(&self.guid, seq) {
            for matched in self.readers.values_mut() {
                matched.proxy.add_change(stored)?;
            }
            for state in self.locators.values_mut() {
                state.locator.add_change(stored)?;
            }
        }
        if let Some(evicted) = evicted {
            log::trace!(
                "[writer] {} history full, evicted seq={}",
                self.guid,
                evicted.sequence_number()
            );
            self.forget_change(evicted.sequence_number());
        }
        log::trace!("[writer] {} new change seq={}", self.guid, seq);
        let effects = self.push_all();
        self.prune_tables();
        Ok(effects)
    }

    /// Remove a change (`removed_change`): proxies still owing it will be
    /// sent a Gap instead.
    pub fn remove_change(&mut self, seq: SequenceNumber) -> Result<CacheChange> {
        let removed = self.cache.remove_change(&self.guid, seq)?;
        self.forget_change(seq);
        log::trace!("[writer] {} removed seq={}", self.guid, seq);
        Ok(removed)
    }

    /// Push whatever is still unsent to every reader and locator.
    pub fn flush(&mut self) -> Vec<Effect> {
        if self.deleted {
            return Vec::new();
        }
        self.push_all()
    }

    /// True when every matched reader acknowledged `seq`.
    pub fn is_acked_by_all(&self, seq: SequenceNumber) -> bool {
        self.readers
            .values()
            .all(|m| m.proxy.changes().is_acked(seq))
    }

    /// Heartbeat with final and liveliness flags set, sent to everyone.
    pub fn assert_liveliness(&mut self) -> Vec<Effect> {
        self.heartbeat_effects(true)
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    /// Match a reader. Existing history is offered according to durability:
    /// transient-local readers get it as ordinary changes, volatile reliable
    /// readers are told (by Gap, on request) it is irrelevant.
    pub fn matched_reader_add(&mut self, mut proxy: ReaderProxy) -> Result<Vec<Effect>> {
        if !self.config.stateful {
            return Err(Error::PreconditionViolated(
                "stateless writer tracks reader locators, not proxies".to_string(),
            ));
        }
        self.ensure_alive()?;
        let reader_guid = proxy.remote_reader_guid();
        if self.readers.contains_key(&reader_guid) {
            return Err(Error::PreconditionViolated(format!(
                "reader {} already matched",
                reader_guid
            )));
        }

        for change in self.cache.iter() {
            match self.config.durability {
                DurabilityKind::TransientLocal => proxy.add_change(change)?,
                DurabilityKind::Volatile if self.config.is_reliable() => {
                    proxy.changes_mut().add_with_status(
                        change.sequence_number(),
                        ChangeForReaderStatus::Unacknowledged,
                        false,
                    )?;
                }
                DurabilityKind::Volatile => {}
            }
        }

        let (push, _) = push_transition(PushState::Initial, PushEvent::Configured);
        log::debug!(
            "[writer] {} matched reader {} (seeded {} changes)",
            self.guid,
            reader_guid,
            proxy.changes().len()
        );
        self.readers.insert(
            reader_guid,
            MatchedReader {
                proxy,
                push,
                announce: AnnounceState::Idle,
                repair: RepairState::Waiting,
            },
        );
        Ok(self.push_reader(&reader_guid).into_iter().collect())
    }

    pub fn matched_reader_remove(&mut self, reader_guid: &Guid) -> Result<Vec<Effect>> {
        let matched = self
            .readers
            .remove(reader_guid)
            .ok_or(Error::UnknownEndpoint(*reader_guid))?;
        let (push, _) = push_transition(matched.push, PushEvent::Released);
        log::debug!(
            "[writer] {} unmatched reader {} ({:?})",
            self.guid,
            reader_guid,
            push
        );
        self.evict_acknowledged();
        Ok(vec![Effect::DisarmTimer(TimerKey::new(
            self.guid,
            TimerKind::NackResponse(*reader_guid),
        ))])
    }

    pub fn matched_reader(&self, reader_guid: &Guid) -> Option<&ReaderProxy> {
        self.readers.get(reader_guid).map(|m| &m.proxy)
    }

    pub fn matched_readers(&self) -> impl Iterator<Item = &ReaderProxy> {
        self.readers.values().map(|m| &m.proxy)
    }

    /// Add a destination to a stateless writer. Transient-local writers
    /// replay their history to it.
    pub fn reader_locator_add(
        &mut self,
        locator: Locator,
        expects_inline_qos: bool,
    ) -> Result<Vec<Effect>> {
        if self.config.stateful {
            return Err(Error::PreconditionViolated(
                "stateful writer tracks reader proxies, not locators".to_string(),
            ));
        }
        self.ensure_alive()?;
        if self.locators.contains_key(&locator) {
            return Err(Error::PreconditionViolated(format!(
                "locator {} already configured",
                locator
            )));
        }
        let mut reader_locator = ReaderLocator::new(locator, expects_inline_qos);
        if self.config.durability == DurabilityKind::TransientLocal {
            for change in self.cache.iter() {
                reader_locator.add_change(change)?;
            }
        }
        let (push, _) = push_transition(PushState::Initial, PushEvent::Configured);
        log::debug!("[writer] {} added locator {}", self.guid, locator);
        self.locators.insert(
            locator,
            LocatorState {
                locator: reader_locator,
                push,
                repair: RepairState::Waiting,
            },
        );
        Ok(self.push_locator(&locator).into_iter().collect())
    }

    pub fn reader_locator_remove(&mut self, locator: &Locator) -> Result<Vec<Effect>> {
        if self.locators.remove(locator).is_none() {
            return Err(Error::PreconditionViolated(format!(
                "locator {} not configured",
                locator
            )));
        }
        log::debug!("[writer] {} removed locator {}", self.guid, locator);
        Ok(vec![Effect::DisarmTimer(TimerKey::new(
            self.guid,
            TimerKind::NackResponseLocator(*locator),
        ))])
    }

    pub fn reader_locators(&self) -> impl Iterator<Item = &ReaderLocator> {
        self.locators.values().map(|s| &s.locator)
    }

    // ------------------------------------------------------------------
    // Protocol events
    // ------------------------------------------------------------------

    pub fn process_event(
        &mut self,
        input: WriterInput<'_>,
        context: &ReceiverContext,
        now: Instant,
    ) -> Result<Vec<Effect>> {
        match input {
            WriterInput::AckNack(ack) => self.on_acknack(ack, context, now),
        }
    }

    /// Apply an AckNack: positive part acknowledges, negative part requests
    /// repair after the nack-response delay.
    pub fn on_acknack(
        &mut self,
        ack: &AckNackSubmessage,
        context: &ReceiverContext,
        now: Instant,
    ) -> Result<Vec<Effect>> {
        if self.deleted || !self.config.is_reliable() {
            return Ok(Vec::new());
        }
        if self.config.stateful {
            self.on_acknack_stateful(ack, context, now)
        } else {
            self.on_acknack_stateless(ack, context)
        }
    }

    fn on_acknack_stateful(
        &mut self,
        ack: &AckNackSubmessage,
        context: &ReceiverContext,
        now: Instant,
    ) -> Result<Vec<Effect>> {
        let reader_guid = Guid::new(context.source_guid_prefix, ack.reader_id);
        let last = self.seq_gen.last();
        let matched = self
            .readers
            .get_mut(&reader_guid)
            .ok_or(Error::UnknownEndpoint(reader_guid))?;

        if !matched.proxy.accept_acknack_count(ack.count) {
            log::trace!(
                "[writer] {} stale acknack count={} from {}",
                self.guid,
                ack.count,
                reader_guid
            );
            self.metrics.increment_stale(1);
            return Ok(Vec::new());
        }

        let state = &ack.reader_sn_state;
        matched.proxy.set_acked_changes(state.base());
        if state.is_empty() {
            matched.proxy.changes_mut().clear_requested();
        } else if matched
            .proxy
            .in_suppression_window(now, self.config.nack_suppression_duration)
        {
            log::trace!(
                "[writer] {} suppressed nack from {}",
                self.guid,
                reader_guid
            );
            self.metrics.increment_suppressed_acknacks(1);
        } else {
            matched.proxy.set_requested_changes(state.iter());
            matched.proxy.changes_mut().request_untracked(state.iter(), last);
        }
        log::debug!(
            "[writer] {} ACKNACK from {} base={} requested={}",
            self.guid,
            reader_guid,
            state.base(),
            state.len()
        );

        let mut effects = Vec::new();
        let has_requested = matched.proxy.changes().has_requested();
        let (repair, action) = repair_transition(matched.repair, RepairEvent::AckNack { has_requested });
        matched.repair = repair;
        let key = TimerKey::new(self.guid, TimerKind::NackResponse(reader_guid));
        match action {
            RepairAction::ArmNackDelay => {
                effects.push(Effect::arm_once(key, self.config.nack_response_delay));
            }
            RepairAction::DisarmNackDelay => effects.push(Effect::DisarmTimer(key)),
            RepairAction::None | RepairAction::SendNextRequested => {}
        }
        if !matched.proxy.changes().has_unacked() {
            matched.announce =
                announce_transition(matched.announce, AnnounceEvent::UnackedChangesEmpty).0;
        }

        self.evict_acknowledged();
        self.prune_tables();
        Ok(effects)
    }

    fn on_acknack_stateless(
        &mut self,
        ack: &AckNackSubmessage,
        context: &ReceiverContext,
    ) -> Result<Vec<Effect>> {
        let locator = context
            .unicast_reply_locators
            .iter()
            .chain(context.multicast_reply_locators.iter())
            .find(|l| self.locators.contains_key(*l))
            .copied()
            .ok_or(Error::UnknownEndpoint(Guid::new(
                context.source_guid_prefix,
                ack.reader_id,
            )))?;
        let last = self.seq_gen.last();
        let Some(state) = self.locators.get_mut(&locator) else {
            return Ok(Vec::new());
        };

        let changes = state.locator.changes_mut();
        if ack.reader_sn_state.is_empty() {
            changes.clear_requested();
        } else {
            changes.set_requested(ack.reader_sn_state.iter());
            changes.request_untracked(ack.reader_sn_state.iter(), last);
        }
        let has_requested = changes.has_requested();
        let (repair, action) = repair_transition(state.repair, RepairEvent::AckNack { has_requested });
        state.repair = repair;

        let key = TimerKey::new(self.guid, TimerKind::NackResponseLocator(locator));
        let effects = match action {
            RepairAction::ArmNackDelay => vec![Effect::arm_once(key, self.config.nack_response_delay)],
            RepairAction::DisarmNackDelay => vec![Effect::DisarmTimer(key)],
            RepairAction::None | RepairAction::SendNextRequested => Vec::new(),
        };
        self.prune_tables();
        Ok(effects)
    }

    /// Timer expiry. Timers naming an unmatched reader or locator are stale.
    pub fn on_timer(&mut self, kind: TimerKind, now: Instant) -> Result<Vec<Effect>> {
        if self.deleted {
            return Ok(Vec::new());
        }
        let effects = match kind {
            TimerKind::Heartbeat => self.heartbeat_effects(false),
            TimerKind::NackResponse(reader_guid) => {
                match self.readers.get_mut(&reader_guid) {
                    Some(matched) => {
                        matched.repair =
                            repair_transition(matched.repair, RepairEvent::AfterNackDelay).0;
                        matched.proxy.note_repair(now);
                    }
                    None => {
                        self.stale_timer(kind);
                        return Ok(Vec::new());
                    }
                }
                self.repair_reader(&reader_guid).into_iter().collect()
            }
            TimerKind::NackResponseLocator(locator) => {
                match self.locators.get_mut(&locator) {
                    Some(state) => {
                        state.repair =
                            repair_transition(state.repair, RepairEvent::AfterNackDelay).0;
                    }
                    None => {
                        self.stale_timer(kind);
                        return Ok(Vec::new());
                    }
                }
                self.repair_locator(&locator).into_iter().collect()
            }
            TimerKind::ResendData => {
                for state in self.locators.values_mut() {
                    state.locator.unsent_changes_reset();
                }
                self.push_all()
            }
            TimerKind::HeartbeatResponse(_) => Vec::new(),
        };
        self.prune_tables();
        Ok(effects)
    }

    /// Drive every proxy to `final` and disarm the writer's timers.
    pub fn delete(&mut self) -> Vec<Effect> {
        if self.deleted {
            return Vec::new();
        }
        self.deleted = true;
        log::debug!("[writer] {} deleted", self.guid);
        let writer = self.guid;
        let mut effects = vec![
            Effect::DisarmTimer(TimerKey::new(writer, TimerKind::Heartbeat)),
            Effect::DisarmTimer(TimerKey::new(writer, TimerKind::ResendData)),
        ];
        for guid in std::mem::take(&mut self.readers).into_keys() {
            effects.push(Effect::DisarmTimer(TimerKey::new(
                writer,
                TimerKind::NackResponse(guid),
            )));
        }
        for locator in std::mem::take(&mut self.locators).into_keys() {
            effects.push(Effect::DisarmTimer(TimerKey::new(
                writer,
                TimerKind::NackResponseLocator(locator),
            )));
        }
        effects
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_alive(&self) -> Result<()> {
        if self.deleted {
            return Err(Error::PreconditionViolated(format!(
                "writer {} is deleted",
                self.guid
            )));
        }
        Ok(())
    }

    fn stale_timer(&self, kind: TimerKind) {
        log::debug!("[writer] {} stale timer {:?}", self.guid, kind);
        self.metrics.increment_stale(1);
    }

    /// A change left the cache. Reliable readers still owing it get a Gap;
    /// best-effort readers simply stop tracking it.
    fn forget_change(&mut self, seq: SequenceNumber) {
        let reliable = self.config.is_reliable();
        let forget = |changes: &mut ChangesForReader| {
            if reliable {
                changes.mark_irrelevant(seq);
            } else {
                changes.remove(seq);
            }
        };
        self.readers
            .values_mut()
            .for_each(|m| forget(m.proxy.changes_mut()));
        self.locators
            .values_mut()
            .for_each(|s| forget(s.locator.changes_mut()));
    }

    /// Reliable stateful volatile writers drop the acknowledged prefix of
    /// their history once every matched reader has it.
    fn evict_acknowledged(&mut self) {
        if !(self.config.is_reliable()
            && self.config.stateful
            && self.config.durability == DurabilityKind::Volatile)
            || self.readers.is_empty()
        {
            return;
        }
        let acked: Vec<SequenceNumber> = self
            .cache
            .iter()
            .map(CacheChange::sequence_number)
            .take_while(|seq| self.is_acked_by_all(*seq))
            .collect();
        for seq in acked {
            if self.cache.remove_change(&self.guid, seq).is_ok() {
                for matched in self.readers.values_mut() {
                    matched.proxy.changes_mut().remove(seq);
                }
                log::trace!("[writer] {} evicted acknowledged seq={}", self.guid, seq);
            }
        }
    }

    /// Drop proxy entries for changes below the cache floor that need
    /// nothing more. Readers drop what they acknowledged; locators, which
    /// never see positive acknowledgements, drop what was delivered and is
    /// not awaiting repair. A later request for a dropped number is answered
    /// with a Gap.
    fn prune_tables(&mut self) {
        let floor = self
            .cache
            .seq_num_min()
            .unwrap_or_else(|| self.seq_gen.last().next());
        let mut pruned = 0;
        for matched in self.readers.values_mut() {
            pruned += matched.proxy.changes_mut().prune_acknowledged(floor);
        }
        for state in self.locators.values_mut() {
            pruned += state.locator.changes_mut().prune_delivered(floor);
        }
        if pruned > 0 {
            log::trace!(
                "[writer] {} pruned {} proxy entries below seq={}",
                self.guid,
                pruned,
                floor
            );
        }
    }

    fn push_all(&mut self) -> Vec<Effect> {
        let readers: Vec<Guid> = self.readers.keys().copied().collect();
        let locators: Vec<Locator> = self.locators.keys().copied().collect();
        let mut effects = Vec::new();
        for guid in &readers {
            effects.extend(self.push_reader(guid));
        }
        for locator in &locators {
            effects.extend(self.push_locator(locator));
        }
        effects
    }

    fn push_reader(&mut self, reader_guid: &Guid) -> Option<Effect> {
        let reliable = self.config.is_reliable();
        let matched = self.readers.get_mut(reader_guid)?;
        let mut outbox = Outbox::new(
            &self.cache,
            self.guid,
            reader_guid.entity_id,
            reliable,
            matched.proxy.expects_inline_qos(),
            &self.metrics,
        );
        run_push(&mut matched.push, matched.proxy.changes_mut(), &mut outbox);
        if reliable && matched.proxy.changes().has_unacked() {
            matched.announce =
                announce_transition(matched.announce, AnnounceEvent::UnackedChanges).0;
        }
        outbox.finish(Some(reader_guid.prefix), matched.proxy.locators().to_vec())
    }

    fn push_locator(&mut self, locator: &Locator) -> Option<Effect> {
        let state = self.locators.get_mut(locator)?;
        let mut outbox = Outbox::new(
            &self.cache,
            self.guid,
            ENTITYID_UNKNOWN,
            self.config.is_reliable(),
            state.locator.expects_inline_qos(),
            &self.metrics,
        );
        run_push(&mut state.push, state.locator.changes_mut(), &mut outbox);
        outbox.finish(None, vec![*locator])
    }

    fn repair_reader(&mut self, reader_guid: &Guid) -> Option<Effect> {
        let matched = self.readers.get_mut(reader_guid)?;
        let mut outbox = Outbox::new(
            &self.cache,
            self.guid,
            reader_guid.entity_id,
            true,
            matched.proxy.expects_inline_qos(),
            &self.metrics,
        )
        .retransmit();
        run_repair(&mut matched.repair, matched.proxy.changes_mut(), &mut outbox);
        outbox.finish(Some(reader_guid.prefix), matched.proxy.locators().to_vec())
    }

    fn repair_locator(&mut self, locator: &Locator) -> Option<Effect> {
        let state = self.locators.get_mut(locator)?;
        let mut outbox = Outbox::new(
            &self.cache,
            self.guid,
            ENTITYID_UNKNOWN,
            true,
            state.locator.expects_inline_qos(),
            &self.metrics,
        )
        .retransmit();
        run_repair(&mut state.repair, state.locator.changes_mut(), &mut outbox);
        outbox.finish(None, vec![*locator])
    }

    /// Announce the available range. `liveliness` forces a final
    /// liveliness heartbeat to every reader regardless of ack state.
    fn heartbeat_effects(&mut self, liveliness: bool) -> Vec<Effect> {
        if !self.config.is_reliable() && !liveliness {
            return Vec::new();
        }
        let last = self.seq_gen.last();
        let first = self.cache.seq_num_min().unwrap_or_else(|| last.next());
        let mut effects = Vec::new();

        if self.config.stateful {
            let guids: Vec<Guid> = self.readers.keys().copied().collect();
            for reader_guid in guids {
                let Some(matched) = self.readers.get_mut(&reader_guid) else {
                    continue;
                };
                let (announce, action) =
                    announce_transition(matched.announce, AnnounceEvent::AfterHeartbeat);
                matched.announce = announce;
                if action != AnnounceAction::SendHeartbeat && !liveliness {
                    continue;
                }
                let locators = matched.proxy.locators().to_vec();
                let hb = self.heartbeat(reader_guid.entity_id, first, last, liveliness);
                effects.push(Effect::Send {
                    dst_prefix: Some(reader_guid.prefix),
                    locators,
                    submessages: vec![hb],
                });
            }
        } else if !self.locators.is_empty() {
            let event = if self.cache.is_empty() {
                AnnounceEvent::UnackedChangesEmpty
            } else {
                AnnounceEvent::UnackedChanges
            };
            self.announce = announce_transition(self.announce, event).0;
            let (announce, action) =
                announce_transition(self.announce, AnnounceEvent::AfterHeartbeat);
            self.announce = announce;
            if action == AnnounceAction::SendHeartbeat || liveliness {
                let locators: Vec<Locator> = self.locators.keys().copied().collect();
                let hb = self.heartbeat(ENTITYID_UNKNOWN, first, last, liveliness);
                effects.push(Effect::Send {
                    dst_prefix: None,
                    locators,
                    submessages: vec![hb],
                });
            }
        }
        effects
    }

    fn heartbeat(
        &mut self,
        reader_id: EntityId,
        first: SequenceNumber,
        last: SequenceNumber,
        liveliness: bool,
    ) -> Submessage {
        self.heartbeat_count = self.heartbeat_count.wrapping_add(1);
        self.metrics.increment_heartbeats_sent(1);
        log::trace!(
            "[writer] {} HEARTBEAT [{}, {}] count={}",
            self.guid,
            first,
            last,
            self.heartbeat_count
        );
        Submessage::Heartbeat(HeartbeatSubmessage {
            reader_id,
            writer_id: self.guid.entity_id,
            first_sn: first,
            last_sn: last,
            count: self.heartbeat_count,
            final_flag: liveliness,
            liveliness_flag: liveliness,
        })
    }
}

/// Push region loop: send every unsent change, then fall back to idle.
fn run_push(state: &mut PushState, changes: &mut ChangesForReader, outbox: &mut Outbox<'_>) {
    if changes.has_unsent() {
        *state = push_transition(*state, PushEvent::UnsentChanges).0;
    }
    loop {
        let (next, action) = push_transition(*state, PushEvent::CanSend);
        *state = next;
        if action != PushAction::SendNextUnsent {
            break;
        }
        match changes.pop_next_unsent() {
            Some(change) => outbox.stage(change),
            None => {
                *state = push_transition(*state, PushEvent::UnsentChangesEmpty).0;
                break;
            }
        }
    }
}

/// Repair region loop: answer every requested change, then wait again.
fn run_repair(state: &mut RepairState, changes: &mut ChangesForReader, outbox: &mut Outbox<'_>) {
    loop {
        let (next, action) = repair_transition(*state, RepairEvent::CanSend);
        *state = next;
        if action != RepairAction::SendNextRequested {
            break;
        }
        match changes.pop_next_requested() {
            Some(change) => outbox.stage(change),
            None => {
                *state = repair_transition(*state, RepairEvent::RequestedChangesEmpty).0;
                break;
            }
        }
    }
}

/// Collects the submessages one push or repair burst produces for a single
/// destination: Data for changes still cached and relevant, Gap otherwise.
struct Outbox<'a> {
    cache: &'a HistoryCache,
    writer_guid: Guid,
    reader_id: EntityId,
    reliable: bool,
    expects_inline_qos: bool,
    retransmit: bool,
    metrics: &'a ReliableMetrics,
    submessages: Vec<Submessage>,
    gaps: Vec<SequenceNumber>,
}

impl<'a> Outbox<'a> {
    fn new(
        cache: &'a HistoryCache,
        writer_guid: Guid,
        reader_id: EntityId,
        reliable: bool,
        expects_inline_qos: bool,
        metrics: &'a ReliableMetrics,
    ) -> Self {
        Self {
            cache,
            writer_guid,
            reader_id,
            reliable,
            expects_inline_qos,
            retransmit: false,
            metrics,
            submessages: Vec::new(),
            gaps: Vec::new(),
        }
    }

    fn retransmit(mut self) -> Self {
        self.retransmit = true;
        self
    }

    fn stage(&mut self, change: ChangeForReader) {
        let seq = change.sequence_number;
        let cached = self
            .cache
            .get_change(&self.writer_guid, seq)
            .filter(|_| change.is_relevant);
        match cached {
            Some(cached) => {
                if let Some(ts) = cached.source_timestamp() {
                    self.submessages.push(Submessage::InfoTimestamp(InfoTimestamp {
                        timestamp: Some(ts),
                    }));
                }
                self.submessages.push(Submessage::Data(self.data(cached)));
                if self.retransmit {
                    self.metrics.increment_retransmit_sent(1);
                } else {
                    self.metrics.increment_data_sent(1);
                }
            }
            // Best-effort never repairs, so nothing replaces a vanished change
            None if self.reliable => self.gaps.push(seq),
            None => {}
        }
    }

    fn data(&self, change: &CacheChange) -> DataSubmessage {
        let inline_qos = if self.expects_inline_qos || !change.inline_qos().is_empty() {
            Some(change.inline_qos().clone())
        } else {
            None
        };
        DataSubmessage {
            reader_id: self.reader_id,
            writer_id: self.writer_guid.entity_id,
            writer_sn: change.sequence_number(),
            inline_qos,
            serialized_payload: change.data_arc(),
            data_flag: change.kind() == ChangeKind::Alive,
            key_flag: false,
        }
    }

    fn finish(mut self, dst_prefix: Option<GuidPrefix>, locators: Vec<Locator>) -> Option<Effect> {
        if !self.gaps.is_empty() {
            let gaps = GapSubmessage::batch(self.reader_id, self.writer_guid.entity_id, &self.gaps);
            self.metrics.increment_gaps_sent(gaps.len() as u64);
            log::trace!(
                "[writer] {} GAP {:?} to {:?}",
                self.writer_guid,
                self.gaps,
                dst_prefix
            );
            self.submessages.extend(gaps.into_iter().map(Submessage::Gap));
        }
        if self.submessages.is_empty() {
            return None;
        }
        Some(Effect::Send {
            dst_prefix,
            locators,
            submessages: self.submessages,
        })
    }
}

/// AckNack acknowledging everything below `base` with no requests.
pub fn positive_acknack(
    reader_id: EntityId,
    writer_id: EntityId,
    base: SequenceNumber,
    count: i32,
) -> AckNackSubmessage {
    AckNackSubmessage {
        reader_id,
        writer_id,
        reader_sn_state: SequenceNumberSet::empty(base),
        count,
        final_flag: true,
    }
}
