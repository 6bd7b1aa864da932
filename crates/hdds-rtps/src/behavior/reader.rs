// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader endpoint behaviour.
//!
//! One type covers the three supported variants, chosen by [`ReaderConfig`]:
//! best-effort stateless, best-effort stateful and reliable stateful.
//! Reliable stateless readers are refused at construction.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use super::effect::{Effect, TimerKey, TimerKind};
use super::reader_fsm::{
    ack_transition, reader_transition, AckAction, AckEvent, AckState, ReaderAction, ReaderEvent,
    ReaderPhase,
};
use crate::config::ReaderConfig;
use crate::history_cache::HistoryCache;
use crate::messages::{
    AckNackSubmessage, DataSubmessage, GapSubmessage, HeartbeatSubmessage, ReceiverContext,
    Submessage,
};
use crate::metrics::ReliableMetrics;
use crate::proxy::{ChangeFromWriterStatus, DataDisposition, WriterProxy};
use crate::types::{CacheChange, ChangeKind, Guid, InstanceHandle, Locator, HANDLE_NIL};
use crate::{Error, Result};

/// Submessage delivered to a reader.
#[derive(Debug, Clone, Copy)]
pub enum ReaderInput<'a> {
    Data(&'a DataSubmessage),
    Heartbeat(&'a HeartbeatSubmessage),
    Gap(&'a GapSubmessage),
}

#[derive(Debug)]
struct MatchedWriter {
    proxy: WriterProxy,
    ack: AckState,
    last_acknack: Option<Instant>,
    /// Reply locators learned from the last heartbeat's receiver context.
    reply_locators: Vec<Locator>,
}

/// Reader endpoint: cache, matched writers and state machines.
#[derive(Debug)]
pub struct Reader {
    guid: Guid,
    config: ReaderConfig,
    cache: HistoryCache,
    phase: ReaderPhase,
    writers: BTreeMap<Guid, MatchedWriter>,
    /// Stateless readers only: empty accepts every writer.
    accepted_writers: BTreeSet<Guid>,
    metrics: Arc<ReliableMetrics>,
}

impl Reader {
    pub fn new(guid: Guid, config: ReaderConfig, metrics: Arc<ReliableMetrics>) -> Result<Self> {
        if !guid.entity_id.is_reader() {
            return Err(Error::PreconditionViolated(format!(
                "{} is not a reader entity",
                guid
            )));
        }
        config.validate()?;
        let (phase, _) =
            reader_transition(config.is_reliable(), ReaderPhase::Initial, ReaderEvent::Created);
        log::debug!(
            "[reader] created {} reliable={} stateful={}",
            guid,
            config.is_reliable(),
            config.stateful
        );
        Ok(Self {
            guid,
            cache: HistoryCache::with_history(config.history),
            config,
            phase,
            writers: BTreeMap::new(),
            accepted_writers: BTreeSet::new(),
            metrics,
        })
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn phase(&self) -> ReaderPhase {
        self.phase
    }

    pub fn cache(&self) -> &HistoryCache {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    pub fn matched_writer_add(&mut self, proxy: WriterProxy) -> Result<()> {
        if !self.config.stateful {
            return Err(Error::PreconditionViolated(
                "stateless reader keeps no writer proxies".to_string(),
            ));
        }
        if self.phase == ReaderPhase::Final {
            return Err(Error::PreconditionViolated(format!(
                "reader {} is deleted",
                self.guid
            )));
        }
        let writer_guid = proxy.remote_writer_guid();
        if self.writers.contains_key(&writer_guid) {
            return Err(Error::PreconditionViolated(format!(
                "writer {} already matched",
                writer_guid
            )));
        }
        log::debug!("[reader] {} matched writer {}", self.guid, writer_guid);
        self.writers.insert(
            writer_guid,
            MatchedWriter {
                proxy,
                ack: AckState::Waiting,
                last_acknack: None,
                reply_locators: Vec::new(),
            },
        );
        Ok(())
    }

    /// Unmatch a writer; its pending response timer is disarmed.
    pub fn matched_writer_remove(&mut self, writer_guid: &Guid) -> Result<Vec<Effect>> {
        self.writers
            .remove(writer_guid)
            .ok_or(Error::UnknownEndpoint(*writer_guid))?;
        log::debug!("[reader] {} unmatched writer {}", self.guid, writer_guid);
        Ok(vec![Effect::DisarmTimer(TimerKey::new(
            self.guid,
            TimerKind::HeartbeatResponse(*writer_guid),
        ))])
    }

    pub fn matched_writer(&self, writer_guid: &Guid) -> Option<&WriterProxy> {
        self.writers.get(writer_guid).map(|m| &m.proxy)
    }

    pub fn matched_writers(&self) -> impl Iterator<Item = &WriterProxy> {
        self.writers.values().map(|m| &m.proxy)
    }

    /// Restrict a stateless reader to the listed writers.
    pub fn accept_writer(&mut self, writer_guid: Guid) {
        self.accepted_writers.insert(writer_guid);
    }

    /// Whether submessages from `writer_guid` concern this reader.
    pub fn is_interested_in(&self, writer_guid: &Guid) -> bool {
        if self.config.stateful {
            self.writers.contains_key(writer_guid)
        } else {
            self.accepted_writers.is_empty() || self.accepted_writers.contains(writer_guid)
        }
    }

    // ------------------------------------------------------------------
    // Protocol events
    // ------------------------------------------------------------------

    pub fn process_event(
        &mut self,
        input: ReaderInput<'_>,
        context: &ReceiverContext,
        now: Instant,
    ) -> Result<Vec<Effect>> {
        match input {
            ReaderInput::Data(data) => self.on_data(data, context, now),
            ReaderInput::Heartbeat(hb) => self.on_heartbeat(hb, context, now),
            ReaderInput::Gap(gap) => self.on_gap(gap, context, now),
        }
    }

    /// Apply a Data. Old, duplicate and out-of-window data is dropped
    /// silently; data from an unmatched writer is `UnknownEndpoint`.
    pub fn on_data(
        &mut self,
        data: &DataSubmessage,
        context: &ReceiverContext,
        now: Instant,
    ) -> Result<Vec<Effect>> {
        let writer_guid = Guid::new(context.source_guid_prefix, data.writer_id);
        if !self.step_lifecycle(ReaderEvent::DataReceived, ReaderAction::AcceptData) {
            return Ok(Vec::new());
        }
        let seq = data.writer_sn;
        let mut effects = Vec::new();

        if self.config.stateful {
            let matched = self
                .writers
                .get_mut(&writer_guid)
                .ok_or(Error::UnknownEndpoint(writer_guid))?;
            if self.config.is_reliable() {
                match matched.proxy.on_data_received(seq) {
                    DataDisposition::Accepted => {}
                    disposition => {
                        log::trace!(
                            "[reader] {} dropped {:?} seq={} from {}",
                            self.guid,
                            disposition,
                            seq,
                            writer_guid
                        );
                        self.metrics.increment_stale(1);
                        return Ok(Vec::new());
                    }
                }
            } else {
                if matched.proxy.status(seq) == ChangeFromWriterStatus::Received {
                    self.metrics.increment_stale(1);
                    return Ok(Vec::new());
                }
                matched.proxy.received_change_set(seq);
            }
        } else if !self.is_interested_in(&writer_guid) {
            return Err(Error::UnknownEndpoint(writer_guid));
        }

        self.insert(build_change(data, writer_guid, context))?;

        if self.config.is_reliable() {
            self.recheck_missing(writer_guid, now, &mut effects);
        }
        Ok(effects)
    }

    /// Apply a Heartbeat: update missing/lost, then the ack obligation.
    pub fn on_heartbeat(
        &mut self,
        hb: &HeartbeatSubmessage,
        context: &ReceiverContext,
        now: Instant,
    ) -> Result<Vec<Effect>> {
        let writer_guid = Guid::new(context.source_guid_prefix, hb.writer_id);
        if !self.step_lifecycle(ReaderEvent::HeartbeatReceived, ReaderAction::ApplyHeartbeat) {
            return Ok(Vec::new());
        }
        let suppression = self.config.heartbeat_suppression_duration;
        let matched = self
            .writers
            .get_mut(&writer_guid)
            .ok_or(Error::UnknownEndpoint(writer_guid))?;

        if !matched.proxy.accept_heartbeat_count(hb.count) {
            log::trace!(
                "[reader] {} stale heartbeat count={} from {}",
                self.guid,
                hb.count,
                writer_guid
            );
            self.metrics.increment_stale(1);
            return Ok(Vec::new());
        }
        if !context.unicast_reply_locators.is_empty() {
            matched.reply_locators = context.unicast_reply_locators.clone();
        }
        matched.proxy.on_heartbeat(hb.first_sn, hb.last_sn);
        log::trace!(
            "[reader] {} heartbeat [{}, {}] from {} final={}",
            self.guid,
            hb.first_sn,
            hb.last_sn,
            writer_guid,
            hb.final_flag
        );

        let suppressed = !suppression.is_zero()
            && matched
                .last_acknack
                .is_some_and(|at| now.saturating_duration_since(at) < suppression);
        if suppressed {
            return Ok(Vec::new());
        }

        let mut effects = Vec::new();
        self.step_ack(
            writer_guid,
            AckEvent::HeartbeatReceived {
                final_flag: hb.final_flag,
                liveliness_flag: hb.liveliness_flag,
            },
            now,
            &mut effects,
        );
        self.recheck_missing(writer_guid, now, &mut effects);
        Ok(effects)
    }

    /// Apply a Gap: named numbers become received-but-irrelevant.
    pub fn on_gap(
        &mut self,
        gap: &GapSubmessage,
        context: &ReceiverContext,
        now: Instant,
    ) -> Result<Vec<Effect>> {
        let writer_guid = Guid::new(context.source_guid_prefix, gap.writer_id);
        if !self.step_lifecycle(ReaderEvent::GapReceived, ReaderAction::ApplyGap) {
            return Ok(Vec::new());
        }
        let matched = self
            .writers
            .get_mut(&writer_guid)
            .ok_or(Error::UnknownEndpoint(writer_guid))?;
        matched.proxy.on_gap(gap.gap_start, &gap.gap_list);
        self.metrics.increment_gaps_received(1);

        let mut effects = Vec::new();
        self.recheck_missing(writer_guid, now, &mut effects);
        Ok(effects)
    }

    /// Timer expiry. A timer naming an unmatched writer is stale and ignored.
    pub fn on_timer(&mut self, kind: TimerKind, now: Instant) -> Result<Vec<Effect>> {
        let mut effects = Vec::new();
        if let TimerKind::HeartbeatResponse(writer_guid) = kind {
            if !self.writers.contains_key(&writer_guid) {
                log::debug!(
                    "[reader] {} stale response timer for {}",
                    self.guid,
                    writer_guid
                );
                self.metrics.increment_stale(1);
                return Ok(effects);
            }
            self.step_ack(writer_guid, AckEvent::ResponseDelayElapsed, now, &mut effects);
        }
        Ok(effects)
    }

    /// Drive to `final`: every writer is unmatched and its timer disarmed.
    pub fn delete(&mut self) -> Vec<Effect> {
        let (phase, action) =
            reader_transition(self.config.is_reliable(), self.phase, ReaderEvent::Deleted);
        self.phase = phase;
        if action != ReaderAction::Release {
            return Vec::new();
        }
        log::debug!("[reader] {} deleted", self.guid);
        let reader = self.guid;
        std::mem::take(&mut self.writers)
            .into_keys()
            .map(|w| Effect::DisarmTimer(TimerKey::new(reader, TimerKind::HeartbeatResponse(w))))
            .collect()
    }

    // ------------------------------------------------------------------
    // Application access
    // ------------------------------------------------------------------

    /// Remove and return the oldest change; `NoData` when empty.
    pub fn take(&mut self) -> Result<CacheChange> {
        self.cache.take_first()
    }

    pub fn take_all(&mut self) -> Vec<CacheChange> {
        std::iter::from_fn(|| self.cache.take_first().ok()).collect()
    }

    /// Copies of every cached change, leaving them in place.
    pub fn read(&self) -> Result<Vec<CacheChange>> {
        if self.cache.is_empty() {
            return Err(Error::NoData);
        }
        Ok(self.cache.iter().cloned().collect())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn step_lifecycle(&mut self, event: ReaderEvent, wanted: ReaderAction) -> bool {
        let (phase, action) = reader_transition(self.config.is_reliable(), self.phase, event);
        self.phase = phase;
        action == wanted
    }

    fn insert(&mut self, change: CacheChange) -> Result<()> {
        match self.cache.add_change(change) {
            Ok(evicted) => {
                if let Some(evicted) = evicted {
                    log::trace!(
                        "[reader] {} history full, dropped seq={}",
                        self.guid,
                        evicted.sequence_number()
                    );
                }
                self.metrics.increment_data_received(1);
                Ok(())
            }
            // Stateless readers keep no proxy, so a resent change can hit the cache twice
            Err(Error::PreconditionViolated(msg)) if !self.config.stateful => {
                log::trace!("[reader] {} ignored duplicate: {}", self.guid, msg);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn recheck_missing(&mut self, writer_guid: Guid, now: Instant, effects: &mut Vec<Effect>) {
        let has_missing = self
            .writers
            .get(&writer_guid)
            .is_some_and(|m| m.proxy.has_missing_changes());
        self.step_ack(writer_guid, AckEvent::MissingChecked { has_missing }, now, effects);
    }

    fn step_ack(
        &mut self,
        writer_guid: Guid,
        event: AckEvent,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let Some(matched) = self.writers.get_mut(&writer_guid) else {
            return;
        };
        let (next, action) = ack_transition(matched.ack, event);
        matched.ack = next;
        let key = TimerKey::new(self.guid, TimerKind::HeartbeatResponse(writer_guid));
        match action {
            AckAction::None => {}
            AckAction::ArmResponseTimer => {
                effects.push(Effect::arm_once(key, self.config.heartbeat_response_delay));
            }
            AckAction::DisarmResponseTimer => effects.push(Effect::DisarmTimer(key)),
            AckAction::SendAckNack => {
                effects.push(build_acknack(self.guid, writer_guid, matched, &self.metrics, now));
            }
        }
    }
}

fn build_change(data: &DataSubmessage, writer_guid: Guid, context: &ReceiverContext) -> CacheChange {
    let inline_qos = data.inline_qos.clone().unwrap_or_default();
    let kind = inline_qos
        .status_info()
        .map_or(ChangeKind::Alive, ChangeKind::from_status_info);
    let handle = inline_qos.key_hash().map_or(HANDLE_NIL, InstanceHandle);
    let change = CacheChange::new(
        kind,
        writer_guid,
        handle,
        data.writer_sn,
        Arc::clone(&data.serialized_payload),
    )
    .with_inline_qos(inline_qos);
    match context.timestamp {
        Some(ts) => change.with_source_timestamp(ts),
        None => change,
    }
}

fn build_acknack(
    reader_guid: Guid,
    writer_guid: Guid,
    matched: &mut MatchedWriter,
    metrics: &ReliableMetrics,
    now: Instant,
) -> Effect {
    let state = matched.proxy.reader_sn_state();
    let missing = state.len();
    let count = matched.proxy.next_acknack_count();
    matched.last_acknack = Some(now);
    metrics.increment_acknacks_sent(1);
    metrics.record_missing(missing as u64);
    log::debug!(
        "[reader] {} ACKNACK to {} base={} missing={} count={}",
        reader_guid,
        writer_guid,
        state.base(),
        missing,
        count
    );

    let locators = if matched.proxy.reply_locators().is_empty() {
        matched.reply_locators.clone()
    } else {
        matched.proxy.reply_locators().to_vec()
    };
    Effect::Send {
        dst_prefix: Some(writer_guid.prefix),
        locators,
        submessages: vec![Submessage::AckNack(AckNackSubmessage {
            reader_id: reader_guid.entity_id,
            writer_id: writer_guid.entity_id,
            reader_sn_state: state,
            count,
            final_flag: missing == 0,
        })],
    }
}
