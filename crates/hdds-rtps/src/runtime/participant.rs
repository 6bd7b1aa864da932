// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant: endpoint registry, submessage routing, effect execution.
//!
//! Every endpoint sits behind its own `parking_lot::Mutex`, so events for
//! one endpoint are applied one at a time while different endpoints stay
//! independent. Effects are collected under the endpoint lock and carried
//! out after it is released.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::timer::TimerQueue;
use super::transport::Transport;
use crate::behavior::{Effect, Endpoint, Reader, TimerKey, Writer};
use crate::config::{ReaderConfig, TopicKind, WriterConfig};
use crate::messages::{
    InfoDestination, Message, MessageReceiver, ReceiveSummary, ReceiverContext, Submessage,
};
use crate::metrics::ReliableMetrics;
use crate::proxy::{ReaderProxy, WriterProxy};
use crate::types::{
    entity_kind, CacheChange, EntityId, Guid, GuidPrefix, InstanceHandle, Locator, SequenceNumber,
};
use crate::{Error, Result};

type SharedEndpoint = Arc<Mutex<Endpoint>>;

/// Local RTPS participant.
pub struct Participant {
    guid_prefix: GuidPrefix,
    endpoints: DashMap<Guid, SharedEndpoint>,
    timers: Mutex<TimerQueue>,
    transport: Arc<dyn Transport>,
    receiver: MessageReceiver,
    metrics: Arc<ReliableMetrics>,
    next_entity_key: AtomicU32,
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("guid_prefix", &self.guid_prefix)
            .field("endpoints", &self.endpoints.len())
            .field("timers", &self.timers.lock().len())
            .finish()
    }
}

impl Participant {
    pub fn new(guid_prefix: GuidPrefix, transport: Arc<dyn Transport>) -> Self {
        Self {
            guid_prefix,
            endpoints: DashMap::new(),
            timers: Mutex::new(TimerQueue::new()),
            transport,
            receiver: MessageReceiver::new(guid_prefix),
            metrics: Arc::new(ReliableMetrics::new()),
            next_entity_key: AtomicU32::new(0),
        }
    }

    pub fn guid_prefix(&self) -> GuidPrefix {
        self.guid_prefix
    }

    pub fn metrics(&self) -> &Arc<ReliableMetrics> {
        &self.metrics
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    fn allocate_entity_id(&self, kind: u8) -> EntityId {
        let key = self.next_entity_key.fetch_add(1, Ordering::Relaxed) + 1;
        let [_, k0, k1, k2] = key.to_be_bytes();
        EntityId::new([k0, k1, k2], kind)
    }

    // ------------------------------------------------------------------
    // Endpoint lifecycle
    // ------------------------------------------------------------------

    pub fn create_writer(&self, config: WriterConfig, topic_kind: TopicKind) -> Result<Guid> {
        let kind = match topic_kind {
            TopicKind::WithKey => entity_kind::USER_WRITER_WITH_KEY,
            TopicKind::NoKey => entity_kind::USER_WRITER_NO_KEY,
        };
        let guid = Guid::new(self.guid_prefix, self.allocate_entity_id(kind));
        let writer = Writer::new(guid, config, Arc::clone(&self.metrics))?;
        let effects = writer.start();
        self.endpoints
            .insert(guid, Arc::new(Mutex::new(Endpoint::Writer(writer))));
        self.dispatch(effects, Instant::now())?;
        Ok(guid)
    }

    pub fn create_reader(&self, config: ReaderConfig, topic_kind: TopicKind) -> Result<Guid> {
        let kind = match topic_kind {
            TopicKind::WithKey => entity_kind::USER_READER_WITH_KEY,
            TopicKind::NoKey => entity_kind::USER_READER_NO_KEY,
        };
        let guid = Guid::new(self.guid_prefix, self.allocate_entity_id(kind));
        let reader = Reader::new(guid, config, Arc::clone(&self.metrics))?;
        self.endpoints
            .insert(guid, Arc::new(Mutex::new(Endpoint::Reader(reader))));
        Ok(guid)
    }

    /// Drive the endpoint to `final`, disarm its timers and forget it.
    pub fn delete_endpoint(&self, guid: &Guid) -> Result<()> {
        let (_, endpoint) = self
            .endpoints
            .remove(guid)
            .ok_or(Error::UnknownEndpoint(*guid))?;
        let effects = endpoint.lock().delete();
        self.dispatch(effects, Instant::now())?;
        self.timers.lock().disarm_endpoint(guid);
        log::debug!("[participant] deleted endpoint {}", guid);
        Ok(())
    }

    fn endpoint(&self, guid: &Guid) -> Result<SharedEndpoint> {
        self.endpoints
            .get(guid)
            .map(|e| Arc::clone(e.value()))
            .ok_or(Error::UnknownEndpoint(*guid))
    }

    fn with_writer<T>(&self, guid: &Guid, f: impl FnOnce(&mut Writer) -> Result<T>) -> Result<T> {
        let endpoint = self.endpoint(guid)?;
        let mut guard = endpoint.lock();
        let writer = guard
            .as_writer_mut()
            .ok_or_else(|| Error::PreconditionViolated(format!("{} is not a writer", guid)))?;
        f(writer)
    }

    fn with_reader<T>(&self, guid: &Guid, f: impl FnOnce(&mut Reader) -> Result<T>) -> Result<T> {
        let endpoint = self.endpoint(guid)?;
        let mut guard = endpoint.lock();
        let reader = guard
            .as_reader_mut()
            .ok_or_else(|| Error::PreconditionViolated(format!("{} is not a reader", guid)))?;
        f(reader)
    }

    /// Run `f` on a writer and execute the effects it returns.
    fn drive_writer(
        &self,
        guid: &Guid,
        f: impl FnOnce(&mut Writer) -> Result<Vec<Effect>>,
    ) -> Result<()> {
        let effects = self.with_writer(guid, f)?;
        self.dispatch(effects, Instant::now())
    }

    /// Read-only access to a writer.
    pub fn inspect_writer<T>(&self, guid: &Guid, f: impl FnOnce(&Writer) -> T) -> Result<T> {
        self.with_writer(guid, |w| Ok(f(w)))
    }

    /// Read-only access to a reader.
    pub fn inspect_reader<T>(&self, guid: &Guid, f: impl FnOnce(&Reader) -> T) -> Result<T> {
        self.with_reader(guid, |r| Ok(f(r)))
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    pub fn matched_reader_add(&self, writer: &Guid, proxy: ReaderProxy) -> Result<()> {
        self.drive_writer(writer, |w| w.matched_reader_add(proxy))
    }

    pub fn matched_reader_remove(&self, writer: &Guid, reader: &Guid) -> Result<()> {
        self.drive_writer(writer, |w| w.matched_reader_remove(reader))
    }

    pub fn reader_locator_add(
        &self,
        writer: &Guid,
        locator: Locator,
        expects_inline_qos: bool,
    ) -> Result<()> {
        self.drive_writer(writer, |w| w.reader_locator_add(locator, expects_inline_qos))
    }

    pub fn reader_locator_remove(&self, writer: &Guid, locator: &Locator) -> Result<()> {
        self.drive_writer(writer, |w| w.reader_locator_remove(locator))
    }

    pub fn matched_writer_add(&self, reader: &Guid, proxy: WriterProxy) -> Result<()> {
        self.with_reader(reader, |r| r.matched_writer_add(proxy))
    }

    pub fn matched_writer_remove(&self, reader: &Guid, writer: &Guid) -> Result<()> {
        let effects = self.with_reader(reader, |r| r.matched_writer_remove(writer))?;
        self.dispatch(effects, Instant::now())
    }

    /// Restrict a stateless reader to the given writer.
    pub fn accept_writer(&self, reader: &Guid, writer: Guid) -> Result<()> {
        self.with_reader(reader, |r| {
            r.accept_writer(writer);
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Data path
    // ------------------------------------------------------------------

    pub fn write(
        &self,
        writer: &Guid,
        data: impl Into<Arc<[u8]>>,
        handle: InstanceHandle,
    ) -> Result<SequenceNumber> {
        let (seq, effects) = self.with_writer(writer, |w| w.write(data, handle))?;
        self.dispatch(effects, Instant::now())?;
        Ok(seq)
    }

    pub fn dispose(&self, writer: &Guid, handle: InstanceHandle) -> Result<SequenceNumber> {
        let (seq, effects) = self.with_writer(writer, |w| w.dispose(handle))?;
        self.dispatch(effects, Instant::now())?;
        Ok(seq)
    }

    pub fn unregister(&self, writer: &Guid, handle: InstanceHandle) -> Result<SequenceNumber> {
        let (seq, effects) = self.with_writer(writer, |w| w.unregister(handle))?;
        self.dispatch(effects, Instant::now())?;
        Ok(seq)
    }

    pub fn remove_change(&self, writer: &Guid, seq: SequenceNumber) -> Result<CacheChange> {
        self.with_writer(writer, |w| w.remove_change(seq))
    }

    pub fn assert_liveliness(&self, writer: &Guid) -> Result<()> {
        self.drive_writer(writer, |w| Ok(w.assert_liveliness()))
    }

    /// Push anything still unsent.
    pub fn flush(&self, writer: &Guid) -> Result<()> {
        self.drive_writer(writer, |w| Ok(w.flush()))
    }

    pub fn take(&self, reader: &Guid) -> Result<CacheChange> {
        self.with_reader(reader, |r| r.take())
    }

    pub fn take_all(&self, reader: &Guid) -> Result<Vec<CacheChange>> {
        self.with_reader(reader, |r| Ok(r.take_all()))
    }

    pub fn read(&self, reader: &Guid) -> Result<Vec<CacheChange>> {
        self.with_reader(reader, |r| r.read())
    }

    // ------------------------------------------------------------------
    // Incoming
    // ------------------------------------------------------------------

    pub fn receive(&self, message: &Message, source: Option<Locator>) -> Result<ReceiveSummary> {
        self.receive_at(message, source, Instant::now())
    }

    /// Route every entity submessage of `message` to its endpoint(s), then
    /// execute the resulting effects with `now` as the timer base.
    pub fn receive_at(
        &self,
        message: &Message,
        source: Option<Locator>,
        now: Instant,
    ) -> Result<ReceiveSummary> {
        let mut effects = Vec::new();
        let summary = self.receiver.process(message, source, |context, submessage| {
            effects.extend(self.route(context, submessage, now)?);
            Ok(())
        })?;
        log::trace!(
            "[participant] {:?} from {:?}: {:?}",
            self.guid_prefix,
            message.header.guid_prefix,
            summary
        );
        self.dispatch(effects, now)?;
        Ok(summary)
    }

    fn route(
        &self,
        context: &ReceiverContext,
        submessage: &Submessage,
        now: Instant,
    ) -> Result<Vec<Effect>> {
        let (reader_id, writer_id) = submessage.entity_ids().ok_or_else(|| {
            Error::PacketInvalid(format!("{} carries no entity ids", submessage.name()))
        })?;

        match submessage {
            Submessage::AckNack(_) => {
                let writer = Guid::new(self.guid_prefix, writer_id);
                self.deliver_to(&writer, context, submessage, now)
            }
            Submessage::DataFrag(_) => Err(Error::NotYetImplemented("DATA_FRAG reassembly")),
            _ if reader_id.is_unknown() => {
                let writer = Guid::new(context.source_guid_prefix, writer_id);
                self.fan_out(&writer, context, submessage, now)
            }
            _ => {
                let reader = Guid::new(self.guid_prefix, reader_id);
                self.deliver_to(&reader, context, submessage, now)
            }
        }
    }

    fn deliver_to(
        &self,
        guid: &Guid,
        context: &ReceiverContext,
        submessage: &Submessage,
        now: Instant,
    ) -> Result<Vec<Effect>> {
        let endpoint = self.endpoint(guid)?;
        let effects = endpoint.lock().handle(submessage, context, now);
        effects
    }

    /// Deliver a submessage addressed to `ENTITYID_UNKNOWN` to every local
    /// reader matched with, or accepting from, `writer`.
    fn fan_out(
        &self,
        writer: &Guid,
        context: &ReceiverContext,
        submessage: &Submessage,
        now: Instant,
    ) -> Result<Vec<Effect>> {
        let readers: Vec<SharedEndpoint> = self
            .endpoints
            .iter()
            .filter(|e| e.key().entity_id.is_reader())
            .map(|e| Arc::clone(e.value()))
            .collect();

        let mut effects = Vec::new();
        let mut delivered = false;
        for endpoint in readers {
            let mut guard = endpoint.lock();
            let interested = guard
                .as_reader()
                .is_some_and(|r| r.is_interested_in(writer));
            if !interested {
                continue;
            }
            match guard.handle(submessage, context, now) {
                Ok(out) => {
                    delivered = true;
                    effects.extend(out);
                }
                Err(e) => log::debug!(
                    "[participant] {} rejected {}: {}",
                    guard.guid(),
                    submessage.name(),
                    e
                ),
            }
        }
        if delivered {
            Ok(effects)
        } else {
            Err(Error::UnknownEndpoint(*writer))
        }
    }

    // ------------------------------------------------------------------
    // Timers and effects
    // ------------------------------------------------------------------

    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.timers.lock().next_deadline()
    }

    /// Fire every timer due at `now`. Returns how many fired.
    pub fn fire_due_timers(&self, now: Instant) -> Result<usize> {
        let due = self.timers.lock().pop_due(now);
        let fired = due.len();
        for key in due {
            let Ok(endpoint) = self.endpoint(&key.endpoint) else {
                log::debug!("[participant] timer for vanished endpoint {}", key.endpoint);
                continue;
            };
            let result = endpoint.lock().on_timer(key.kind, now);
            match result {
                Ok(effects) => self.dispatch(effects, now)?,
                Err(e) => log::warn!("[participant] timer {:?} failed: {}", key, e),
            }
        }
        Ok(fired)
    }

    /// Carry out effects. Every effect is attempted; the first transport
    /// error is returned.
    fn dispatch(&self, effects: Vec<Effect>, now: Instant) -> Result<()> {
        let mut first_error = None;
        for effect in effects {
            match effect {
                Effect::Send {
                    dst_prefix,
                    locators,
                    submessages,
                } => {
                    if locators.is_empty() {
                        log::warn!(
                            "[participant] no locator for {} submessages to {:?}",
                            submessages.len(),
                            dst_prefix
                        );
                        continue;
                    }
                    let mut message = Message::new(self.guid_prefix);
                    if let Some(guid_prefix) = dst_prefix {
                        message.push(Submessage::InfoDestination(InfoDestination { guid_prefix }));
                    }
                    for submessage in submessages {
                        message.push(submessage);
                    }
                    if let Err(e) = self.transport.send(&locators, &message) {
                        log::warn!("[participant] send failed: {}", e);
                        first_error.get_or_insert(e);
                    }
                }
                Effect::ArmTimer { key, after, period } => {
                    self.timers.lock().arm(key, now, after, period);
                }
                Effect::DisarmTimer(key) => {
                    self.timers.lock().disarm(&key);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn is_timer_armed(&self, key: &TimerKey) -> bool {
        self.timers.lock().is_armed(key)
    }
}
