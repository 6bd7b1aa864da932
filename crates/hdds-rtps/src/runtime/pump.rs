// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-threaded event pump: incoming datagrams and due timers for one
//! participant, interleaved on the calling thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError};

use super::participant::Participant;
use super::transport::Datagram;
use crate::{Error, Result};

/// Drives one participant from its inbox and its timer queue.
#[derive(Debug)]
pub struct EventPump {
    participant: Arc<Participant>,
    inbox: Receiver<Datagram>,
}

/// What one pump step did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub datagrams: usize,
    pub timers: usize,
}

impl PumpStats {
    pub fn is_idle(&self) -> bool {
        self.datagrams == 0 && self.timers == 0
    }
}

impl EventPump {
    pub fn new(participant: Arc<Participant>, inbox: Receiver<Datagram>) -> Self {
        Self { participant, inbox }
    }

    pub fn participant(&self) -> &Arc<Participant> {
        &self.participant
    }

    /// Fire due timers, then wait up to `max_wait` (capped at the next timer
    /// deadline) for one datagram.
    pub fn run_once(&self, max_wait: Duration) -> Result<PumpStats> {
        let now = Instant::now();
        let mut stats = PumpStats {
            timers: self.participant.fire_due_timers(now)?,
            ..PumpStats::default()
        };
        let wait = match self.participant.next_timer_deadline() {
            Some(deadline) => deadline.saturating_duration_since(now).min(max_wait),
            None => max_wait,
        };
        match self.inbox.recv_timeout(wait) {
            Ok(datagram) => {
                self.handle(&datagram);
                stats.datagrams += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::PreconditionViolated("pump inbox disconnected".to_string()));
            }
        }
        Ok(stats)
    }

    /// Handle everything already queued and every timer due at `now`,
    /// without blocking.
    pub fn drain_at(&self, now: Instant) -> Result<PumpStats> {
        let mut stats = PumpStats {
            timers: self.participant.fire_due_timers(now)?,
            ..PumpStats::default()
        };
        for datagram in self.inbox.try_iter() {
            self.handle_at(&datagram, now);
            stats.datagrams += 1;
        }
        Ok(stats)
    }

    /// Pump until `done` holds; `Timeout` once `limit` has elapsed.
    pub fn run_until<F>(&self, limit: Duration, mut done: F) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        let end = Instant::now() + limit;
        loop {
            if done() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= end {
                log::debug!("[pump] gave up after {:?}", limit);
                return Err(Error::Timeout);
            }
            self.run_once(end - now)?;
        }
    }

    fn handle(&self, datagram: &Datagram) {
        self.handle_at(datagram, Instant::now());
    }

    fn handle_at(&self, datagram: &Datagram, now: Instant) {
        // A bad packet is the sender's problem, never the pump's
        if let Err(e) = self
            .participant
            .receive_at(&datagram.message, Some(datagram.source), now)
        {
            log::warn!("[pump] rejected message from {}: {}", datagram.source, e);
        }
    }
}
