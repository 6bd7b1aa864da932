// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS reader and writer behaviours.
//!
//! State machines are pure transition functions (`*_fsm`); the endpoint
//! types drive them against their proxies and return [`Effect`]s for the
//! runtime to execute.

mod effect;
mod reader;
mod reader_fsm;
mod writer;
mod writer_fsm;


pub use effect::{Effect, TimerKey, TimerKind};
pub use reader::{Reader, ReaderInput};
pub use reader_fsm::{
    ack_transition, reader_transition, AckAction, AckEvent, AckState, ReaderAction, ReaderEvent,
    ReaderPhase,
};
pub use writer::{positive_acknack, Writer, WriterInput};
pub use writer_fsm::{
    announce_transition, push_transition, repair_transition, AnnounceAction, AnnounceEvent,
    AnnounceState, PushAction, PushEvent, PushState, RepairAction, RepairEvent, RepairState,
};

use std::time::Instant;

use crate::messages::{ReceiverContext, Submessage};
use crate::types::Guid;
use crate::Result;

/// A local endpoint as held by the participant registry.
#[derive(Debug)]
pub enum Endpoint {
    Reader(Reader),
    Writer(Writer),
}

impl Endpoint {
    pub fn guid(&self) -> Guid {
        match self {
            Endpoint::Reader(r) => r.guid(),
            Endpoint::Writer(w) => w.guid(),
        }
    }

    pub fn as_reader(&self) -> Option<&Reader> {
        match self {
            Endpoint::Reader(r) => Some(r),
            Endpoint::Writer(_) => None,
        }
    }

    pub fn as_reader_mut(&mut self) -> Option<&mut Reader> {
        match self {
            Endpoint::Reader(r) => Some(r),
            Endpoint::Writer(_) => None,
        }
    }

    pub fn as_writer(&self) -> Option<&Writer> {
        match self {
            Endpoint::Writer(w) => Some(w),
            Endpoint::Reader(_) => None,
        }
    }

    pub fn as_writer_mut(&mut self) -> Option<&mut Writer> {
        match self {
            Endpoint::Writer(w) => Some(w),
            Endpoint::Reader(_) => None,
        }
    }

    /// Route one submessage to the matching event. Submessages the
    /// endpoint kind does not consume are ignored.
    pub fn handle(
        &mut self,
        submessage: &Submessage,
        context: &ReceiverContext,
        now: Instant,
    ) -> Result<Vec<Effect>> {
        match (self, submessage) {
            (Endpoint::Reader(r), Submessage::Data(d)) => {
                r.process_event(ReaderInput::Data(d), context, now)
            }
            (Endpoint::Reader(r), Submessage::Heartbeat(hb)) => {
                r.process_event(ReaderInput::Heartbeat(hb), context, now)
            }
            (Endpoint::Reader(r), Submessage::Gap(gap)) => {
                r.process_event(ReaderInput::Gap(gap), context, now)
            }
            (Endpoint::Writer(w), Submessage::AckNack(ack)) => {
                w.process_event(WriterInput::AckNack(ack), context, now)
            }
            _ => Ok(Vec::new()),
        }
    }

    pub fn on_timer(&mut self, kind: TimerKind, now: Instant) -> Result<Vec<Effect>> {
        match self {
            Endpoint::Reader(r) => r.on_timer(kind, now),
            Endpoint::Writer(w) => w.on_timer(kind, now),
        }
    }

    pub fn delete(&mut self) -> Vec<Effect> {
        match self {
            Endpoint::Reader(r) => r.delete(),
            Endpoint::Writer(w) => w.delete(),
        }
    }
}
