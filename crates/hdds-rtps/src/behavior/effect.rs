// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Side effects requested by state machine actions.
//!
//! Actions never perform I/O or touch timers directly: they return effects
//! and the runtime carries them out after the endpoint lock is released.

use std::time::Duration;

use crate::messages::Submessage;
use crate::types::{Guid, GuidPrefix, Locator};

/// Which timer of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// Writer periodic heartbeat.
    Heartbeat,
    /// Writer nack-response delay towards one matched reader.
    NackResponse(Guid),
    /// Stateless writer nack-response delay towards one locator.
    NackResponseLocator(Locator),
    /// Reader heartbeat-response delay towards one matched writer.
    HeartbeatResponse(Guid),
    /// Stateless writer periodic re-push of its history.
    ResendData,
}

/// Timer identity: owning endpoint plus kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerKey {
    pub endpoint: Guid,
    pub kind: TimerKind,
}

impl TimerKey {
    pub fn new(endpoint: Guid, kind: TimerKind) -> Self {
        Self { endpoint, kind }
    }
}

/// One side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Hand submessages to the transport. `dst_prefix` adds an INFO_DST.
    Send {
        dst_prefix: Option<GuidPrefix>,
        locators: Vec<Locator>,
        submessages: Vec<Submessage>,
    },
    /// Arm (or re-arm) a timer; periodic timers re-arm after each firing.
    ArmTimer {
        key: TimerKey,
        after: Duration,
        period: Option<Duration>,
    },
    DisarmTimer(TimerKey),
}

impl Effect {
    pub fn arm_once(key: TimerKey, after: Duration) -> Self {
        Effect::ArmTimer {
            key,
            after,
            period: None,
        }
    }

    pub fn arm_periodic(key: TimerKey, period: Duration) -> Self {
        Effect::ArmTimer {
            key,
            after: period,
            period: Some(period),
        }
    }

    /// Submessages of a `Send`, empty for timer effects.
    pub fn submessages(&self) -> &[Submessage] {
        match self {
            Effect::Send { submessages, .. } => submessages,
            _ => &[],
        }
    }
}
