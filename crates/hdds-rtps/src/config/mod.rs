// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol constants and endpoint configuration.
//!
//! - **Level 1 (Static)**: RTPS constants (protocol version, vendor id,
//!   default timing, bitmap limits). **NEVER hardcode elsewhere!**
//! - **Level 2 (Per endpoint)**: [`WriterConfig`] / [`ReaderConfig`], chosen
//!   at endpoint construction. Reliability x statefulness selects which of the
//!   four behaviours the endpoint runs.
//!
//! # Example
//!
//! ```rust
//! use hdds_rtps::config::{HistoryKind, WriterConfig};
//! use std::time::Duration;
//!
//! let cfg = WriterConfig::reliable()
//!     .with_history(HistoryKind::KeepLast(32))
//!     .with_heartbeat_period(Duration::from_millis(50));
//! assert!(cfg.validate().is_ok());
//! ```

#[cfg(feature = "config-loaders")]
mod yaml;

#[cfg(feature = "config-loaders")]
pub use yaml::{EndpointProfile, YamlHistory, YamlReaderProfile, YamlWriterProfile};

use std::time::Duration;

use crate::{Error, Result};

// =======================================================================
// RTPS protocol identity
// =======================================================================

/// Protocol version spoken by this implementation (RTPS 2.4).
pub const PROTOCOL_VERSION_MAJOR: u8 = 2;
pub const PROTOCOL_VERSION_MINOR: u8 = 4;

/// HDDS vendor id (0x01, 0xAA).
pub const HDDS_VENDOR_ID: [u8; 2] = [0x01, 0xAA];
/// VENDORID_UNKNOWN.
pub const VENDOR_ID_UNKNOWN: [u8; 2] = [0x00, 0x00];

/// Maximum bits in a SequenceNumberSet bitmap (RTPS limit).
pub const MAX_BITMAP_BITS: u32 = 256;

// =======================================================================
// Default timing (DDS-RTPS v2.5 Sec.8.4.7.1 / 8.4.10.1 defaults)
// =======================================================================

/// Default heartbeat period (milliseconds).
pub const DEFAULT_HEARTBEAT_PERIOD_MS: u64 = 100;
/// Default delay before answering a negative acknowledgement.
pub const DEFAULT_NACK_RESPONSE_DELAY_MS: u64 = 200;
/// Default delay before answering a heartbeat with an AckNack.
pub const DEFAULT_HEARTBEAT_RESPONSE_DELAY_MS: u64 = 500;

// =======================================================================
// Policies
// =======================================================================

/// Delivery guarantee of an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReliabilityKind {
    /// Fire-and-forget: no heartbeats, no repair.
    BestEffort,
    /// Heartbeat/AckNack driven repair.
    #[default]
    Reliable,
}

/// Whether the topic carries keyed instances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TopicKind {
    #[default]
    NoKey,
    WithKey,
}

/// History retained by an endpoint's cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HistoryKind {
    /// Keep the newest N changes; older ones are evicted on insert.
    KeepLast(u32),
    /// Never evict on insert.
    #[default]
    KeepAll,
}

/// What a writer offers to readers matched after a change was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DurabilityKind {
    /// Late joiners are told (via Gap) that older changes are irrelevant.
    #[default]
    Volatile,
    /// Late joiners receive the writer's retained history.
    TransientLocal,
}

// =======================================================================
// Writer configuration
// =======================================================================

/// Writer endpoint configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterConfig {
    pub reliability: ReliabilityKind,
    /// Track one ReaderProxy per matched reader (vs anonymous ReaderLocators).
    pub stateful: bool,
    /// New changes start `unsent` (push) instead of `unacknowledged` (pull).
    pub push_mode: bool,
    pub history: HistoryKind,
    pub durability: DurabilityKind,
    pub heartbeat_period: Duration,
    pub nack_response_delay: Duration,
    /// AckNacks arriving this soon after a repair are not acted upon.
    pub nack_suppression_duration: Duration,
    /// Stateless writers re-push their whole history at this period.
    pub resend_data_period: Option<Duration>,
}

impl WriterConfig {
    /// Reliable stateful push writer keeping all history.
    pub fn reliable() -> Self {
        Self {
            reliability: ReliabilityKind::Reliable,
            stateful: true,
            push_mode: true,
            history: HistoryKind::KeepAll,
            durability: DurabilityKind::Volatile,
            heartbeat_period: Duration::from_millis(DEFAULT_HEARTBEAT_PERIOD_MS),
            nack_response_delay: Duration::from_millis(DEFAULT_NACK_RESPONSE_DELAY_MS),
            nack_suppression_duration: Duration::ZERO,
            resend_data_period: None,
        }
    }

    /// Best-effort stateful push writer keeping the last sample only.
    pub fn best_effort() -> Self {
        Self {
            reliability: ReliabilityKind::BestEffort,
            history: HistoryKind::KeepLast(1),
            ..Self::reliable()
        }
    }

    pub fn with_stateful(mut self, stateful: bool) -> Self {
        self.stateful = stateful;
        self
    }

    pub fn with_push_mode(mut self, push_mode: bool) -> Self {
        self.push_mode = push_mode;
        self
    }

    pub fn with_history(mut self, history: HistoryKind) -> Self {
        self.history = history;
        self
    }

    pub fn with_durability(mut self, durability: DurabilityKind) -> Self {
        self.durability = durability;
        self
    }

    pub fn with_heartbeat_period(mut self, period: Duration) -> Self {
        self.heartbeat_period = period;
        self
    }

    pub fn with_nack_response_delay(mut self, delay: Duration) -> Self {
        self.nack_response_delay = delay;
        self
    }

    pub fn with_nack_suppression_duration(mut self, duration: Duration) -> Self {
        self.nack_suppression_duration = duration;
        self
    }

    pub fn with_resend_data_period(mut self, period: Duration) -> Self {
        self.resend_data_period = Some(period);
        self
    }

    pub fn is_reliable(&self) -> bool {
        self.reliability == ReliabilityKind::Reliable
    }

    /// Reject configurations the behaviours cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.history == HistoryKind::KeepLast(0) {
            return Err(Error::InvalidConfig(
                "history depth must be at least 1".to_string(),
            ));
        }
        if self.is_reliable() && self.heartbeat_period.is_zero() {
            return Err(Error::InvalidConfig(
                "reliable writers need a non-zero heartbeat period".to_string(),
            ));
        }
        if matches!(self.resend_data_period, Some(p) if p.is_zero()) {
            return Err(Error::InvalidConfig(
                "resend data period must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::reliable()
    }
}

// =======================================================================
// Reader configuration
// =======================================================================

/// Reader endpoint configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReaderConfig {
    pub reliability: ReliabilityKind,
    /// Track one WriterProxy per matched writer.
    pub stateful: bool,
    pub history: HistoryKind,
    pub heartbeat_response_delay: Duration,
    /// Heartbeats arriving this soon after an AckNack was sent are ignored.
    pub heartbeat_suppression_duration: Duration,
    pub expects_inline_qos: bool,
}

impl ReaderConfig {
    pub fn reliable() -> Self {
        Self {
            reliability: ReliabilityKind::Reliable,
            stateful: true,
            history: HistoryKind::KeepAll,
            heartbeat_response_delay: Duration::from_millis(DEFAULT_HEARTBEAT_RESPONSE_DELAY_MS),
            heartbeat_suppression_duration: Duration::ZERO,
            expects_inline_qos: false,
        }
    }

    pub fn best_effort() -> Self {
        Self {
            reliability: ReliabilityKind::BestEffort,
            ..Self::reliable()
        }
    }

    pub fn with_stateful(mut self, stateful: bool) -> Self {
        self.stateful = stateful;
        self
    }

    pub fn with_history(mut self, history: HistoryKind) -> Self {
        self.history = history;
        self
    }

    pub fn with_heartbeat_response_delay(mut self, delay: Duration) -> Self {
        self.heartbeat_response_delay = delay;
        self
    }

    pub fn with_heartbeat_suppression_duration(mut self, duration: Duration) -> Self {
        self.heartbeat_suppression_duration = duration;
        self
    }

    pub fn with_expects_inline_qos(mut self, expects: bool) -> Self {
        self.expects_inline_qos = expects;
        self
    }

    pub fn is_reliable(&self) -> bool {
        self.reliability == ReliabilityKind::Reliable
    }

    /// Reject configurations the behaviours cannot run.
    ///
    /// A reliable reader must keep per-writer state to acknowledge, so the
    /// reliable stateless combination is refused.
    pub fn validate(&self) -> Result<()> {
        if self.is_reliable() && !self.stateful {
            return Err(Error::NotYetImplemented("reliable stateless reader"));
        }
        if self.history == HistoryKind::KeepLast(0) {
            return Err(Error::InvalidConfig(
                "history depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::reliable()
    }
}
