// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML endpoint profile loader.
//!
//! # Example YAML
//!
//! ```yaml
//! writers:
//!   telemetry:
//!     reliability: RELIABLE
//!     durability: TRANSIENT_LOCAL
//!     history:
//!       kind: KEEP_LAST
//!       depth: 16
//!     heartbeat_period_ms: 50
//!
//! readers:
//!   telemetry:
//!     reliability: RELIABLE
//!     heartbeat_response_delay_ms: 20
//! ```
//!
//! Fields left out keep the defaults of [`WriterConfig::reliable`] /
//! [`ReaderConfig::reliable`]; `reliability: BEST_EFFORT` starts from the
//! best-effort defaults instead.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::{DurabilityKind, HistoryKind, ReaderConfig, ReliabilityKind, WriterConfig};
use crate::{Error, Result};

/// Root document: named writer and reader profiles.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointProfile {
    pub writers: HashMap<String, YamlWriterProfile>,
    pub readers: HashMap<String, YamlReaderProfile>,
}

/// History in YAML.
#[derive(Debug, Deserialize)]
pub struct YamlHistory {
    /// KEEP_LAST or KEEP_ALL
    pub kind: String,
    #[serde(default = "default_history_depth")]
    pub depth: u32,
}

fn default_history_depth() -> u32 {
    1
}

/// One writer profile.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct YamlWriterProfile {
    /// RELIABLE or BEST_EFFORT
    pub reliability: Option<String>,
    pub stateful: Option<bool>,
    pub push_mode: Option<bool>,
    pub history: Option<YamlHistory>,
    /// VOLATILE or TRANSIENT_LOCAL
    pub durability: Option<String>,
    pub heartbeat_period_ms: Option<u64>,
    pub nack_response_delay_ms: Option<u64>,
    pub nack_suppression_duration_ms: Option<u64>,
    pub resend_data_period_ms: Option<u64>,
}

/// One reader profile.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct YamlReaderProfile {
    /// RELIABLE or BEST_EFFORT
    pub reliability: Option<String>,
    pub stateful: Option<bool>,
    pub history: Option<YamlHistory>,
    pub heartbeat_response_delay_ms: Option<u64>,
    pub heartbeat_suppression_duration_ms: Option<u64>,
    pub expects_inline_qos: Option<bool>,
}

impl EndpointProfile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("failed to parse YAML: {}", e)))
    }

    /// Validated writer configuration for profile `name`.
    pub fn writer(&self, name: &str) -> Result<WriterConfig> {
        self.writers
            .get(name)
            .ok_or_else(|| Error::InvalidConfig(format!("no writer profile '{}'", name)))?
            .to_config()
    }

    /// Validated reader configuration for profile `name`.
    pub fn reader(&self, name: &str) -> Result<ReaderConfig> {
        self.readers
            .get(name)
            .ok_or_else(|| Error::InvalidConfig(format!("no reader profile '{}'", name)))?
            .to_config()
    }
}

impl YamlWriterProfile {
    pub fn to_config(&self) -> Result<WriterConfig> {
        let mut cfg = match parse_reliability(self.reliability.as_deref())? {
            ReliabilityKind::Reliable => WriterConfig::reliable(),
            ReliabilityKind::BestEffort => WriterConfig::best_effort(),
        };
        if let Some(stateful) = self.stateful {
            cfg.stateful = stateful;
        }
        if let Some(push_mode) = self.push_mode {
            cfg.push_mode = push_mode;
        }
        if let Some(history) = &self.history {
            cfg.history = parse_history(history)?;
        }
        if let Some(durability) = self.durability.as_deref() {
            cfg.durability = match durability.to_uppercase().as_str() {
                "VOLATILE" => DurabilityKind::Volatile,
                "TRANSIENT_LOCAL" => DurabilityKind::TransientLocal,
                other => {
                    return Err(Error::InvalidConfig(format!("invalid durability: {}", other)))
                }
            };
        }
        if let Some(ms) = self.heartbeat_period_ms {
            cfg.heartbeat_period = Duration::from_millis(ms);
        }
        if let Some(ms) = self.nack_response_delay_ms {
            cfg.nack_response_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.nack_suppression_duration_ms {
            cfg.nack_suppression_duration = Duration::from_millis(ms);
        }
        if let Some(ms) = self.resend_data_period_ms {
            cfg.resend_data_period = Some(Duration::from_millis(ms));
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

impl YamlReaderProfile {
    pub fn to_config(&self) -> Result<ReaderConfig> {
        let mut cfg = match parse_reliability(self.reliability.as_deref())? {
            ReliabilityKind::Reliable => ReaderConfig::reliable(),
            ReliabilityKind::BestEffort => ReaderConfig::best_effort(),
        };
        if let Some(stateful) = self.stateful {
            cfg.stateful = stateful;
        }
        if let Some(history) = &self.history {
            cfg.history = parse_history(history)?;
        }
        if let Some(ms) = self.heartbeat_response_delay_ms {
            cfg.heartbeat_response_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.heartbeat_suppression_duration_ms {
            cfg.heartbeat_suppression_duration = Duration::from_millis(ms);
        }
        if let Some(expects) = self.expects_inline_qos {
            cfg.expects_inline_qos = expects;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_reliability(value: Option<&str>) -> Result<ReliabilityKind> {
    match value.map(str::to_uppercase).as_deref() {
        None | Some("RELIABLE") => Ok(ReliabilityKind::Reliable),
        Some("BEST_EFFORT") => Ok(ReliabilityKind::BestEffort),
        Some(other) => Err(Error::InvalidConfig(format!("invalid reliability: {}", other))),
    }
}

fn parse_history(history: &YamlHistory) -> Result<HistoryKind> {
    match history.kind.to_uppercase().as_str() {
        "KEEP_LAST" => Ok(HistoryKind::KeepLast(history.depth)),
        "KEEP_ALL" => Ok(HistoryKind::KeepAll),
        other => Err(Error::InvalidConfig(format!("invalid history kind: {}", other))),
    }
}
