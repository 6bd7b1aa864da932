// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CacheChange: one immutable published sample record.

use std::sync::Arc;

use super::parameter::{ParameterList, STATUS_INFO_DISPOSED, STATUS_INFO_UNREGISTERED};
use super::{Guid, SequenceNumber, Time};

/// Kind of change carried by a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// New value for the instance.
    Alive,
    /// Instance disposed by the writer.
    Disposed,
    /// Writer unregistered the instance.
    Unregistered,
}

impl ChangeKind {
    /// Status info flags for the inline QoS (`0` for alive samples).
    pub fn status_info_flags(self) -> u8 {
        match self {
            ChangeKind::Alive => 0,
            ChangeKind::Disposed => STATUS_INFO_DISPOSED,
            ChangeKind::Unregistered => STATUS_INFO_UNREGISTERED,
        }
    }

    /// Decode from status info flags; disposal wins when both bits are set.
    pub fn from_status_info(flags: u8) -> Self {
        if flags & STATUS_INFO_DISPOSED != 0 {
            ChangeKind::Disposed
        } else if flags & STATUS_INFO_UNREGISTERED != 0 {
            ChangeKind::Unregistered
        } else {
            ChangeKind::Alive
        }
    }
}

/// 16-byte instance handle (key hash of a keyed instance).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle(pub [u8; 16]);

/// Handle of unkeyed topics.
pub const HANDLE_NIL: InstanceHandle = InstanceHandle([0; 16]);

/// One published sample.
///
/// Immutable once constructed; moved into exactly one `HistoryCache` slot.
/// Proxies reference changes by sequence number, never by copying the
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheChange {
    kind: ChangeKind,
    writer_guid: Guid,
    instance_handle: InstanceHandle,
    sequence_number: SequenceNumber,
    inline_qos: ParameterList,
    data: Arc<[u8]>,
    source_timestamp: Option<Time>,
}

impl CacheChange {
    pub fn new(
        kind: ChangeKind,
        writer_guid: Guid,
        instance_handle: InstanceHandle,
        sequence_number: SequenceNumber,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            kind,
            writer_guid,
            instance_handle,
            sequence_number,
            inline_qos: ParameterList::new(),
            data: data.into(),
            source_timestamp: None,
        }
    }

    pub fn with_inline_qos(mut self, inline_qos: ParameterList) -> Self {
        self.inline_qos = inline_qos;
        self
    }

    pub fn with_source_timestamp(mut self, timestamp: Time) -> Self {
        self.source_timestamp = Some(timestamp);
        self
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn writer_guid(&self) -> Guid {
        self.writer_guid
    }

    pub fn instance_handle(&self) -> InstanceHandle {
        self.instance_handle
    }

    pub fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }

    pub fn inline_qos(&self) -> &ParameterList {
        &self.inline_qos
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the payload (no copy).
    pub fn data_arc(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn source_timestamp(&self) -> Option<Time> {
        self.source_timestamp
    }
}
