// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory RTPS message and submessage shapes.
//!
//! Field layout follows DDS-RTPS v2.5 Sec.8.3.7. Bit-level encoding is left
//! to the serialization layer; the behaviour core only reads and produces
//! these structs.

use std::sync::Arc;

use super::SequenceNumberSet;
use crate::config::{HDDS_VENDOR_ID, PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR};
use crate::types::{EntityId, GuidPrefix, Locator, ParameterList, SequenceNumber, Time};

/// RTPS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

/// Version spoken by this implementation.
pub const PROTOCOLVERSION: ProtocolVersion = ProtocolVersion {
    major: PROTOCOL_VERSION_MAJOR,
    minor: PROTOCOL_VERSION_MINOR,
};

/// Two-byte vendor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VendorId(pub [u8; 2]);

pub const VENDORID_HDDS: VendorId = VendorId(HDDS_VENDOR_ID);

/// Message header: protocol version, vendor and sending participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub protocol_version: ProtocolVersion,
    pub vendor_id: VendorId,
    pub guid_prefix: GuidPrefix,
}

impl Header {
    pub fn new(guid_prefix: GuidPrefix) -> Self {
        Self {
            protocol_version: PROTOCOLVERSION,
            vendor_id: VENDORID_HDDS,
            guid_prefix,
        }
    }
}

// ============================================================================
// Entity submessages
// ============================================================================

/// DATA submessage (Sec.8.3.7.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSubmessage {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub writer_sn: SequenceNumber,
    pub inline_qos: Option<ParameterList>,
    pub serialized_payload: Arc<[u8]>,
    /// Payload carries the serialized sample.
    pub data_flag: bool,
    /// Payload carries the serialized key only.
    pub key_flag: bool,
}

/// GAP submessage (Sec.8.3.7.4).
///
/// Names the irrelevant sequence numbers `gap_start..gap_list.base` plus
/// every member of `gap_list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapSubmessage {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub gap_start: SequenceNumber,
    pub gap_list: SequenceNumberSet,
}

impl GapSubmessage {
    /// Gap covering the contiguous range `[start, end)`.
    pub fn contiguous(
        reader_id: EntityId,
        writer_id: EntityId,
        start: SequenceNumber,
        end: SequenceNumber,
    ) -> Self {
        Self {
            reader_id,
            writer_id,
            gap_start: start,
            gap_list: SequenceNumberSet::empty(end),
        }
    }

    /// Pack ascending sequence numbers into as few Gaps as possible.
    ///
    /// Each Gap starts with a contiguous run (`gap_start..base`), followed by
    /// whatever members fit in its 256-bit list window.
    pub fn batch(
        reader_id: EntityId,
        writer_id: EntityId,
        sequences: &[SequenceNumber],
    ) -> Vec<GapSubmessage> {
        let mut gaps = Vec::new();
        let mut idx = 0;
        while idx < sequences.len() {
            let start = sequences[idx];
            let mut end = start.next();
            idx += 1;
            while idx < sequences.len() && sequences[idx] == end {
                end = end.next();
                idx += 1;
            }

            let mut list = SequenceNumberSet::empty(end);
            while idx < sequences.len() && list.insert(sequences[idx]) {
                idx += 1;
            }
            gaps.push(GapSubmessage {
                reader_id,
                writer_id,
                gap_start: start,
                gap_list: list,
            });
        }
        gaps
    }

    /// Every sequence number this Gap declares irrelevant, ascending.
    ///
    /// Walks the contiguous run one number at a time; receivers apply it as a
    /// range instead (see `WriterProxy::on_gap`).
    pub fn irrelevant_sequences(&self) -> impl Iterator<Item = SequenceNumber> + '_ {
        self.gap_start
            .max(SequenceNumber::new(1))
            .range_to(self.gap_list.base())
            .chain(self.gap_list.iter())
    }
}

/// HEARTBEAT submessage (Sec.8.3.7.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSubmessage {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub first_sn: SequenceNumber,
    pub last_sn: SequenceNumber,
    /// Monotonic per writer (anti-replay).
    pub count: i32,
    /// Set: reader is not required to respond.
    pub final_flag: bool,
    /// Set: heartbeat only asserts writer liveliness.
    pub liveliness_flag: bool,
}

/// ACKNACK submessage (Sec.8.3.7.1).
///
/// `reader_sn_state.base` acknowledges everything below it; set members are
/// negative acknowledgements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckNackSubmessage {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub reader_sn_state: SequenceNumberSet,
    pub count: i32,
    /// Set: writer is not required to respond with a heartbeat.
    pub final_flag: bool,
}

/// DATA_FRAG submessage header fields. Reassembly is not supported; the
/// receiver reports these as dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFragSubmessage {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub writer_sn: SequenceNumber,
    pub fragment_starting_num: u32,
    pub fragments_in_submessage: u16,
    pub sample_size: u32,
}

// ============================================================================
// Receiver-context submessages
// ============================================================================

/// INFO_DST: following submessages target this participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoDestination {
    pub guid_prefix: GuidPrefix,
}

/// INFO_SRC: following submessages originate from this participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoSource {
    pub protocol_version: ProtocolVersion,
    pub vendor_id: VendorId,
    pub guid_prefix: GuidPrefix,
}

/// INFO_TS: source timestamp for following submessages (`None` invalidates).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoTimestamp {
    pub timestamp: Option<Time>,
}

/// INFO_REPLY: where replies to following submessages should go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InfoReply {
    pub unicast_locators: Vec<Locator>,
    pub multicast_locators: Vec<Locator>,
}

/// One submessage of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submessage {
    Data(DataSubmessage),
    DataFrag(DataFragSubmessage),
    Gap(GapSubmessage),
    Heartbeat(HeartbeatSubmessage),
    AckNack(AckNackSubmessage),
    InfoDestination(InfoDestination),
    InfoSource(InfoSource),
    InfoTimestamp(InfoTimestamp),
    InfoReply(InfoReply),
}

impl Submessage {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Submessage::Data(_) => "DATA",
            Submessage::DataFrag(_) => "DATA_FRAG",
            Submessage::Gap(_) => "GAP",
            Submessage::Heartbeat(_) => "HEARTBEAT",
            Submessage::AckNack(_) => "ACKNACK",
            Submessage::InfoDestination(_) => "INFO_DST",
            Submessage::InfoSource(_) => "INFO_SRC",
            Submessage::InfoTimestamp(_) => "INFO_TS",
            Submessage::InfoReply(_) => "INFO_REPLY",
        }
    }

    /// `(reader_id, writer_id)` of entity submessages.
    pub fn entity_ids(&self) -> Option<(EntityId, EntityId)> {
        match self {
            Submessage::Data(d) => Some((d.reader_id, d.writer_id)),
            Submessage::DataFrag(d) => Some((d.reader_id, d.writer_id)),
            Submessage::Gap(g) => Some((g.reader_id, g.writer_id)),
            Submessage::Heartbeat(h) => Some((h.reader_id, h.writer_id)),
            Submessage::AckNack(a) => Some((a.reader_id, a.writer_id)),
            _ => None,
        }
    }
}

/// A complete RTPS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub submessages: Vec<Submessage>,
}

impl Message {
    pub fn new(guid_prefix: GuidPrefix) -> Self {
        Self {
            header: Header::new(guid_prefix),
            submessages: Vec::new(),
        }
    }

    pub fn with_submessages(guid_prefix: GuidPrefix, submessages: Vec<Submessage>) -> Self {
        Self {
            header: Header::new(guid_prefix),
            submessages,
        }
    }

    pub fn push(&mut self, submessage: Submessage) {
        self.submessages.push(submessage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ENTITYID_UNKNOWN;

    fn sn(v: i64) -> SequenceNumber {
        SequenceNumber::new(v)
    }

    fn irrelevant(gap: &GapSubmessage) -> Vec<i64> {
        gap.irrelevant_sequences().map(SequenceNumber::value).collect()
    }

    #[test]
    fn test_gap_range_plus_list() {
        // gap_start=6, list {base 8, {8}} names 6, 7 and 8
        let gap = GapSubmessage {
            reader_id: ENTITYID_UNKNOWN,
            writer_id: ENTITYID_UNKNOWN,
            gap_start: sn(6),
            gap_list: SequenceNumberSet::from_sequences(sn(8), [sn(8)]).expect("set"),
        };
        assert_eq!(irrelevant(&gap), vec![6, 7, 8]);
    }

    #[test]
    fn test_gap_contiguous() {
        let gap = GapSubmessage::contiguous(ENTITYID_UNKNOWN, ENTITYID_UNKNOWN, sn(3), sn(6));
        assert_eq!(irrelevant(&gap), vec![3, 4, 5]);
    }

    #[test]
    fn test_gap_batch_run_then_sparse() {
        let seqs = [sn(2), sn(3), sn(4), sn(9), sn(12)];
        let gaps = GapSubmessage::batch(ENTITYID_UNKNOWN, ENTITYID_UNKNOWN, &seqs);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].gap_start, sn(2));
        assert_eq!(gaps[0].gap_list.base(), sn(5));
        assert_eq!(irrelevant(&gaps[0]), vec![2, 3, 4, 9, 12]);
    }

    #[test]
    fn test_gap_batch_splits_past_window() {
        let seqs = [sn(1), sn(3), sn(1000)];
        let gaps = GapSubmessage::batch(ENTITYID_UNKNOWN, ENTITYID_UNKNOWN, &seqs);
        assert_eq!(gaps.len(), 2);
        assert_eq!(irrelevant(&gaps[0]), vec![1, 3]);
        assert_eq!(irrelevant(&gaps[1]), vec![1000]);
    }

    #[test]
    fn test_entity_ids_only_for_entity_submessages() {
        let info = Submessage::InfoTimestamp(InfoTimestamp { timestamp: None });
        assert_eq!(info.entity_ids(), None);
        assert_eq!(info.name(), "INFO_TS");
    }
}
