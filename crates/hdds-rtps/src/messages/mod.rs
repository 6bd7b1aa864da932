// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS submessages consumed and produced by the behaviour core
//!
//! Consolidates the shapes the state machines exchange with the wire layer:
//! - DATA / DATA_FRAG: samples (fragments are reported unsupported)
//! - GAP: writer declares sequence numbers irrelevant
//! - HEARTBEAT: writer announces its available range
//! - ACKNACK: reader acknowledges and requests repair
//! - INFO_DST / INFO_SRC / INFO_TS / INFO_REPLY: receiver context

mod receiver;
mod seq_set;
mod submessage;

pub use receiver::{MessageReceiver, ReceiveSummary, ReceiverContext};
pub use seq_set::{SequenceNumberIter, SequenceNumberSet, BITMAP_WORDS, WORD_BITS};
pub use submessage::{
    AckNackSubmessage, DataFragSubmessage, DataSubmessage, GapSubmessage, Header,
    HeartbeatSubmessage, InfoDestination, InfoReply, InfoSource, InfoTimestamp, Message,
    ProtocolVersion, Submessage, VendorId, PROTOCOLVERSION, VENDORID_HDDS,
};
