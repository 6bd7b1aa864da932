// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Identity and value types shared by the cache, proxies and behaviours.

mod change;
mod guid;
mod locator;
mod parameter;
mod seq;
mod time;

pub use change::{CacheChange, ChangeKind, InstanceHandle, HANDLE_NIL};
pub use guid::{
    entity_kind, EntityId, Guid, GuidPrefix, ENTITYID_PARTICIPANT,
    ENTITYID_SEDP_BUILTIN_PUBLICATIONS_READER, ENTITYID_SEDP_BUILTIN_PUBLICATIONS_WRITER,
    ENTITYID_SEDP_BUILTIN_SUBSCRIPTIONS_READER, ENTITYID_SEDP_BUILTIN_SUBSCRIPTIONS_WRITER,
    ENTITYID_SPDP_BUILTIN_PARTICIPANT_READER, ENTITYID_SPDP_BUILTIN_PARTICIPANT_WRITER,
    ENTITYID_UNKNOWN, ENTITY_ID_LEN, GUIDPREFIX_UNKNOWN, GUID_PREFIX_LEN,
};
pub use locator::{
    Locator, LOCATOR_INVALID, LOCATOR_KIND_INVALID, LOCATOR_KIND_RESERVED, LOCATOR_KIND_UDPV4,
    LOCATOR_KIND_UDPV6, LOCATOR_PORT_INVALID,
};
pub use parameter::{
    Parameter, ParameterList, PID_KEY_HASH, PID_SENTINEL, PID_STATUS_INFO, STATUS_INFO_DISPOSED,
    STATUS_INFO_UNREGISTERED,
};
pub use seq::{SeqNumGenerator, SequenceNumber, SEQUENCENUMBER_UNKNOWN};
pub use time::{Time, TIME_INFINITE, TIME_INVALID, TIME_ZERO};
