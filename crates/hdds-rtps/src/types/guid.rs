// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS GUID (Globally Unique Identifier) and its components.

use std::cmp::Ordering;
use std::fmt;

/// GUID prefix length (12 bytes).
pub const GUID_PREFIX_LEN: usize = 12;
/// Entity ID length (4 bytes).
pub const ENTITY_ID_LEN: usize = 4;

/// Entity kind octets (DDS-RTPS v2.5 Sec.9.3.1.2).
pub mod entity_kind {
    pub const UNKNOWN: u8 = 0x00;
    pub const USER_WRITER_WITH_KEY: u8 = 0x02;
    pub const USER_WRITER_NO_KEY: u8 = 0x03;
    pub const USER_READER_NO_KEY: u8 = 0x04;
    pub const USER_READER_WITH_KEY: u8 = 0x07;
    pub const BUILTIN_PARTICIPANT: u8 = 0xC1;
    pub const BUILTIN_WRITER_WITH_KEY: u8 = 0xC2;
    pub const BUILTIN_WRITER_NO_KEY: u8 = 0xC3;
    pub const BUILTIN_READER_NO_KEY: u8 = 0xC4;
    pub const BUILTIN_READER_WITH_KEY: u8 = 0xC7;
}

/// 12-byte participant prefix.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct GuidPrefix(pub [u8; GUID_PREFIX_LEN]);

/// All-zero prefix: "unknown" / broadcast destination.
pub const GUIDPREFIX_UNKNOWN: GuidPrefix = GuidPrefix([0; GUID_PREFIX_LEN]);

impl GuidPrefix {
    pub fn is_unknown(&self) -> bool {
        *self == GUIDPREFIX_UNKNOWN
    }
}

impl fmt::Debug for GuidPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GuidPrefix(")?;
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// Entity identifier: 3-byte key + 1-byte kind.
///
/// Ordered by kind first, then key, so that GUIDs sort lexicographically on
/// (prefix, entity kind, entity key).
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct EntityId {
    pub key: [u8; 3],
    pub kind: u8,
}

pub const ENTITYID_UNKNOWN: EntityId = EntityId::new([0, 0, 0], entity_kind::UNKNOWN);
pub const ENTITYID_PARTICIPANT: EntityId =
    EntityId::new([0, 0, 1], entity_kind::BUILTIN_PARTICIPANT);
pub const ENTITYID_SPDP_BUILTIN_PARTICIPANT_WRITER: EntityId =
    EntityId::new([0, 1, 0], entity_kind::BUILTIN_WRITER_WITH_KEY);
pub const ENTITYID_SPDP_BUILTIN_PARTICIPANT_READER: EntityId =
    EntityId::new([0, 1, 0], entity_kind::BUILTIN_READER_WITH_KEY);
pub const ENTITYID_SEDP_BUILTIN_PUBLICATIONS_WRITER: EntityId =
    EntityId::new([0, 0, 3], entity_kind::BUILTIN_WRITER_WITH_KEY);
pub const ENTITYID_SEDP_BUILTIN_PUBLICATIONS_READER: EntityId =
    EntityId::new([0, 0, 3], entity_kind::BUILTIN_READER_WITH_KEY);
pub const ENTITYID_SEDP_BUILTIN_SUBSCRIPTIONS_WRITER: EntityId =
    EntityId::new([0, 0, 4], entity_kind::BUILTIN_WRITER_WITH_KEY);
pub const ENTITYID_SEDP_BUILTIN_SUBSCRIPTIONS_READER: EntityId =
    EntityId::new([0, 0, 4], entity_kind::BUILTIN_READER_WITH_KEY);

impl EntityId {
    pub const fn new(key: [u8; 3], kind: u8) -> Self {
        Self { key, kind }
    }

    pub fn from_bytes(bytes: [u8; ENTITY_ID_LEN]) -> Self {
        Self {
            key: [bytes[0], bytes[1], bytes[2]],
            kind: bytes[3],
        }
    }

    pub fn to_bytes(&self) -> [u8; ENTITY_ID_LEN] {
        [self.key[0], self.key[1], self.key[2], self.kind]
    }

    pub fn is_unknown(&self) -> bool {
        *self == ENTITYID_UNKNOWN
    }

    /// True for user and builtin writer kinds.
    pub fn is_writer(&self) -> bool {
        matches!(
            self.kind & 0x3F,
            entity_kind::USER_WRITER_WITH_KEY | entity_kind::USER_WRITER_NO_KEY
        )
    }

    /// True for user and builtin reader kinds.
    pub fn is_reader(&self) -> bool {
        matches!(
            self.kind & 0x3F,
            entity_kind::USER_READER_NO_KEY | entity_kind::USER_READER_WITH_KEY
        )
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntityId({:02x}{:02x}{:02x}.{:02x})",
            self.key[0], self.key[1], self.key[2], self.kind
        )
    }
}

/// RTPS GUID
///
/// 16-byte identifier: 12-byte prefix + 4-byte entity ID. Used as the stable
/// key for proxy lookup.
///
/// # Display Format
/// Hex with dots: "01.0f.ac.10.00.00.00.00.00.00.00.01.00.00.01.c1"
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Guid {
    pub prefix: GuidPrefix,
    pub entity_id: EntityId,
}

impl Guid {
    pub fn new(prefix: GuidPrefix, entity_id: EntityId) -> Self {
        Self { prefix, entity_id }
    }

    /// Create GUID from raw bytes (16 bytes total)
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut prefix = [0u8; GUID_PREFIX_LEN];
        prefix.copy_from_slice(&bytes[0..12]);
        Self {
            prefix: GuidPrefix(prefix),
            entity_id: EntityId::from_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..12].copy_from_slice(&self.prefix.0);
        bytes[12..16].copy_from_slice(&self.entity_id.to_bytes());
        bytes
    }

    /// GUID with all zeros (GUID_UNKNOWN).
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.prefix.is_unknown() && self.entity_id.is_unknown()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.prefix.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        for byte in &self.entity_id.to_bytes() {
            write!(f, ".{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(last: u8) -> GuidPrefix {
        let mut p = [0u8; GUID_PREFIX_LEN];
        p[11] = last;
        GuidPrefix(p)
    }

    #[test]
    fn test_guid_bytes_roundtrip() {
        let bytes = [1, 15, 172, 16, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 193];
        let guid = Guid::from_bytes(bytes);
        assert_eq!(guid.to_bytes(), bytes);
        assert_eq!(guid.entity_id, ENTITYID_PARTICIPANT);
    }

    #[test]
    fn test_guid_display() {
        let guid = Guid::from_bytes([1, 15, 172, 16, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 193]);
        assert_eq!(
            guid.to_string(),
            "01.0f.ac.10.00.00.00.00.00.00.00.01.00.00.01.c1"
        );
    }

    #[test]
    fn test_guid_order_prefix_then_kind_then_key() {
        let low_prefix = Guid::new(prefix(1), EntityId::new([9, 9, 9], 0x07));
        let high_prefix = Guid::new(prefix(2), EntityId::new([0, 0, 0], 0x02));
        assert!(low_prefix < high_prefix);

        // Same prefix: kind dominates key
        let writer = Guid::new(prefix(1), EntityId::new([0, 0, 9], 0x02));
        let reader = Guid::new(prefix(1), EntityId::new([0, 0, 1], 0x07));
        assert!(writer < reader);

        let a = Guid::new(prefix(1), EntityId::new([0, 0, 1], 0x02));
        let b = Guid::new(prefix(1), EntityId::new([0, 0, 2], 0x02));
        assert!(a < b);
    }

    #[test]
    fn test_entity_kind_predicates() {
        assert!(ENTITYID_SPDP_BUILTIN_PARTICIPANT_WRITER.is_writer());
        assert!(ENTITYID_SEDP_BUILTIN_SUBSCRIPTIONS_READER.is_reader());
        assert!(EntityId::new([0, 0, 1], entity_kind::USER_WRITER_NO_KEY).is_writer());
        assert!(!ENTITYID_PARTICIPANT.is_writer());
        assert!(!ENTITYID_PARTICIPANT.is_reader());
        assert!(ENTITYID_UNKNOWN.is_unknown());
    }
}
