// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inline QoS parameter lists.
//!
//! Only the parameters the behaviour core reads are interpreted
//! (`PID_KEY_HASH`, `PID_STATUS_INFO`); everything else is carried opaque.

/// Parameter ID: key hash (16 bytes).
pub const PID_KEY_HASH: u16 = 0x0070;
/// Parameter ID: status info (4 bytes, flags in the last octet).
pub const PID_STATUS_INFO: u16 = 0x0071;
/// Parameter ID: list terminator.
pub const PID_SENTINEL: u16 = 0x0001;

/// Status info flag: instance disposed.
pub const STATUS_INFO_DISPOSED: u8 = 0x01;
/// Status info flag: instance unregistered.
pub const STATUS_INFO_UNREGISTERED: u8 = 0x02;

/// One `(pid, value)` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub id: u16,
    pub value: Vec<u8>,
}

/// Ordered parameter list (no sentinel stored).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterList {
    parameters: Vec<Parameter>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: u16, value: Vec<u8>) {
        self.parameters.push(Parameter { id, value });
    }

    /// First parameter with the given ID.
    pub fn get(&self, id: u16) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn with_key_hash(mut self, key_hash: [u8; 16]) -> Self {
        self.push(PID_KEY_HASH, key_hash.to_vec());
        self
    }

    pub fn with_status_info(mut self, flags: u8) -> Self {
        self.push(PID_STATUS_INFO, vec![0, 0, 0, flags]);
        self
    }

    /// Key hash, if present and well-formed.
    pub fn key_hash(&self) -> Option<[u8; 16]> {
        let param = self.get(PID_KEY_HASH)?;
        param.value.as_slice().try_into().ok()
    }

    /// Status info flags octet, if present and well-formed.
    pub fn status_info(&self) -> Option<u8> {
        let param = self.get(PID_STATUS_INFO)?;
        if param.value.len() != 4 {
            return None;
        }
        Some(param.value[3])
    }
}
