// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type for the RTPS behaviour core.
//!
//! Every cache, proxy and state machine operation reports a status outcome
//! through [`Result`]. Nothing in the protocol path panics: unknown events are
//! no-ops, and contract violations are surfaced to the caller.

use crate::types::Guid;

/// RTPS core error.
///
/// # Example
///
/// ```rust
/// use hdds_rtps::{Error, HistoryCache, SequenceNumber, Guid};
///
/// let mut cache = HistoryCache::new();
/// match cache.remove_change(&Guid::unknown(), SequenceNumber::new(7)) {
///     Err(Error::PreconditionViolated(msg)) => println!("rejected: {}", msg),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // Contract Errors
    // ========================================================================
    /// Operation invoked on a cache/proxy in a state that does not support it
    /// (duplicate sequence number, removing an absent change, ...).
    PreconditionViolated(String),
    /// An action's own invariant check failed after it ran.
    PostconditionViolated(String),
    /// Event names a proxy or endpoint that is not (or no longer) matched.
    UnknownEndpoint(Guid),

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// Malformed or mismatched-protocol input; the packet is dropped.
    PacketInvalid(String),
    /// Submessage content could not be interpreted.
    DeserializeFailed(String),

    // ========================================================================
    // Runtime Outcomes
    // ========================================================================
    /// Cache is empty on a pull (`take`).
    NoData,
    /// A bounded wait elapsed without the awaited condition.
    Timeout,

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Endpoint configuration rejected by validation.
    InvalidConfig(String),
    /// Feature explicitly unsupported (fragmentation, reliable stateless readers).
    NotYetImplemented(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Contract
            Error::PreconditionViolated(msg) => write!(f, "Precondition violated: {}", msg),
            Error::PostconditionViolated(msg) => write!(f, "Postcondition violated: {}", msg),
            Error::UnknownEndpoint(guid) => write!(f, "Unknown or unmatched endpoint: {}", guid),
            // Input
            Error::PacketInvalid(msg) => write!(f, "Invalid packet: {}", msg),
            Error::DeserializeFailed(msg) => write!(f, "Deserialization failed: {}", msg),
            // Runtime
            Error::NoData => write!(f, "No data available"),
            Error::Timeout => write!(f, "Timeout"),
            // Other
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::NotYetImplemented(what) => write!(f, "Not yet implemented: {}", what),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = Error::PreconditionViolated("sequence number 3 already cached".into());
        assert_eq!(
            err.to_string(),
            "Precondition violated: sequence number 3 already cached"
        );
        assert_eq!(Error::NoData.to_string(), "No data available");
    }

    #[test]
    fn test_unknown_endpoint_formats_guid() {
        let guid = Guid::unknown();
        let msg = Error::UnknownEndpoint(guid).to_string();
        assert!(msg.contains("00.00.00.00"));
    }
}
