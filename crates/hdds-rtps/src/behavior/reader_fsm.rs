// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader transition functions (DDS-RTPS v2.5 Sec.8.4.11 / 8.4.12).
//!
//! Two regions:
//! - lifecycle: `initial -> waiting` (best-effort) or `initial -> ready`
//!   (reliable), `-> final` on deletion; selects which action a received
//!   Data/Heartbeat/Gap triggers
//! - ack obligation, one per matched writer: `waiting / may_ack / must_ack`
//!
//! Pairs without a transition are no-ops: same state, no action.

/// Reader lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderPhase {
    Initial,
    Waiting,
    Ready,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderEvent {
    Created,
    DataReceived,
    HeartbeatReceived,
    GapReceived,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderAction {
    None,
    AcceptData,
    ApplyHeartbeat,
    ApplyGap,
    Release,
}

/// Lifecycle transition. Best-effort readers ignore Heartbeat and Gap.
pub fn reader_transition(
    reliable: bool,
    state: ReaderPhase,
    event: ReaderEvent,
) -> (ReaderPhase, ReaderAction) {
    use ReaderAction as A;
    use ReaderEvent as E;
    use ReaderPhase as S;

    match (state, event) {
        (S::Initial, E::Created) if reliable => (S::Ready, A::None),
        (S::Initial, E::Created) => (S::Waiting, A::None),
        (S::Waiting, E::DataReceived) if !reliable => (S::Waiting, A::AcceptData),
        (S::Ready, E::DataReceived) if reliable => (S::Ready, A::AcceptData),
        (S::Ready, E::HeartbeatReceived) if reliable => (S::Ready, A::ApplyHeartbeat),
        (S::Ready, E::GapReceived) if reliable => (S::Ready, A::ApplyGap),
        (S::Final, E::Deleted) => (S::Final, A::None),
        (_, E::Deleted) => (S::Final, A::Release),
        (s, _) => (s, A::None),
    }
}

/// Ack obligation towards one matched writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckState {
    Waiting,
    /// Final heartbeat seen; an AckNack is owed only if something is missing.
    MayAck,
    /// Response timer armed. `required`: a non-final heartbeat demands an
    /// AckNack even with nothing missing.
    MustAck { required: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckEvent {
    HeartbeatReceived { final_flag: bool, liveliness_flag: bool },
    /// Result of checking the writer proxy's missing set after a change.
    MissingChecked { has_missing: bool },
    ResponseDelayElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckAction {
    None,
    ArmResponseTimer,
    SendAckNack,
    DisarmResponseTimer,
}

/// Ack region transition.
///
/// - non-final heartbeat: must acknowledge (an empty set is a valid positive ack)
/// - final heartbeat, not liveliness-only: may acknowledge, depending on the
///   missing set
/// - final liveliness heartbeat: nothing owed
pub fn ack_transition(state: AckState, event: AckEvent) -> (AckState, AckAction) {
    use AckAction as A;
    use AckEvent as E;
    use AckState as S;

    match (state, event) {
        (
            S::Waiting | S::MayAck,
            E::HeartbeatReceived {
                final_flag: false, ..
            },
        ) => (S::MustAck { required: true }, A::ArmResponseTimer),
        (
            S::Waiting,
            E::HeartbeatReceived {
                final_flag: true,
                liveliness_flag: false,
            },
        ) => (S::MayAck, A::None),
        (
            S::MustAck { .. },
            E::HeartbeatReceived {
                final_flag: false, ..
            },
        ) => (S::MustAck { required: true }, A::None),

        (S::MayAck, E::MissingChecked { has_missing: true }) => {
            (S::MustAck { required: false }, A::ArmResponseTimer)
        }
        (S::MayAck, E::MissingChecked { has_missing: false }) => (S::Waiting, A::None),
        (S::MustAck { required: false }, E::MissingChecked { has_missing: false }) => {
            (S::Waiting, A::DisarmResponseTimer)
        }

        (S::MustAck { .. }, E::ResponseDelayElapsed) => (S::Waiting, A::SendAckNack),

        (s, _) => (s, A::None),
    }
}
