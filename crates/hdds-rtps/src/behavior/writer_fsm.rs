// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer transition functions (DDS-RTPS v2.5 Sec.8.4.8 / 8.4.9).
//!
//! Each matched reader (or reader locator) runs three regions in parallel:
//! - push: `initial -> idle <-> pushing -> final`
//! - announce: `idle <-> announcing` (reliable only)
//! - repair: `waiting -> must_repair -> repairing -> waiting` (reliable only)
//!
//! Pairs without a transition are no-ops: same state, no action.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushState {
    Initial,
    Idle,
    Pushing,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushEvent {
    Configured,
    UnsentChanges,
    CanSend,
    UnsentChangesEmpty,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushAction {
    None,
    SendNextUnsent,
}

pub fn push_transition(state: PushState, event: PushEvent) -> (PushState, PushAction) {
    use PushAction as A;
    use PushEvent as E;
    use PushState as S;

    match (state, event) {
        (S::Initial, E::Configured) => (S::Idle, A::None),
        (S::Idle, E::UnsentChanges) => (S::Pushing, A::None),
        (S::Pushing, E::CanSend) => (S::Pushing, A::SendNextUnsent),
        (S::Pushing, E::UnsentChangesEmpty) => (S::Idle, A::None),
        (_, E::Released) => (S::Final, A::None),
        (s, _) => (s, A::None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnounceState {
    Idle,
    Announcing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnounceEvent {
    UnackedChanges,
    UnackedChangesEmpty,
    AfterHeartbeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnounceAction {
    None,
    SendHeartbeat,
}

pub fn announce_transition(
    state: AnnounceState,
    event: AnnounceEvent,
) -> (AnnounceState, AnnounceAction) {
    use AnnounceAction as A;
    use AnnounceEvent as E;
    use AnnounceState as S;

    match (state, event) {
        (S::Idle, E::UnackedChanges) => (S::Announcing, A::None),
        (S::Announcing, E::UnackedChangesEmpty) => (S::Idle, A::None),
        (S::Announcing, E::AfterHeartbeat) => (S::Announcing, A::SendHeartbeat),
        (s, _) => (s, A::None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepairState {
    Waiting,
    MustRepair,
    Repairing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepairEvent {
    /// AckNack applied; `has_requested` reflects the proxy afterwards.
    AckNack { has_requested: bool },
    AfterNackDelay,
    CanSend,
    RequestedChangesEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepairAction {
    None,
    ArmNackDelay,
    DisarmNackDelay,
    SendNextRequested,
}

/// Repair region. An AckNack that leaves nothing requested always returns
/// to `waiting`, never to `must_repair`.
pub fn repair_transition(state: RepairState, event: RepairEvent) -> (RepairState, RepairAction) {
    use RepairAction as A;
    use RepairEvent as E;
    use RepairState as S;

    match (state, event) {
        (S::Waiting, E::AckNack { has_requested: true }) => (S::MustRepair, A::ArmNackDelay),
        (S::MustRepair, E::AckNack { has_requested: false }) => (S::Waiting, A::DisarmNackDelay),
        (S::Repairing, E::AckNack { has_requested: false }) => (S::Waiting, A::None),
        (S::MustRepair, E::AfterNackDelay) => (S::Repairing, A::None),
        (S::Repairing, E::CanSend) => (S::Repairing, A::SendNextRequested),
        (S::Repairing, E::RequestedChangesEmpty) => (S::Waiting, A::None),
        (s, _) => (s, A::None),
    }
}
