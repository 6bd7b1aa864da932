// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Deadline-ordered timer queue.
//!
//! Arming a key that is already armed replaces it. Disarm is lazy: the map
//! of live generations is the source of truth and stale heap entries are
//! skipped when they surface.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use crate::behavior::TimerKey;
use crate::types::Guid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Scheduled {
    deadline: Instant,
    generation: u64,
    key: TimerKey,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    generation: u64,
    period: Option<Duration>,
}

/// One-shot and periodic timers keyed by [`TimerKey`].
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    armed: HashMap<TimerKey, Armed>,
    next_generation: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire `after` from `now`, then every `period` if given.
    pub fn arm(&mut self, key: TimerKey, now: Instant, after: Duration, period: Option<Duration>) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.armed.insert(key, Armed { generation, period });
        self.heap.push(Reverse(Scheduled {
            deadline: now + after,
            generation,
            key,
        }));
    }

    /// Returns whether the key was armed.
    pub fn disarm(&mut self, key: &TimerKey) -> bool {
        self.armed.remove(key).is_some()
    }

    /// Disarm every timer owned by `endpoint`.
    pub fn disarm_endpoint(&mut self, endpoint: &Guid) {
        self.armed.retain(|key, _| key.endpoint != *endpoint);
    }

    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.armed.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    fn is_live(&self, entry: &Scheduled) -> bool {
        self.armed
            .get(&entry.key)
            .is_some_and(|a| a.generation == entry.generation)
    }

    /// Earliest live deadline.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse(top)) = self.heap.peek().copied() {
            if self.is_live(&top) {
                return Some(top.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Remove and return every key due at `now`, in deadline order.
    /// Periodic timers are re-armed for their next period.
    pub fn pop_due(&mut self, now: Instant) -> Vec<TimerKey> {
        let mut due = Vec::new();
        while let Some(Reverse(top)) = self.heap.peek().copied() {
            if top.deadline > now {
                break;
            }
            self.heap.pop();
            if !self.is_live(&top) {
                continue;
            }
            due.push(top.key);
            match self.armed.get(&top.key).and_then(|a| a.period) {
                Some(period) => {
                    // A late pump must not replay every missed period
                    let mut deadline = top.deadline + period;
                    if deadline <= now {
                        deadline = now + period;
                    }
                    self.heap.push(Reverse(Scheduled { deadline, ..top }));
                }
                None => {
                    self.armed.remove(&top.key);
                }
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::TimerKind;
    use crate::types::{entity_kind, EntityId, GuidPrefix};

    fn key(kind: TimerKind) -> TimerKey {
        let guid = Guid::new(
            GuidPrefix([1; 12]),
            EntityId::new([0, 0, 1], entity_kind::USER_WRITER_NO_KEY),
        );
        TimerKey::new(guid, kind)
    }

    #[test]
    fn test_one_shot_fires_once() {
        let t0 = Instant::now();
        let mut q = TimerQueue::new();
        q.arm(key(TimerKind::ResendData), t0, Duration::from_millis(10), None);
        assert!(q.pop_due(t0).is_empty());
        assert_eq!(q.next_deadline(), Some(t0 + Duration::from_millis(10)));
        assert_eq!(q.pop_due(t0 + Duration::from_millis(10)).len(), 1);
        assert!(q.is_empty());
        assert_eq!(q.next_deadline(), None);
    }

    #[test]
    fn test_periodic_rearms() {
        let t0 = Instant::now();
        let period = Duration::from_millis(5);
        let mut q = TimerQueue::new();
        q.arm(key(TimerKind::Heartbeat), t0, period, Some(period));
        assert_eq!(q.pop_due(t0 + period).len(), 1);
        assert_eq!(q.next_deadline(), Some(t0 + period * 2));
        // Far behind: one firing, next deadline one period after now
        let late = t0 + Duration::from_secs(1);
        assert_eq!(q.pop_due(late).len(), 1);
        assert_eq!(q.next_deadline(), Some(late + period));
    }

    #[test]
    fn test_disarm_and_rearm_generation() {
        let t0 = Instant::now();
        let k = key(TimerKind::Heartbeat);
        let mut q = TimerQueue::new();
        q.arm(k, t0, Duration::from_millis(1), None);
        assert!(q.disarm(&k));
        assert!(!q.disarm(&k));
        assert!(q.pop_due(t0 + Duration::from_secs(1)).is_empty());

        // Re-arming replaces the earlier deadline
        q.arm(k, t0, Duration::from_millis(1), None);
        q.arm(k, t0, Duration::from_millis(50), None);
        assert!(q.pop_due(t0 + Duration::from_millis(10)).is_empty());
        assert_eq!(q.pop_due(t0 + Duration::from_millis(50)), vec![k]);
    }

    #[test]
    fn test_disarm_endpoint_and_order() {
        let t0 = Instant::now();
        let mut q = TimerQueue::new();
        let a = key(TimerKind::ResendData);
        let b = key(TimerKind::Heartbeat);
        q.arm(a, t0, Duration::from_millis(2), None);
        q.arm(b, t0, Duration::from_millis(1), None);
        assert_eq!(q.pop_due(t0 + Duration::from_millis(3)), vec![b, a]);

        q.arm(a, t0, Duration::from_millis(2), None);
        q.arm(b, t0, Duration::from_millis(1), Some(Duration::from_millis(1)));
        q.disarm_endpoint(&a.endpoint);
        assert!(q.is_empty());
        assert!(q.pop_due(t0 + Duration::from_secs(1)).is_empty());
    }
}
