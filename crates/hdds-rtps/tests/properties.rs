// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::cast_sign_loss)] // Test data conversions
#![allow(clippy::cast_possible_wrap)] // Test conversions
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure

//! Randomized properties of the cache, the proxies and the reliable
//! protocol under loss. Seeds are fixed so failures reproduce.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use parking_lot::Mutex;

use hdds_rtps::config::{HistoryKind, ReaderConfig, TopicKind, WriterConfig};
use hdds_rtps::messages::{SequenceNumberSet, Submessage};
use hdds_rtps::proxy::{ChangeFromWriterStatus, ReaderProxy, WriterProxy};
use hdds_rtps::runtime::{Datagram, EventPump, LoopbackNetwork, Participant};
use hdds_rtps::types::{entity_kind, InstanceHandle, HANDLE_NIL};
use hdds_rtps::{CacheChange, ChangeKind, EntityId, Guid, GuidPrefix, HistoryCache, Locator, SequenceNumber};

fn sn(value: i64) -> SequenceNumber {
    SequenceNumber::new(value)
}

fn writer_guid() -> Guid {
    Guid::new(
        GuidPrefix([7; 12]),
        EntityId::new([0, 0, 1], entity_kind::USER_WRITER_NO_KEY),
    )
}

// ---------------------------------------------------------------------------
// HistoryCache
// ---------------------------------------------------------------------------

#[test]
fn test_add_then_remove_restores_cache() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let writer = writer_guid();
    let mut cache = HistoryCache::with_history(HistoryKind::KeepAll);
    let mut next = 1_i64;

    for _ in 0..500 {
        // Random prefill, with holes
        if rng.bool() {
            next += rng.i64(1..4);
            let change = CacheChange::new(
                ChangeKind::Alive,
                writer,
                HANDLE_NIL,
                sn(next),
                vec![rng.u8(..)],
            );
            cache.add_change(change).expect("unique sequence number");
        }

        let before = cache.len();
        next += 1;
        let change = CacheChange::new(
            ChangeKind::Alive,
            writer,
            InstanceHandle([rng.u8(..); 16]),
            sn(next),
            vec![rng.u8(..); rng.usize(0..32)],
        );
        assert_eq!(cache.add_change(change.clone()).expect("add"), None);
        assert!(cache.add_change(change.clone()).is_err(), "duplicate accepted");
        let removed = cache.remove_change(&writer, sn(next)).expect("remove");
        assert_eq!(removed, change);
        assert_eq!(cache.len(), before);
    }
}

// ---------------------------------------------------------------------------
// WriterProxy
// ---------------------------------------------------------------------------

fn snapshot(proxy: &WriterProxy, upto: i64) -> BTreeMap<i64, ChangeFromWriterStatus> {
    (1..=upto)
        .map(|s| (s, proxy.status(sn(s))))
        .filter(|(_, status)| {
            matches!(
                status,
                ChangeFromWriterStatus::Received | ChangeFromWriterStatus::Lost
            )
        })
        .collect()
}

#[test]
fn test_heartbeats_never_regress_resolved_changes() {
    for seed in 1..=20 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut proxy = WriterProxy::new(writer_guid(), vec![], vec![]);
        for _ in 0..200 {
            match rng.u8(0..3) {
                0 => {
                    proxy.on_data_received(sn(rng.i64(1..=64)));
                }
                1 => {
                    let start = rng.i64(1..=64);
                    let end = start + rng.i64(0..4);
                    proxy.on_gap(sn(start), &SequenceNumberSet::empty(sn(end)));
                }
                _ => {
                    let before = snapshot(&proxy, 64);
                    let max_before = proxy.available_changes_max();
                    for _ in 0..rng.usize(1..4) {
                        let first = rng.i64(1..=64);
                        let last = first - 1 + rng.i64(0..16);
                        proxy.on_heartbeat(sn(first), sn(last));
                    }
                    let after = snapshot(&proxy, 64);
                    for (seq, status) in &before {
                        assert_eq!(after.get(seq), Some(status), "seed {} seq {}", seed, seq);
                    }
                    assert!(proxy.available_changes_max() >= max_before);
                }
            }
        }
    }
}

#[test]
fn test_gap_is_idempotent() {
    let mut rng = fastrand::Rng::with_seed(42);
    for _ in 0..100 {
        let mut proxy = WriterProxy::new(writer_guid(), vec![], vec![]);
        proxy.on_heartbeat(sn(1), sn(rng.i64(1..40)));
        for _ in 0..rng.usize(0..10) {
            proxy.on_data_received(sn(rng.i64(1..40)));
        }
        let start = rng.i64(1..40);
        let gap_list = SequenceNumberSet::empty(sn(start + rng.i64(1..8)));

        proxy.on_gap(sn(start), &gap_list);
        let once: Vec<_> = (1..48)
            .map(|s| (proxy.status(sn(s)), proxy.is_relevant(sn(s))))
            .collect();
        let max_once = proxy.available_changes_max();
        proxy.on_gap(sn(start), &gap_list);
        let twice: Vec<_> = (1..48)
            .map(|s| (proxy.status(sn(s)), proxy.is_relevant(sn(s))))
            .collect();
        assert_eq!(once, twice);
        assert_eq!(max_once, proxy.available_changes_max());
    }
}

// ---------------------------------------------------------------------------
// Reliable protocol under loss
// ---------------------------------------------------------------------------

struct Lossy {
    net: Arc<LoopbackNetwork>,
    publisher: Participant,
    pub_inbox: Receiver<Datagram>,
    subscriber: Participant,
    sub_inbox: Receiver<Datagram>,
    writer: Guid,
    reader: Guid,
    now: Instant,
}

impl Lossy {
    fn new(writer_config: WriterConfig, reader_config: ReaderConfig) -> Self {
        let net = LoopbackNetwork::new();
        let pub_locator = Locator::udpv4(Ipv4Addr::new(10, 1, 0, 1), 7500);
        let sub_locator = Locator::udpv4(Ipv4Addr::new(10, 1, 0, 2), 7500);
        let (pub_transport, pub_inbox) = net.bind(pub_locator).expect("bind");
        let (sub_transport, sub_inbox) = net.bind(sub_locator).expect("bind");
        let publisher = Participant::new(GuidPrefix([1; 12]), Arc::new(pub_transport));
        let subscriber = Participant::new(GuidPrefix([2; 12]), Arc::new(sub_transport));

        let writer = publisher
            .create_writer(writer_config, TopicKind::NoKey)
            .expect("writer");
        let reader = subscriber
            .create_reader(reader_config, TopicKind::NoKey)
            .expect("reader");
        publisher
            .matched_reader_add(&writer, ReaderProxy::new(reader, vec![sub_locator], vec![], true))
            .expect("match reader");
        subscriber
            .matched_writer_add(&reader, WriterProxy::new(writer, vec![pub_locator], vec![]))
            .expect("match writer");
        Self {
            net,
            publisher,
            pub_inbox,
            subscriber,
            sub_inbox,
            writer,
            reader,
            now: Instant::now(),
        }
    }

    fn drop_randomly(&self, seed: u64, percent: u8) -> Arc<AtomicUsize> {
        let rng = Mutex::new(fastrand::Rng::with_seed(seed));
        let dropped = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&dropped);
        self.net.set_filter(Arc::new(move |_: &Datagram| {
            let keep = rng.lock().u8(0..100) >= percent;
            if !keep {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            keep
        }));
        dropped
    }

    fn step(&mut self, by: Duration) {
        self.now += by;
        self.publisher.fire_due_timers(self.now).expect("timers");
        self.subscriber.fire_due_timers(self.now).expect("timers");
        for _ in 0..64 {
            let mut handled = 0;
            for datagram in self.sub_inbox.try_iter() {
                self.subscriber
                    .receive_at(&datagram.message, Some(datagram.source), self.now)
                    .expect("valid message");
                handled += 1;
            }
            for datagram in self.pub_inbox.try_iter() {
                self.publisher
                    .receive_at(&datagram.message, Some(datagram.source), self.now)
                    .expect("valid message");
                handled += 1;
            }
            if handled == 0 {
                break;
            }
        }
    }

    fn cached(&self) -> usize {
        self.subscriber
            .inspect_reader(&self.reader, |r| r.cache().len())
            .expect("reader")
    }
}

fn fast_reliable() -> (WriterConfig, ReaderConfig) {
    (
        WriterConfig::reliable()
            .with_heartbeat_period(Duration::from_millis(20))
            .with_nack_response_delay(Duration::from_millis(5)),
        ReaderConfig::reliable().with_heartbeat_response_delay(Duration::from_millis(5)),
    )
}

#[test]
fn test_reliable_delivery_under_random_loss() {
    const SAMPLES: u8 = 40;
    for seed in 1..=5 {
        let (writer_config, reader_config) = fast_reliable();
        let mut link = Lossy::new(writer_config, reader_config);
        let dropped = link.drop_randomly(seed, 30);

        for i in 1..=SAMPLES {
            link.publisher
                .write(&link.writer, vec![i], HANDLE_NIL)
                .expect("write");
            if i % 8 == 0 {
                link.step(Duration::from_millis(3));
            }
        }
        let mut steps = 0;
        while link.cached() < usize::from(SAMPLES) {
            steps += 1;
            assert!(steps < 2_000, "seed {}: no convergence", seed);
            link.step(Duration::from_millis(10));
        }
        assert!(dropped.load(Ordering::Relaxed) > 0, "seed {} lost nothing", seed);

        let taken: Vec<u8> = link
            .subscriber
            .take_all(&link.reader)
            .expect("reader")
            .iter()
            .map(|c| c.data()[0])
            .collect();
        assert_eq!(taken, (1..=SAMPLES).collect::<Vec<_>>(), "seed {}", seed);

        // Lossless tail: the last acknowledgements get through and the
        // writer releases its volatile history
        link.net.clear_filter();
        for _ in 0..20 {
            link.step(Duration::from_millis(10));
        }
        let empty = link
            .publisher
            .inspect_writer(&link.writer, |w| w.cache().is_empty())
            .expect("writer");
        assert!(empty, "seed {}: history not released", seed);
    }
}

#[test]
fn test_best_effort_delivers_ordered_subset_without_feedback() {
    for seed in 1..=5 {
        let mut link = Lossy::new(WriterConfig::best_effort(), ReaderConfig::best_effort());
        let sub_source = Locator::udpv4(Ipv4Addr::new(10, 1, 0, 2), 7500);
        let feedback = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&feedback);
        let rng = Mutex::new(fastrand::Rng::with_seed(seed));
        link.net.set_filter(Arc::new(move |d: &Datagram| {
            if d.source == sub_source {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            rng.lock().u8(0..100) >= 30
        }));

        for i in 1..=50_u8 {
            link.publisher
                .write(&link.writer, vec![i], HANDLE_NIL)
                .expect("write");
        }
        for _ in 0..20 {
            link.step(Duration::from_millis(50));
        }

        let taken: Vec<u8> = link
            .subscriber
            .take_all(&link.reader)
            .expect("reader")
            .iter()
            .map(|c| c.data()[0])
            .collect();
        assert!(!taken.is_empty() && taken.len() < 50, "seed {}: {}", seed, taken.len());
        assert!(taken.windows(2).all(|w| w[0] < w[1]), "seed {}", seed);
        assert_eq!(feedback.load(Ordering::Relaxed), 0);
        assert_eq!(link.publisher.metrics().snapshot().heartbeats_sent, 0);
    }
}

#[test]
fn test_event_pumps_repair_loss_in_real_time() {
    let (writer_config, reader_config) = fast_reliable();
    let link = Lossy::new(writer_config, reader_config);
    let Lossy {
        net,
        publisher,
        pub_inbox,
        subscriber,
        sub_inbox,
        writer,
        reader,
        ..
    } = link;

    // Lose the first DATA(2)
    let lost = AtomicBool::new(false);
    net.set_filter(Arc::new(move |d: &Datagram| {
        let carries_two = d
            .message
            .submessages
            .iter()
            .any(|s| matches!(s, Submessage::Data(data) if data.writer_sn == SequenceNumber::new(2)));
        !(carries_two && !lost.swap(true, Ordering::Relaxed))
    }));

    let publisher = Arc::new(publisher);
    let subscriber = Arc::new(subscriber);
    let pub_pump = EventPump::new(Arc::clone(&publisher), pub_inbox);
    let sub_pump = EventPump::new(Arc::clone(&subscriber), sub_inbox);
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| {
            // Ends through `done`; a timeout here only means the subscriber gave up first
            let _ = pub_pump.run_until(Duration::from_secs(5), || done.load(Ordering::Acquire));
        });

        for i in 1..=3_u8 {
            publisher.write(&writer, vec![i], HANDLE_NIL).expect("write");
        }
        let result = sub_pump.run_until(Duration::from_secs(5), || {
            subscriber
                .inspect_reader(&reader, |r| r.cache().len() == 3)
                .unwrap_or(false)
        });
        done.store(true, Ordering::Release);
        result.expect("repaired before the deadline");
    });

    let taken: Vec<u8> = subscriber
        .take_all(&reader)
        .expect("reader")
        .iter()
        .map(|c| c.data()[0])
        .collect();
    assert_eq!(taken, vec![1, 2, 3]);
}
