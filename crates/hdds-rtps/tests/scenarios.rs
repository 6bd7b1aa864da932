// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::cast_sign_loss)] // Test data conversions
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure
#![allow(clippy::too_many_lines)] // Example/test code

//! End-to-end reliability scenarios between two participants on the
//! loopback network, stepped in virtual time.
//!
//! Scenarios:
//! A. Heartbeat announcing 1..5 to a fresh reader marks all of them missing
//! B. Data(3) then resolves only seq 3
//! C. The AckNack {1,2,4,5} is answered with exactly those four as Data
//! D. Gap(6, {8}) resolves 6, 7 and 8 as irrelevant, idempotently

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use parking_lot::Mutex;

use hdds_rtps::config::{DurabilityKind, ReaderConfig, TopicKind, WriterConfig};
use hdds_rtps::messages::{
    DataSubmessage, GapSubmessage, Message, SequenceNumberSet, Submessage,
};
use hdds_rtps::proxy::{ChangeFromWriterStatus, ReaderProxy, WriterProxy};
use hdds_rtps::runtime::{Datagram, LoopbackNetwork, Participant};
use hdds_rtps::types::{GuidPrefix, HANDLE_NIL};
use hdds_rtps::{Guid, Locator, SequenceNumber};

const PUB_PREFIX: GuidPrefix = GuidPrefix([0x11; 12]);
const SUB_PREFIX: GuidPrefix = GuidPrefix([0x22; 12]);

fn sn(value: i64) -> SequenceNumber {
    SequenceNumber::new(value)
}

struct Link {
    net: Arc<LoopbackNetwork>,
    publisher: Participant,
    pub_inbox: Receiver<Datagram>,
    pub_locator: Locator,
    subscriber: Participant,
    sub_inbox: Receiver<Datagram>,
    writer: Guid,
    reader: Guid,
    now: Instant,
}

impl Link {
    fn new(writer_config: WriterConfig, reader_config: ReaderConfig) -> Self {
        let net = LoopbackNetwork::new();
        let pub_locator = Locator::udpv4(Ipv4Addr::new(10, 0, 0, 1), 7411);
        let sub_locator = Locator::udpv4(Ipv4Addr::new(10, 0, 0, 2), 7411);
        let (pub_transport, pub_inbox) = net.bind(pub_locator).expect("bind publisher");
        let (sub_transport, sub_inbox) = net.bind(sub_locator).expect("bind subscriber");
        let publisher = Participant::new(PUB_PREFIX, Arc::new(pub_transport));
        let subscriber = Participant::new(SUB_PREFIX, Arc::new(sub_transport));

        let writer = publisher
            .create_writer(writer_config, TopicKind::NoKey)
            .expect("writer");
        let reader = subscriber
            .create_reader(reader_config, TopicKind::NoKey)
            .expect("reader");
        let now = Instant::now();
        Self {
            net,
            publisher,
            pub_inbox,
            pub_locator,
            subscriber,
            sub_inbox,
            writer,
            reader,
            now,
        }
    }

    fn match_endpoints(&self, push_mode: bool) {
        let sub_locator = Locator::udpv4(Ipv4Addr::new(10, 0, 0, 2), 7411);
        self.publisher
            .matched_reader_add(
                &self.writer,
                ReaderProxy::new(self.reader, vec![sub_locator], vec![], push_mode),
            )
            .expect("match reader");
        self.subscriber
            .matched_writer_add(
                &self.reader,
                WriterProxy::new(self.writer, vec![self.pub_locator], vec![]),
            )
            .expect("match writer");
    }

    fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    fn fire_publisher(&self) -> usize {
        self.publisher.fire_due_timers(self.now).expect("publisher timers")
    }

    fn fire_subscriber(&self) -> usize {
        self.subscriber.fire_due_timers(self.now).expect("subscriber timers")
    }

    fn pump_subscriber(&self) -> usize {
        pump(&self.subscriber, &self.sub_inbox, self.now)
    }

    fn pump_publisher(&self) -> usize {
        pump(&self.publisher, &self.pub_inbox, self.now)
    }

    /// Fire both sides, then exchange traffic until the link is quiet.
    fn step(&mut self, by: Duration) {
        self.advance(by);
        self.fire_publisher();
        self.fire_subscriber();
        for _ in 0..64 {
            if self.pump_subscriber() + self.pump_publisher() == 0 {
                break;
            }
        }
    }

    fn status(&self, seq: i64) -> ChangeFromWriterStatus {
        self.subscriber
            .inspect_reader(&self.reader, |r| {
                r.matched_writer(&self.writer).map(|p| p.status(sn(seq)))
            })
            .expect("reader")
            .expect("writer proxy")
    }

    fn is_relevant(&self, seq: i64) -> bool {
        self.subscriber
            .inspect_reader(&self.reader, |r| {
                r.matched_writer(&self.writer).map(|p| p.is_relevant(sn(seq)))
            })
            .expect("reader")
            .expect("writer proxy")
    }

    fn inject(&self, submessage: Submessage) {
        let message = Message::with_submessages(PUB_PREFIX, vec![submessage]);
        let summary = self
            .subscriber
            .receive_at(&message, Some(self.pub_locator), self.now)
            .expect("valid message");
        assert_eq!(summary.delivered, 1, "{:?}", summary);
    }

    fn cached(&self) -> usize {
        self.subscriber
            .inspect_reader(&self.reader, |r| r.cache().len())
            .expect("reader")
    }
}

fn pump(participant: &Participant, inbox: &Receiver<Datagram>, now: Instant) -> usize {
    let mut handled = 0;
    for datagram in inbox.try_iter() {
        participant
            .receive_at(&datagram.message, Some(datagram.source), now)
            .expect("valid message");
        handled += 1;
    }
    handled
}

/// Record DATA and GAP sequence numbers leaving `from`.
fn record_from(net: &LoopbackNetwork, from: Locator) -> Arc<Mutex<(Vec<i64>, Vec<i64>)>> {
    let seen = Arc::new(Mutex::new((Vec::new(), Vec::new())));
    let sink = Arc::clone(&seen);
    net.set_filter(Arc::new(move |datagram: &Datagram| {
        if datagram.source == from {
            let mut seen = sink.lock();
            for submessage in &datagram.message.submessages {
                match submessage {
                    Submessage::Data(d) => seen.0.push(d.writer_sn.value()),
                    Submessage::Gap(g) => {
                        seen.1.extend(g.irrelevant_sequences().map(SequenceNumber::value));
                    }
                    _ => {}
                }
            }
        }
        true
    }));
    seen
}

fn data(link: &Link, seq: i64) -> Submessage {
    Submessage::Data(DataSubmessage {
        reader_id: link.reader.entity_id,
        writer_id: link.writer.entity_id,
        writer_sn: sn(seq),
        inline_qos: None,
        serialized_payload: Arc::from(vec![seq as u8]),
        data_flag: true,
        key_flag: false,
    })
}

#[test]
fn test_heartbeat_data_acknack_gap_sequence() {
    let writer_config = WriterConfig::reliable()
        .with_durability(DurabilityKind::TransientLocal)
        .with_heartbeat_period(Duration::from_millis(100))
        .with_nack_response_delay(Duration::from_millis(20));
    let reader_config =
        ReaderConfig::reliable().with_heartbeat_response_delay(Duration::from_millis(50));
    let mut link = Link::new(writer_config, reader_config);

    for i in 1..=5_u8 {
        link.publisher
            .write(&link.writer, vec![i], HANDLE_NIL)
            .expect("write");
    }
    // Pull mode: nothing is pushed, the heartbeat announces the history
    link.match_endpoints(false);
    assert_eq!(link.pump_subscriber(), 0);

    // A: heartbeat [1, 5] to a fresh reader
    link.advance(Duration::from_millis(100));
    assert_eq!(link.fire_publisher(), 1);
    assert_eq!(link.pump_subscriber(), 1);
    for seq in 1..=5 {
        assert_eq!(link.status(seq), ChangeFromWriterStatus::Missing, "seq {}", seq);
    }
    assert_eq!(link.cached(), 0);

    // B: Data(3) resolves only seq 3
    link.inject(data(&link, 3));
    assert_eq!(link.status(3), ChangeFromWriterStatus::Received);
    for seq in [1, 2, 4, 5] {
        assert_eq!(link.status(seq), ChangeFromWriterStatus::Missing, "seq {}", seq);
    }

    // C: the delayed AckNack requests 1, 2, 4, 5
    link.advance(Duration::from_millis(50));
    assert_eq!(link.fire_subscriber(), 1);
    assert_eq!(link.pump_publisher(), 1);
    let requested = link
        .publisher
        .inspect_writer(&link.writer, |w| {
            w.matched_reader(&link.reader)
                .map(|p| p.changes().requested_changes())
        })
        .expect("writer")
        .expect("reader proxy");
    assert_eq!(requested, vec![sn(1), sn(2), sn(4), sn(5)]);

    let seen = record_from(&link.net, link.pub_locator);
    link.advance(Duration::from_millis(20));
    assert_eq!(link.fire_publisher(), 1);
    {
        let seen = seen.lock();
        assert_eq!(seen.0, vec![1, 2, 4, 5]);
        assert!(seen.1.is_empty(), "all repaired changes are cached: {:?}", seen.1);
    }
    assert_eq!(link.pump_subscriber(), 1);
    let taken: Vec<i64> = link
        .subscriber
        .take_all(&link.reader)
        .expect("reader")
        .iter()
        .map(|c| c.sequence_number().value())
        .collect();
    assert_eq!(taken, vec![1, 2, 3, 4, 5]);

    // D: Gap(6, {8}) marks 6, 7, 8 received and irrelevant
    let gap = Submessage::Gap(GapSubmessage {
        reader_id: link.reader.entity_id,
        writer_id: link.writer.entity_id,
        gap_start: sn(6),
        gap_list: SequenceNumberSet::from_sequences(sn(8), [sn(8)]).expect("set"),
    });
    link.inject(gap.clone());
    let after_once: Vec<(ChangeFromWriterStatus, bool)> =
        (1..=10).map(|s| (link.status(s), link.is_relevant(s))).collect();
    for seq in 6..=8 {
        assert_eq!(link.status(seq), ChangeFromWriterStatus::Received);
        assert!(!link.is_relevant(seq), "seq {}", seq);
    }
    assert_eq!(link.status(9), ChangeFromWriterStatus::Unknown);
    assert!(link.is_relevant(5));

    // Applying the same Gap again changes nothing
    link.inject(gap);
    let after_twice: Vec<(ChangeFromWriterStatus, bool)> =
        (1..=10).map(|s| (link.status(s), link.is_relevant(s))).collect();
    assert_eq!(after_once, after_twice);
    assert_eq!(link.cached(), 0);
}

#[test]
fn test_reliable_push_repairs_single_loss() {
    let writer_config = WriterConfig::reliable()
        .with_heartbeat_period(Duration::from_millis(20))
        .with_nack_response_delay(Duration::from_millis(5));
    let reader_config =
        ReaderConfig::reliable().with_heartbeat_response_delay(Duration::from_millis(5));
    let mut link = Link::new(writer_config, reader_config);
    link.match_endpoints(true);

    // Drop the first transmission of seq 2 only
    let pub_locator = link.pub_locator;
    let dropped = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&dropped);
    link.net.set_filter(Arc::new(move |datagram: &Datagram| {
        let carries_two = datagram.source == pub_locator
            && datagram.message.submessages.iter().any(
                |s| matches!(s, Submessage::Data(d) if d.writer_sn == SequenceNumber::new(2)),
            );
        let mut flag = flag.lock();
        if carries_two && !*flag {
            *flag = true;
            return false;
        }
        true
    }));

    for i in 1..=3_u8 {
        link.publisher
            .write(&link.writer, vec![i], HANDLE_NIL)
            .expect("write");
    }
    link.pump_subscriber();
    assert!(*dropped.lock());
    assert_eq!(link.status(2), ChangeFromWriterStatus::Missing);

    for _ in 0..20 {
        link.step(Duration::from_millis(10));
    }
    let taken: Vec<u8> = link
        .subscriber
        .take_all(&link.reader)
        .expect("reader")
        .iter()
        .map(|c| c.data()[0])
        .collect();
    assert_eq!(taken, vec![1, 2, 3]);

    // Everything acknowledged: the volatile history is released
    let (cache_empty, acked) = link
        .publisher
        .inspect_writer(&link.writer, |w| (w.cache().is_empty(), w.is_acked_by_all(sn(3))))
        .expect("writer");
    assert!(cache_empty);
    assert!(acked);
    let metrics = link.publisher.metrics().snapshot();
    assert!(metrics.retransmit_sent >= 1);
}

#[test]
fn test_nonfinal_heartbeat_always_answered() {
    let writer_config = WriterConfig::reliable()
        .with_durability(DurabilityKind::TransientLocal)
        .with_heartbeat_period(Duration::from_millis(20));
    let reader_config =
        ReaderConfig::reliable().with_heartbeat_response_delay(Duration::from_millis(5));
    let mut link = Link::new(writer_config, reader_config);
    link.match_endpoints(true);
    link.publisher
        .write(&link.writer, vec![7], HANDLE_NIL)
        .expect("write");
    assert_eq!(link.pump_subscriber(), 1);

    // Nothing missing, yet the heartbeat still gets a (positive) AckNack
    let heartbeat = Submessage::Heartbeat(hdds_rtps::messages::HeartbeatSubmessage {
        reader_id: link.reader.entity_id,
        writer_id: link.writer.entity_id,
        first_sn: sn(1),
        last_sn: sn(1),
        count: 1_000,
        final_flag: false,
        liveliness_flag: false,
    });
    link.inject(heartbeat);
    let before = link.subscriber.metrics().snapshot().acknacks_sent;
    link.advance(Duration::from_millis(5));
    assert_eq!(link.fire_subscriber(), 1);
    assert_eq!(link.subscriber.metrics().snapshot().acknacks_sent, before + 1);

    assert_eq!(link.pump_publisher(), 1);
    let acked = link
        .publisher
        .inspect_writer(&link.writer, |w| w.is_acked_by_all(sn(1)))
        .expect("writer");
    assert!(acked);
}

#[test]
fn test_volatile_late_joiner_gets_gaps_then_new_data() {
    let writer_config = WriterConfig::reliable()
        .with_heartbeat_period(Duration::from_millis(20))
        .with_nack_response_delay(Duration::from_millis(5));
    let reader_config =
        ReaderConfig::reliable().with_heartbeat_response_delay(Duration::from_millis(5));
    let mut link = Link::new(writer_config, reader_config);
    for i in 1..=3_u8 {
        link.publisher
            .write(&link.writer, vec![i], HANDLE_NIL)
            .expect("write");
    }
    link.match_endpoints(true);
    link.publisher
        .write(&link.writer, vec![4], HANDLE_NIL)
        .expect("write");

    for _ in 0..10 {
        link.step(Duration::from_millis(10));
    }
    for seq in 1..=3 {
        assert_eq!(link.status(seq), ChangeFromWriterStatus::Received);
        assert!(!link.is_relevant(seq));
    }
    let taken: Vec<u8> = link
        .subscriber
        .take_all(&link.reader)
        .expect("reader")
        .iter()
        .map(|c| c.data()[0])
        .collect();
    assert_eq!(taken, vec![4]);
}
