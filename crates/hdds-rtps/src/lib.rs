// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # hdds-rtps - RTPS behaviour core
//!
//! The reliability machinery of DDSI-RTPS 2.x: history caches, the proxies a
//! writer keeps for its readers (and a reader for its writers), and the
//! reader/writer behaviours for best-effort/reliable x stateless/stateful.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use std::sync::Arc;
//!
//! use hdds_rtps::config::{ReaderConfig, TopicKind, WriterConfig};
//! use hdds_rtps::proxy::{ReaderProxy, WriterProxy};
//! use hdds_rtps::runtime::{LoopbackNetwork, Participant};
//! use hdds_rtps::types::{GuidPrefix, Locator, HANDLE_NIL};
//!
//! # fn main() -> hdds_rtps::Result<()> {
//! let net = LoopbackNetwork::new();
//! let (pub_locator, sub_locator) = (
//!     Locator::udpv4(Ipv4Addr::LOCALHOST, 7410),
//!     Locator::udpv4(Ipv4Addr::LOCALHOST, 7411),
//! );
//! let (pub_transport, _pub_inbox) = net.bind(pub_locator)?;
//! let (sub_transport, sub_inbox) = net.bind(sub_locator)?;
//! let publisher = Participant::new(GuidPrefix([1; 12]), Arc::new(pub_transport));
//! let subscriber = Participant::new(GuidPrefix([2; 12]), Arc::new(sub_transport));
//!
//! let writer = publisher.create_writer(WriterConfig::reliable(), TopicKind::NoKey)?;
//! let reader = subscriber.create_reader(ReaderConfig::reliable(), TopicKind::NoKey)?;
//! publisher.matched_reader_add(&writer, ReaderProxy::new(reader, vec![sub_locator], vec![], false))?;
//! subscriber.matched_writer_add(&reader, WriterProxy::new(writer, vec![pub_locator], vec![]))?;
//!
//! publisher.write(&writer, vec![1, 2, 3], HANDLE_NIL)?;
//! for datagram in sub_inbox.try_iter() {
//!     subscriber.receive(&datagram.message, Some(datagram.source))?;
//! }
//! assert_eq!(subscriber.take(&reader)?.data(), &[1, 2, 3]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  runtime     Participant | TimerQueue | EventPump | Transport seam  |
//! +---------------------------------------------------------------------+
//! |  behavior    Writer / Reader + pure transition tables -> Effects    |
//! +---------------------------------------------------------------------+
//! |  proxy       ReaderProxy | ReaderLocator | WriterProxy              |
//! +---------------------------------------------------------------------+
//! |  history_cache | messages (submessages, receiver) | types          |
//! +---------------------------------------------------------------------+
//! ```
//!
//! Behaviours never touch the network or a clock thread. Every action
//! returns a list of [`behavior::Effect`]s (send, arm timer, disarm timer)
//! that the [`runtime::Participant`] carries out once the endpoint lock is
//! released.
//!
//! ## Features
//!
//! - `config-loaders`: YAML endpoint profiles (`config::EndpointProfile`).

pub mod behavior;
pub mod config;
mod error;
mod history_cache;
pub mod messages;
pub mod metrics;
pub mod proxy;
pub mod runtime;
pub mod types;

pub use error::{Error, Result};
pub use history_cache::HistoryCache;
pub use metrics::{MetricsSnapshot, ReliableMetrics};
pub use types::{CacheChange, ChangeKind, Guid, GuidPrefix, EntityId, Locator, SequenceNumber};
