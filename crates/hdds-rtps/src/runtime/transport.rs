// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport seam between the behaviour core and the network.
//!
//! The core only ever hands a fully built [`Message`] and a list of
//! destination locators to a [`Transport`]. Encoding and sockets live behind
//! the trait; [`LoopbackNetwork`] is the in-memory implementation used by
//! tests and demos.

use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::messages::Message;
use crate::types::Locator;
use crate::{Error, Result};

/// Outbound side of a participant.
pub trait Transport: Send + Sync {
    /// Send `message` to every locator. Unreachable destinations are not an
    /// error (datagram semantics).
    fn send(&self, locators: &[Locator], message: &Message) -> Result<()>;
}

/// One message in flight on the loopback network.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub source: Locator,
    pub destination: Locator,
    pub message: Message,
}

/// Delivery predicate: return false to drop a datagram.
pub type LinkFilter = Arc<dyn Fn(&Datagram) -> bool + Send + Sync>;

/// Shared in-memory network. Each bound locator owns a crossbeam inbox.
#[derive(Default)]
pub struct LoopbackNetwork {
    inboxes: DashMap<Locator, Sender<Datagram>>,
    filter: RwLock<Option<LinkFilter>>,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a locator. Returns its transport and the inbox to pump.
    pub fn bind(self: &Arc<Self>, locator: Locator) -> Result<(LoopbackTransport, Receiver<Datagram>)> {
        if self.inboxes.contains_key(&locator) {
            return Err(Error::PreconditionViolated(format!(
                "locator {} already bound",
                locator
            )));
        }
        let (tx, rx) = channel::unbounded();
        self.inboxes.insert(locator, tx);
        log::debug!("[loopback] bound {}", locator);
        Ok((
            LoopbackTransport {
                network: Arc::clone(self),
                local: locator,
            },
            rx,
        ))
    }

    pub fn unbind(&self, locator: &Locator) {
        self.inboxes.remove(locator);
    }

    /// Install a loss filter applied to every datagram.
    pub fn set_filter(&self, filter: LinkFilter) {
        *self.filter.write() = Some(filter);
    }

    pub fn clear_filter(&self) {
        *self.filter.write() = None;
    }

    fn deliver(&self, datagram: Datagram) {
        if let Some(filter) = self.filter.read().as_ref() {
            if !filter(&datagram) {
                log::trace!(
                    "[loopback] filtered {} -> {}",
                    datagram.source,
                    datagram.destination
                );
                return;
            }
        }
        let Some(inbox) = self.inboxes.get(&datagram.destination) else {
            log::trace!("[loopback] no endpoint at {}", datagram.destination);
            return;
        };
        if inbox.send(datagram).is_err() {
            log::debug!("[loopback] inbox closed");
        }
    }
}

impl std::fmt::Debug for LoopbackNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackNetwork")
            .field("bound", &self.inboxes.len())
            .field("filtered", &self.filter.read().is_some())
            .finish()
    }
}

/// Transport handle of one bound locator.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    network: Arc<LoopbackNetwork>,
    local: Locator,
}

impl LoopbackTransport {
    pub fn local_locator(&self) -> Locator {
        self.local
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, locators: &[Locator], message: &Message) -> Result<()> {
        for destination in locators {
            self.network.deliver(Datagram {
                source: self.local,
                destination: *destination,
                message: message.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GuidPrefix;
    use std::net::Ipv4Addr;

    fn loc(port: u16) -> Locator {
        Locator::udpv4(Ipv4Addr::LOCALHOST, port)
    }

    #[test]
    fn test_loopback_delivery() {
        let net = LoopbackNetwork::new();
        let (a, _rx_a) = net.bind(loc(1)).expect("bind a");
        let (_b, rx_b) = net.bind(loc(2)).expect("bind b");

        let msg = Message::new(GuidPrefix([1; 12]));
        a.send(&[loc(2), loc(3)], &msg).expect("send");
        let got = rx_b.try_recv().expect("delivered");
        assert_eq!(got.source, loc(1));
        assert_eq!(got.message, msg);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_double_bind_rejected() {
        let net = LoopbackNetwork::new();
        let _first = net.bind(loc(1)).expect("bind");
        assert!(net.bind(loc(1)).is_err());
    }

    #[test]
    fn test_filter_drops() {
        let net = LoopbackNetwork::new();
        let (a, _rx_a) = net.bind(loc(1)).expect("bind a");
        let (_b, rx_b) = net.bind(loc(2)).expect("bind b");
        net.set_filter(Arc::new(|_: &Datagram| false));

        a.send(&[loc(2)], &Message::new(GuidPrefix([1; 12])))
            .expect("send");
        assert!(rx_b.try_recv().is_err());

        net.clear_filter();
        a.send(&[loc(2)], &Message::new(GuidPrefix([1; 12])))
            .expect("send");
        assert!(rx_b.try_recv().is_ok());
    }
}
