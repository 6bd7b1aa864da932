// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message receiver: walks one message, applies the Info* submessages to
//! a per-message [`ReceiverContext`], and hands every entity submessage to a
//! routing callback together with the context in force at that point.

use super::{Message, ProtocolVersion, Submessage, VendorId};
use crate::config::PROTOCOL_VERSION_MAJOR;
use crate::types::{GuidPrefix, Locator, Time, GUIDPREFIX_UNKNOWN};
use crate::{Error, Result};

/// Receiver state for one incoming message (DDS-RTPS v2.5 Sec.8.3.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverContext {
    pub source_version: ProtocolVersion,
    pub source_vendor_id: VendorId,
    pub source_guid_prefix: GuidPrefix,
    pub dest_guid_prefix: GuidPrefix,
    pub unicast_reply_locators: Vec<Locator>,
    pub multicast_reply_locators: Vec<Locator>,
    pub timestamp: Option<Time>,
}

impl ReceiverContext {
    /// Initial context from the message header and the sender's address.
    ///
    /// `dest_prefix` is the destination assumed until an INFO_DST says
    /// otherwise; `GUIDPREFIX_UNKNOWN` means "any participant".
    pub fn new(message: &Message, source: Option<Locator>, dest_prefix: GuidPrefix) -> Self {
        let mut unicast_reply_locators = Vec::new();
        if let Some(locator) = source {
            unicast_reply_locators.push(locator);
        }
        Self {
            source_version: message.header.protocol_version,
            source_vendor_id: message.header.vendor_id,
            source_guid_prefix: message.header.guid_prefix,
            dest_guid_prefix: dest_prefix,
            unicast_reply_locators,
            multicast_reply_locators: Vec::new(),
            timestamp: None,
        }
    }

    /// Apply an Info* submessage. Returns false for entity submessages.
    pub fn apply(&mut self, submessage: &Submessage) -> bool {
        match submessage {
            Submessage::InfoDestination(info) => {
                self.dest_guid_prefix = info.guid_prefix;
            }
            Submessage::InfoSource(info) => {
                self.source_version = info.protocol_version;
                self.source_vendor_id = info.vendor_id;
                self.source_guid_prefix = info.guid_prefix;
                self.unicast_reply_locators.clear();
                self.multicast_reply_locators.clear();
                self.timestamp = None;
            }
            Submessage::InfoTimestamp(info) => {
                self.timestamp = info.timestamp;
            }
            Submessage::InfoReply(info) => {
                self.unicast_reply_locators = info.unicast_locators.clone();
                self.multicast_reply_locators = info.multicast_locators.clone();
            }
            _ => return false,
        }
        true
    }

    /// True when the following submessages are meant for `local_prefix`.
    pub fn is_for(&self, local_prefix: GuidPrefix) -> bool {
        self.dest_guid_prefix.is_unknown() || self.dest_guid_prefix == local_prefix
    }
}

/// Outcome of processing one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveSummary {
    /// Entity submessages accepted by an endpoint.
    pub delivered: usize,
    /// Entity submessages rejected (unknown endpoint, unsupported, invalid).
    pub dropped: usize,
    /// Entity submessages addressed to another participant.
    pub skipped: usize,
}

/// Stateless walker over incoming messages for one participant.
#[derive(Debug, Clone, Copy)]
pub struct MessageReceiver {
    local_prefix: GuidPrefix,
}

impl MessageReceiver {
    pub fn new(local_prefix: GuidPrefix) -> Self {
        Self { local_prefix }
    }

    /// Validate the header and route every entity submessage through `route`.
    ///
    /// A rejected submessage is dropped and counted; it never aborts the rest
    /// of the message. The header itself failing validation rejects the
    /// whole message with `PacketInvalid`.
    pub fn process<F>(
        &self,
        message: &Message,
        source: Option<Locator>,
        mut route: F,
    ) -> Result<ReceiveSummary>
    where
        F: FnMut(&ReceiverContext, &Submessage) -> Result<()>,
    {
        validate_header(message)?;

        let mut context = ReceiverContext::new(message, source, GUIDPREFIX_UNKNOWN);
        let mut summary = ReceiveSummary::default();
        for submessage in &message.submessages {
            if context.apply(submessage) {
                continue;
            }
            if !context.is_for(self.local_prefix) {
                summary.skipped += 1;
                continue;
            }
            match route(&context, submessage) {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    log::debug!("[receiver] dropped {}: {}", submessage.name(), e);
                    summary.dropped += 1;
                }
            }
        }
        Ok(summary)
    }
}

fn validate_header(message: &Message) -> Result<()> {
    if message.header.protocol_version.major != PROTOCOL_VERSION_MAJOR {
        return Err(Error::PacketInvalid(format!(
            "unsupported protocol version {}.{}",
            message.header.protocol_version.major, message.header.protocol_version.minor
        )));
    }
    if message.header.guid_prefix.is_unknown() {
        return Err(Error::PacketInvalid(
            "message header carries GUIDPREFIX_UNKNOWN".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{
        HeartbeatSubmessage, InfoDestination, InfoReply, InfoSource, InfoTimestamp,
    };
    use crate::types::{SequenceNumber, ENTITYID_UNKNOWN};
    use std::net::Ipv4Addr;

    fn prefix(n: u8) -> GuidPrefix {
        GuidPrefix([n; 12])
    }

    fn heartbeat() -> Submessage {
        Submessage::Heartbeat(HeartbeatSubmessage {
            reader_id: ENTITYID_UNKNOWN,
            writer_id: ENTITYID_UNKNOWN,
            first_sn: SequenceNumber::new(1),
            last_sn: SequenceNumber::new(1),
            count: 1,
            final_flag: false,
            liveliness_flag: false,
        })
    }

    #[test]
    fn test_foreign_major_version_rejected() {
        let mut msg = Message::new(prefix(1));
        msg.header.protocol_version.major = 1;
        let receiver = MessageReceiver::new(prefix(2));
        let result = receiver.process(&msg, None, |_, _| Ok(()));
        assert!(matches!(result, Err(Error::PacketInvalid(_))));
    }

    #[test]
    fn test_unknown_source_prefix_rejected() {
        let msg = Message::new(GUIDPREFIX_UNKNOWN);
        let receiver = MessageReceiver::new(prefix(2));
        assert!(matches!(
            receiver.process(&msg, None, |_, _| Ok(())),
            Err(Error::PacketInvalid(_))
        ));
    }

    #[test]
    fn test_info_submessages_shape_context() {
        let ts = Time::new(10, 0);
        let reply = Locator::udpv4(Ipv4Addr::new(10, 0, 0, 9), 7411);
        let mut msg = Message::new(prefix(1));
        msg.push(Submessage::InfoTimestamp(InfoTimestamp {
            timestamp: Some(ts),
        }));
        msg.push(Submessage::InfoReply(InfoReply {
            unicast_locators: vec![reply],
            multicast_locators: Vec::new(),
        }));
        msg.push(heartbeat());
        msg.push(Submessage::InfoSource(InfoSource {
            protocol_version: crate::messages::PROTOCOLVERSION,
            vendor_id: VendorId([0x01, 0x0F]),
            guid_prefix: prefix(3),
        }));
        msg.push(heartbeat());

        let mut seen = Vec::new();
        let receiver = MessageReceiver::new(prefix(2));
        let summary = receiver
            .process(&msg, None, |ctx, _| {
                seen.push(ctx.clone());
                Ok(())
            })
            .expect("valid message");
        assert_eq!(summary.delivered, 2);

        assert_eq!(seen[0].timestamp, Some(ts));
        assert_eq!(seen[0].source_guid_prefix, prefix(1));
        assert_eq!(seen[0].unicast_reply_locators, vec![reply]);

        // INFO_SRC resets timestamp and reply locators
        assert_eq!(seen[1].source_guid_prefix, prefix(3));
        assert_eq!(seen[1].timestamp, None);
        assert!(seen[1].unicast_reply_locators.is_empty());
    }

    #[test]
    fn test_info_destination_filters() {
        let mut msg = Message::new(prefix(1));
        msg.push(Submessage::InfoDestination(InfoDestination {
            guid_prefix: prefix(9),
        }));
        msg.push(heartbeat());
        msg.push(Submessage::InfoDestination(InfoDestination {
            guid_prefix: prefix(2),
        }));
        msg.push(heartbeat());

        let receiver = MessageReceiver::new(prefix(2));
        let summary = receiver.process(&msg, None, |_, _| Ok(())).expect("valid");
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.delivered, 1);
    }

    #[test]
    fn test_route_error_is_counted_not_fatal() {
        let mut msg = Message::new(prefix(1));
        msg.push(heartbeat());
        msg.push(heartbeat());
        let receiver = MessageReceiver::new(prefix(2));
        let mut first = true;
        let summary = receiver
            .process(&msg, None, |_, _| {
                if std::mem::take(&mut first) {
                    Err(Error::NoData)
                } else {
                    Ok(())
                }
            })
            .expect("valid");
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.delivered, 1);
    }
}
