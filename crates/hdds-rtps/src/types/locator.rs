// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS locators (transport addresses).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

pub const LOCATOR_KIND_INVALID: i32 = -1;
pub const LOCATOR_KIND_RESERVED: i32 = 0;
pub const LOCATOR_KIND_UDPV4: i32 = 1;
pub const LOCATOR_KIND_UDPV6: i32 = 2;
pub const LOCATOR_PORT_INVALID: u32 = 0;

/// RTPS `Locator_t`: kind + port + 16-byte address.
///
/// IPv4 addresses occupy the last 4 bytes of `address`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator {
    pub kind: i32,
    pub port: u32,
    pub address: [u8; 16],
}

pub const LOCATOR_INVALID: Locator = Locator {
    kind: LOCATOR_KIND_INVALID,
    port: LOCATOR_PORT_INVALID,
    address: [0; 16],
};

impl Locator {
    pub fn new(kind: i32, port: u32, address: [u8; 16]) -> Self {
        Self {
            kind,
            port,
            address,
        }
    }

    pub fn udpv4(ip: Ipv4Addr, port: u16) -> Self {
        let mut address = [0u8; 16];
        address[12..16].copy_from_slice(&ip.octets());
        Self::new(LOCATOR_KIND_UDPV4, u32::from(port), address)
    }

    pub fn udpv6(ip: Ipv6Addr, port: u16) -> Self {
        Self::new(LOCATOR_KIND_UDPV6, u32::from(port), ip.octets())
    }

    pub fn is_valid(&self) -> bool {
        self.kind != LOCATOR_KIND_INVALID && self.port != LOCATOR_PORT_INVALID
    }

    /// Socket address for UDP locators; `None` for other kinds.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        let port = u16::try_from(self.port).ok()?;
        match self.kind {
            LOCATOR_KIND_UDPV4 => {
                let ip = Ipv4Addr::new(
                    self.address[12],
                    self.address[13],
                    self.address[14],
                    self.address[15],
                );
                Some(SocketAddr::new(IpAddr::V4(ip), port))
            }
            LOCATOR_KIND_UDPV6 => {
                Some(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(self.address)), port))
            }
            _ => None,
        }
    }
}

impl From<SocketAddr> for Locator {
    fn from(addr: SocketAddr) -> Self {
        match addr.ip() {
            IpAddr::V4(ip) => Locator::udpv4(ip, addr.port()),
            IpAddr::V6(ip) => Locator::udpv6(ip, addr.port()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_socket_addr() {
            Some(addr) => write!(f, "udp://{}", addr),
            None => write!(f, "locator(kind={}, port={})", self.kind, self.port),
        }
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", self)
    }
}
