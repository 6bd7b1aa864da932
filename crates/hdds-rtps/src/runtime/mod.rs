// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime around the behaviours: participant registry, timers, transport
//! seam and the event pump.

mod participant;
mod pump;
mod timer;
mod transport;


pub use participant::Participant;
pub use pump::{EventPump, PumpStats};
pub use timer::TimerQueue;
pub use transport::{Datagram, LinkFilter, LoopbackNetwork, LoopbackTransport, Transport};
