// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote endpoint proxies.
//!
//! - [`WriterProxy`]: reader-side view of one matched writer's sequence space
//! - [`ReaderProxy`]: writer-side view of one matched reader
//! - [`ReaderLocator`]: writer-side view of one anonymous destination
//!
//! Proxies never hold payloads; they reference changes by sequence number.

mod changes;
mod ranges;
mod reader_locator;
mod reader_proxy;
mod writer_proxy;

pub use changes::{ChangeForReader, ChangeForReaderStatus, ChangesForReader};
pub use reader_locator::ReaderLocator;
pub use reader_proxy::{ReaderProxy, RelevanceFilter};
pub use writer_proxy::{ChangeFromWriterStatus, DataDisposition, WriterProxy};
