// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! GELF transport over UDP.
//!
//! This crate ships structured log records to a GELF collector (Graylog and
//! compatible receivers) over a datagram socket. A record is serialized to
//! JSON, optionally compressed with gzip or zlib, and written either as a
//! single datagram or, when it does not fit, as a sequence of chunks that the
//! receiver reassembles.
//!
//! # Architecture
//!
//! ```text
//!   Message / raw bytes
//!          │
//!          v
//!   ┌─────────────┐
//!   │  Serialize  │ (serde_json, pooled buffer)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │  Compress   │ (gzip | zlib | none)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │    Plan     │ (chunk count)
//!   └──────┬──────┘
//!          │
//!     ┌────┴─────┐
//!     v          v
//!   direct    chunked (12-byte header per datagram)
//! ```
//!
//! Delivery is fire-and-forget: there is no acknowledgement, retry or
//! ordering, and a chunked message that fails halfway stays partially sent.
//!
//! # Usage
//!
//! ```rust,no_run
//! use gelf_udp::{Message, Writer};
//! use std::io::Write;
//!
//! let mut writer = Writer::new("127.0.0.1:12201")?;
//! writeln!(writer, "service started")?;
//!
//! let message = Message::new(writer.hostname(), "disk almost full")
//!     .with_facility(writer.facility())
//!     .with_extra("mount", "/var")?;
//! writer.write_message(&message)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unreachable_pub)]

pub mod chunk;
pub mod compress;
pub mod config;
pub mod error;
pub mod host;
pub mod message;
pub mod pool;
pub mod sink;
pub mod transport;
pub mod writer;

pub use config::{CompressType, WriterConfig};
pub use error::GelfError;
pub use message::{CallerLocation, Level, Message};
pub use pool::BufferPool;
pub use sink::EventWriter;
pub use transport::Transport;
pub use writer::Writer;
