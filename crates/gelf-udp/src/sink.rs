// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing_subscriber` integration.
//!
//! A [`Writer`] can be used directly as the output of a `fmt` layer. Each
//! formatted event becomes one GELF message, with the event's level and
//! source location attached.
//!
//! ```rust,no_run
//! use gelf_udp::Writer;
//!
//! let writer = Writer::new("graylog.internal:12201")?;
//! tracing_subscriber::fmt()
//!     .with_writer(writer)
//!     .with_ansi(false)
//!     .without_time()
//!     .with_level(false)
//!     .with_target(false)
//!     .init();
//!
//! tracing::info!("service started");
//! # Ok::<(), gelf_udp::GelfError>(())
//! ```
//!
//! The level travels in the GELF `level` field, so the layer's own level and
//! target prefixes are turned off to keep `short_message` clean.
//!
//! The writer itself never emits tracing events while sending, so routing the
//! subscriber's output through it does not recurse.

use crate::message::{CallerLocation, Level, Message};
use crate::transport::Transport;
use crate::writer::Writer;
use std::borrow::Cow;
use std::io;
use tracing::Metadata;
use tracing_subscriber::fmt::MakeWriter;

/// Per-event writer handed out by [`Writer`]'s [`MakeWriter`] implementation.
#[derive(Debug)]
pub struct EventWriter<'a, T: Transport> {
    writer: &'a Writer<T>,
    level: Level,
    location: Option<CallerLocation>,
}

impl<'a, T: Transport> EventWriter<'a, T> {
    fn for_event(writer: &'a Writer<T>, meta: &Metadata<'_>) -> Self {
        let location = match (meta.file(), meta.line()) {
            (Some(file), Some(line)) => {
                Some(CallerLocation::new(Cow::Owned(file.to_string()), line))
            }
            _ => None,
        };
        EventWriter {
            writer,
            level: Level::from(*meta.level()),
            location,
        }
    }
}

impl<T: Transport> EventWriter<'_, T> {
    /// Event location when the writer was made for an event, the calling
    /// code otherwise.
    #[track_caller]
    fn location(&self) -> CallerLocation {
        match &self.location {
            Some(location) => location.clone(),
            None => CallerLocation::caller(),
        }
    }

    fn send(&self, buf: &[u8], location: &CallerLocation) -> io::Result<()> {
        let message = Message::construct(
            buf,
            self.writer.hostname(),
            self.writer.facility(),
            location,
        )
        .with_level(self.level);
        self.writer.write_message(&message)?;
        Ok(())
    }
}

impl<T: Transport> io::Write for EventWriter<'_, T> {
    #[track_caller]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf, &self.location())?;
        Ok(buf.len())
    }

    #[track_caller]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        self.send(buf, &self.location())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a, T: Transport + 'a> MakeWriter<'a> for Writer<T> {
    type Writer = EventWriter<'a, T>;

    fn make_writer(&'a self) -> Self::Writer {
        EventWriter {
            writer: self,
            level: Level::Info,
            location: None,
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        EventWriter::for_event(self, meta)
    }
}
