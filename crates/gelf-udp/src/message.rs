// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! GELF 1.1 log records.
//!
//! # Format
//!
//! ```text
//! {
//!   "version": "1.1",
//!   "host": "web-1",
//!   "short_message": "first line",
//!   "full_message": "first line\nrest of the input",
//!   "timestamp": 1700000000.123,
//!   "level": 6,
//!   "facility": "billing",
//!   "_file": "src/main.rs",
//!   "_line": 42
//! }
//! ```
//!
//! Additional fields are flattened into the top-level object and always carry
//! a leading underscore.

use crate::error::GelfError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::panic::Location;
use std::time::{SystemTime, UNIX_EPOCH};

pub const GELF_VERSION: &str = "1.1";

/// Syslog severity of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Level {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    #[default]
    Info = 6,
    Debug = 7,
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        Ok(match value {
            0 => Level::Emergency,
            1 => Level::Alert,
            2 => Level::Critical,
            3 => Level::Error,
            4 => Level::Warning,
            5 => Level::Notice,
            6 => Level::Info,
            7 => Level::Debug,
            other => return Err(format!("invalid syslog level {other}")),
        })
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::INFO => Level::Info,
            _ => Level::Debug,
        }
    }
}

/// Source location attached to messages built from raw log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerLocation {
    pub file: Cow<'static, str>,
    pub line: u32,
}

impl CallerLocation {
    pub fn new(file: impl Into<Cow<'static, str>>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Location of the code calling the function this is invoked from.
    ///
    /// Propagates through functions marked `#[track_caller]`.
    #[track_caller]
    #[must_use]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: Cow::Borrowed(location.file()),
            line: location.line(),
        }
    }
}

impl fmt::Display for CallerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A GELF message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub version: String,
    pub host: String,
    pub short_message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub full_message: String,
    /// Seconds since the Unix epoch, with fractional milliseconds
    pub timestamp: f64,
    #[serde(default)]
    pub level: Level,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub facility: String,
    /// Additional fields, keys prefixed with `_`
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Message {
    /// An `Info` message stamped with the current time.
    pub fn new(host: impl Into<String>, short_message: impl Into<String>) -> Self {
        Self {
            version: GELF_VERSION.to_string(),
            host: host.into(),
            short_message: short_message.into(),
            full_message: String::new(),
            timestamp: now(),
            level: Level::Info,
            facility: String::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Builds a message from one raw log line, the way line-oriented loggers
    /// hand output to the writer.
    ///
    /// Surrounding whitespace is trimmed. The first line becomes the short
    /// message; input spanning several lines is also kept whole as the full
    /// message. The caller location is recorded as `_file` and `_line`.
    pub fn construct(
        raw: &[u8],
        host: &str,
        facility: &str,
        location: &CallerLocation,
    ) -> Self {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim();

        let mut message = Self::new(host, text);
        if let Some(newline) = text.find('\n') {
            message.short_message = text[..newline].to_string();
            message.full_message = text.to_string();
        }
        message.facility = facility.to_string();
        message
            .extra
            .insert("_file".to_string(), Value::from(location.file.as_ref()));
        message
            .extra
            .insert("_line".to_string(), Value::from(location.line));
        message
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_facility(mut self, facility: impl Into<String>) -> Self {
        self.facility = facility.into();
        self
    }

    #[must_use]
    pub fn with_full_message(mut self, full_message: impl Into<String>) -> Self {
        self.full_message = full_message.into();
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds an additional field. A leading `_` is added to `key` if missing;
    /// `_id` is reserved by GELF and rejected.
    pub fn with_extra(
        mut self,
        key: impl AsRef<str>,
        value: impl Into<Value>,
    ) -> Result<Self, GelfError> {
        let key = key.as_ref();
        let key = if key.starts_with('_') {
            key.to_string()
        } else {
            format!("_{key}")
        };
        if key == "_id" || key.len() == 1 {
            return Err(GelfError::InvalidConfig(format!(
                "invalid additional field name '{key}'"
            )));
        }
        self.extra.insert(key, value.into());
        Ok(self)
    }

    /// Serializes the message as JSON into `writer`.
    pub fn to_writer<W: io::Write>(&self, writer: W) -> Result<(), GelfError> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}
