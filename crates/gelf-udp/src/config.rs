// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Writer configuration and GELF framing constants.

use crate::error::GelfError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest datagram sent without chunking. Should stay below the path MTU
/// minus the IP and UDP headers.
// TODO: derive from path MTU discovery instead of a fixed value
pub const CHUNK_SIZE: usize = 1420;

/// Chunk header: 2 magic bytes, 8-byte message id, sequence and total count.
pub const CHUNKED_HEADER_LEN: usize = 12;

/// Payload bytes carried by each chunk at the default chunk size.
pub const CHUNKED_DATA_LEN: usize = CHUNK_SIZE - CHUNKED_HEADER_LEN;

/// Receivers discard messages split into more chunks than this.
pub const MAX_CHUNKS: usize = 128;

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// flate2 "best speed".
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 1;

const MAX_COMPRESSION_LEVEL: u32 = 9;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:12201";

/// Compression applied to serialized messages before they are sent.
///
/// The receiver recognizes the encoding from the leading bytes of each
/// datagram (`0x1f 0x8b` for gzip, `0x78` for zlib), so no envelope is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressType {
    #[default]
    Gzip,
    Zlib,
    None,
}

impl fmt::Display for CompressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gzip => write!(f, "gzip"),
            Self::Zlib => write!(f, "zlib"),
            Self::None => write!(f, "none"),
        }
    }
}

impl FromStr for CompressType {
    type Err = GelfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gzip" => Ok(Self::Gzip),
            "zlib" => Ok(Self::Zlib),
            "none" => Ok(Self::None),
            other => Err(GelfError::InvalidConfig(format!(
                "unknown compression type '{other}'. Must be one of: gzip, zlib, none"
            ))),
        }
    }
}

/// Integer encoding used by other GELF clients: 0 = gzip, 1 = zlib, 2 = none.
impl TryFrom<u8> for CompressType {
    type Error = GelfError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Gzip),
            1 => Ok(Self::Zlib),
            2 => Ok(Self::None),
            other => Err(GelfError::InvalidConfig(format!(
                "unknown compression type {other}"
            ))),
        }
    }
}

/// Configuration for a [`crate::Writer`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Destination as `host:port` (e.g., "graylog.internal:12201")
    pub address: String,
    /// Compression applied to every message
    pub compress_type: CompressType,
    /// Codec level, 0 (store) through 9 (smallest). Ignored for `none`.
    pub compression_level: u32,
    /// Largest datagram sent without chunking
    pub chunk_size: usize,
    /// Overrides the detected system hostname
    pub hostname: Option<String>,
    /// Overrides the facility, which defaults to the executable name
    pub facility: Option<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            compress_type: CompressType::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            chunk_size: CHUNK_SIZE,
            hostname: None,
            facility: None,
        }
    }
}

impl WriterConfig {
    /// Default configuration sending to `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), GelfError> {
        if self.address.trim().is_empty() {
            return Err(GelfError::InvalidConfig(
                "address cannot be empty".to_string(),
            ));
        }

        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(GelfError::InvalidConfig(format!(
                "compression level {} is out of range. Must be between 0 and {}",
                self.compression_level, MAX_COMPRESSION_LEVEL
            )));
        }

        // Every chunk must carry at least one payload byte after its header.
        if self.chunk_size <= CHUNKED_HEADER_LEN || self.chunk_size > MAX_DATAGRAM_SIZE {
            return Err(GelfError::InvalidConfig(format!(
                "chunk size {} is out of range. Must be between {} and {}",
                self.chunk_size,
                CHUNKED_HEADER_LEN + 1,
                MAX_DATAGRAM_SIZE
            )));
        }

        Ok(())
    }
}
