// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! GELF chunking.
//!
//! Payloads larger than the chunk size are split into datagrams that each
//! start with a 12-byte header:
//!
//! ```text
//! offset 0..2   magic 0x1e 0x0f
//! offset 2..10  message id, shared by every chunk of one message
//! offset 10     sequence number, 0-based
//! offset 11     total number of chunks
//! offset 12..   chunk data
//! ```
//!
//! The receiver groups chunks by message id, so chunks of messages sent
//! concurrently over the same socket may interleave freely.

use crate::config::{CHUNKED_HEADER_LEN, MAX_CHUNKS};
use crate::error::GelfError;
use crate::transport::{send_datagram, Transport};
use std::fmt;

/// Leading bytes of every chunk datagram.
pub const MAGIC_CHUNKED: [u8; 2] = [0x1e, 0x0f];

/// Number of datagrams needed to send `len` bytes with datagrams of at most
/// `chunk_size` bytes.
///
/// A payload that fits in one datagram is sent as-is, without a chunk header.
/// A `chunk_size` with no room for data after the header yields one chunk per
/// byte; [`send_chunked`] rejects such sizes.
#[must_use]
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    if len <= chunk_size {
        return 1;
    }
    len.div_ceil(chunk_data_len(chunk_size).max(1))
}

/// Payload bytes carried by each chunk, zero when `chunk_size` does not
/// exceed the header.
#[must_use]
pub const fn chunk_data_len(chunk_size: usize) -> usize {
    chunk_size.saturating_sub(CHUNKED_HEADER_LEN)
}

/// Random identifier tying the chunks of one message together.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId([u8; 8]);

impl MessageId {
    #[must_use]
    pub fn random() -> Self {
        Self(fastrand::u64(..).to_be_bytes())
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({:016x})", u64::from_be_bytes(self.0))
    }
}

/// Header prepended to each chunk datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: MessageId,
    pub sequence: u8,
    pub total: u8,
}

impl ChunkHeader {
    /// Appends the 12 header bytes to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC_CHUNKED);
        out.extend_from_slice(self.id.as_bytes());
        out.push(self.sequence);
        out.push(self.total);
    }

    /// Splits a chunk datagram into its header and data.
    ///
    /// Returns `None` for datagrams that are not chunks: too short, or
    /// without the chunk magic.
    #[must_use]
    pub fn decode(datagram: &[u8]) -> Option<(ChunkHeader, &[u8])> {
        if datagram.len() < CHUNKED_HEADER_LEN || datagram[..2] != MAGIC_CHUNKED {
            return None;
        }
        let mut id = [0u8; 8];
        id.copy_from_slice(&datagram[2..10]);
        let header = ChunkHeader {
            id: MessageId(id),
            sequence: datagram[10],
            total: datagram[11],
        };
        Some((header, &datagram[CHUNKED_HEADER_LEN..]))
    }
}

/// Sends `data` as a sequence of chunk datagrams of at most `chunk_size`
/// bytes, framing each one in `scratch`.
///
/// The first failed or short send stops the sequence. Chunks already sent
/// stay sent; the receiver drops the incomplete message.
pub fn send_chunked<T: Transport + ?Sized>(
    transport: &T,
    data: &[u8],
    chunk_size: usize,
    scratch: &mut Vec<u8>,
) -> Result<(), GelfError> {
    let data_len = chunk_data_len(chunk_size);
    if data_len == 0 {
        return Err(GelfError::InvalidConfig(format!(
            "chunk size {chunk_size} leaves no room after the {CHUNKED_HEADER_LEN}-byte header"
        )));
    }
    let chunks = chunk_count(data.len(), chunk_size);
    let total = match u8::try_from(chunks) {
        Ok(total) if chunks <= MAX_CHUNKS => total,
        _ => {
            return Err(GelfError::TooManyChunks {
                chunks,
                max: MAX_CHUNKS,
            })
        }
    };

    let id = MessageId::random();
    for (sequence, chunk) in (0..total).zip(data.chunks(data_len)) {
        scratch.clear();
        ChunkHeader {
            id,
            sequence,
            total,
        }
        .encode_into(scratch);
        scratch.extend_from_slice(chunk);
        send_datagram(transport, scratch)?;
    }
    Ok(())
}
