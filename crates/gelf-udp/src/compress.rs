// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Payload compression ahead of transmission.

use crate::config::CompressType;
use crate::error::GelfError;
use crate::pool::{BufferPool, PooledBuffer};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::Write;
use std::ops::Deref;

/// Bytes ready to go on the wire.
#[derive(Debug)]
pub enum Compressed<'a> {
    /// The payload itself, for `CompressType::None`.
    Borrowed(&'a [u8]),
    /// Encoder output held in a pooled buffer until dropped.
    Pooled(PooledBuffer<'a>),
}

impl Deref for Compressed<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Borrowed(bytes) => bytes,
            Self::Pooled(buf) => buf.as_slice(),
        }
    }
}

/// Compresses `payload` at `level` into a buffer taken from `pool`.
///
/// `CompressType::None` passes the payload through untouched and takes no
/// buffer from the pool.
pub fn compress<'a>(
    payload: &'a [u8],
    compress_type: CompressType,
    level: Compression,
    pool: &'a BufferPool,
) -> Result<Compressed<'a>, GelfError> {
    match compress_type {
        CompressType::None => Ok(Compressed::Borrowed(payload)),
        CompressType::Gzip => {
            let mut scratch = pool.acquire();
            let encoder = GzEncoder::new(&mut *scratch, level);
            encode(encoder, payload, GzEncoder::try_finish)?;
            Ok(Compressed::Pooled(scratch))
        }
        CompressType::Zlib => {
            let mut scratch = pool.acquire();
            let encoder = ZlibEncoder::new(&mut *scratch, level);
            encode(encoder, payload, ZlibEncoder::try_finish)?;
            Ok(Compressed::Pooled(scratch))
        }
    }
}

/// Writes the whole payload and always finishes the stream. A write failure
/// is reported in preference to a failure while finishing.
fn encode<E: Write>(
    mut encoder: E,
    payload: &[u8],
    finish: fn(&mut E) -> std::io::Result<()>,
) -> Result<(), GelfError> {
    let written = encoder.write_all(payload);
    let finished = finish(&mut encoder);
    written.map_err(GelfError::Compression)?;
    finished.map_err(GelfError::Compression)
}
