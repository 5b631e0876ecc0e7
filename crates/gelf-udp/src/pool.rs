// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reusable scratch buffers for serialization, compression and chunk framing.
//!
//! Every write needs one or two short-lived byte buffers. The pool hands them
//! out as [`PooledBuffer`] guards that go back to the pool when dropped, so a
//! steady stream of messages runs without allocating. The pool never blocks:
//! an empty pool allocates and a full pool drops the returned buffer.

use crossbeam_queue::ArrayQueue;
use std::io;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Initial capacity of freshly allocated buffers.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Number of idle buffers kept by default.
const DEFAULT_MAX_POOLED_BUFFERS: usize = 64;

/// Buffers that grew past this are freed instead of pooled.
const MAX_POOLED_BUFFER_SIZE: usize = 64 * 1024;

/// A lock-free pool of byte buffers shared by concurrent writers.
#[derive(Debug)]
pub struct BufferPool {
    idle: ArrayQueue<Vec<u8>>,
    buffer_size: usize,
    outstanding: AtomicUsize,
}

impl BufferPool {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_POOLED_BUFFERS, DEFAULT_BUFFER_SIZE)
    }

    /// Pool keeping at most `max_pooled` idle buffers, allocating new ones with
    /// `buffer_size` bytes of capacity.
    #[must_use]
    pub fn with_capacity(max_pooled: usize, buffer_size: usize) -> Self {
        Self {
            idle: ArrayQueue::new(max_pooled.max(1)),
            buffer_size,
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Takes a buffer from the pool, or allocates one if none is idle.
    ///
    /// The buffer is cleared here rather than on release: idle buffers carry
    /// whatever their previous holder left in them.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let mut buf = self
            .idle
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.buffer_size));
        buf.clear();
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        PooledBuffer { pool: self, buf }
    }

    fn release(&self, buf: Vec<u8>) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        if buf.capacity() <= MAX_POOLED_BUFFER_SIZE {
            // Full pool: the buffer is simply dropped
            let _ = self.idle.push(buf);
        }
    }

    /// Buffers currently checked out and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    /// Idle buffers ready for reuse.
    pub fn len(&self) -> usize {
        self.idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idle.is_empty()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A buffer checked out of a [`BufferPool`]. Returned to the pool on drop.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Vec<u8>,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl io::Write for PooledBuffer<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
