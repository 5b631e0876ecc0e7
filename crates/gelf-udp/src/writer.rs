// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The GELF writer: serialize, compress, chunk and send.

use crate::chunk::{chunk_count, send_chunked};
use crate::compress::compress;
use crate::config::{CompressType, WriterConfig};
use crate::error::GelfError;
use crate::host;
use crate::message::{CallerLocation, Message};
use crate::pool::BufferPool;
use crate::transport::{connect_udp, send_datagram, Transport};
use flate2::Compression;
use std::fmt;
use std::io;
use std::net::UdpSocket;
use std::sync::Arc;
use tracing::debug;

/// Sends GELF messages to one destination.
///
/// All methods take `&self`; a writer can be shared between threads and used
/// concurrently without extra locking. Every call is synchronous and sends
/// complete datagrams, so chunks of concurrent messages may interleave on the
/// wire but never within a datagram.
///
/// The writer also implements [`io::Write`]: each `write`, `write_all` or
/// `write!` call becomes one message tagged with the calling file and line,
/// which lets it stand in as the output of line-oriented loggers.
#[derive(Debug)]
pub struct Writer<T: Transport = UdpSocket> {
    transport: T,
    pool: Arc<BufferPool>,
    hostname: String,
    facility: String,
    compress_type: CompressType,
    compression_level: u32,
    chunk_size: usize,
}

impl Writer<UdpSocket> {
    /// Writer with default settings (gzip, best speed) sending to `addr`.
    pub fn new(addr: &str) -> Result<Self, GelfError> {
        Self::from_config(&WriterConfig::new(addr))
    }

    /// Opens a UDP socket connected to `config.address`.
    pub fn from_config(config: &WriterConfig) -> Result<Self, GelfError> {
        config.validate()?;
        let socket = connect_udp(&config.address)?;
        let writer = Self::with_transport(socket, config)?;
        debug!(
            "GELF | Sending to {} as host={} facility={} compression={}",
            config.address, writer.hostname, writer.facility, config.compress_type
        );
        Ok(writer)
    }
}

impl<T: Transport> Writer<T> {
    /// Writer sending through an existing transport.
    pub fn with_transport(transport: T, config: &WriterConfig) -> Result<Self, GelfError> {
        config.validate()?;
        Ok(Writer {
            transport,
            pool: Arc::new(BufferPool::new()),
            hostname: config.hostname.clone().unwrap_or_else(host::get_hostname),
            facility: config.facility.clone().unwrap_or_else(host::default_facility),
            compress_type: config.compress_type,
            compression_level: config.compression_level,
            chunk_size: config.chunk_size,
        })
    }

    /// Shares `pool` with this writer instead of its private pool.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn facility(&self) -> &str {
        &self.facility
    }

    pub fn compress_type(&self) -> CompressType {
        self.compress_type
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends a message as-is. Fields are not validated or filled in.
    pub fn write_message(&self, message: &Message) -> Result<(), GelfError> {
        let mut serialized = self.pool.acquire();
        message.to_writer(&mut *serialized)?;
        self.send_payload(&serialized)
    }

    /// Sends an already serialized message.
    ///
    /// The payload is compressed, then sent as one datagram when it fits in
    /// the chunk size, or as chunks otherwise.
    pub fn send_payload(&self, payload: &[u8]) -> Result<(), GelfError> {
        let compressed = compress(
            payload,
            self.compress_type,
            Compression::new(self.compression_level),
            &self.pool,
        )?;

        if chunk_count(compressed.len(), self.chunk_size) > 1 {
            let mut scratch = self.pool.acquire();
            return send_chunked(&self.transport, &compressed, self.chunk_size, &mut scratch);
        }
        send_datagram(&self.transport, &compressed)
    }

    /// Wraps a raw log line in a message from `location` and sends it.
    ///
    /// Returns `bytes.len()`, not the number of bytes put on the wire.
    pub fn write_at(&self, bytes: &[u8], location: &CallerLocation) -> Result<usize, GelfError> {
        let message = Message::construct(bytes, &self.hostname, &self.facility, location);
        self.write_message(&message)?;
        Ok(bytes.len())
    }

    /// Formats `args` into one message from `location`. Nothing is sent when
    /// the formatted text is empty.
    fn format_at(&self, args: fmt::Arguments<'_>, location: &CallerLocation) -> io::Result<()> {
        let mut line = self.pool.acquire();
        io::Write::write_fmt(&mut *line, args)?;
        if !line.is_empty() {
            self.write_at(&line, location)?;
        }
        Ok(())
    }
}

impl<T: Transport> io::Write for Writer<T> {
    #[track_caller]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_at(buf, &CallerLocation::caller())?)
    }

    #[track_caller]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if !buf.is_empty() {
            self.write_at(buf, &CallerLocation::caller())?;
        }
        Ok(())
    }

    #[track_caller]
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.format_at(args, &CallerLocation::caller())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Transport> io::Write for &Writer<T> {
    #[track_caller]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_at(buf, &CallerLocation::caller())?)
    }

    #[track_caller]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if !buf.is_empty() {
            self.write_at(buf, &CallerLocation::caller())?;
        }
        Ok(())
    }

    #[track_caller]
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.format_at(args, &CallerLocation::caller())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::chunk::ChunkHeader;
    use crate::config::{CHUNKED_HEADER_LEN, CHUNK_SIZE};
    use crate::message::Level;
    use flate2::read::{GzDecoder, ZlibDecoder};
    use serde_json::Value;
    use std::collections::HashSet;
    use std::io::{Read, Write};
    use std::sync::Mutex;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<Vec<u8>>>,
        fail_on: Option<usize>,
    }

    impl Recording {
        fn failing_on(call: usize) -> Self {
            Self {
                fail_on: Some(call),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for Recording {
        fn send(&self, datagram: &[u8]) -> io::Result<usize> {
            let mut sent = self.sent.lock().unwrap();
            let call = sent.len();
            sent.push(datagram.to_vec());
            if self.fail_on == Some(call) {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            Ok(datagram.len())
        }
    }

    fn config(compress_type: CompressType) -> WriterConfig {
        WriterConfig {
            compress_type,
            hostname: Some("web-1".to_string()),
            facility: Some("billing".to_string()),
            ..Default::default()
        }
    }

    fn writer(compress_type: CompressType) -> Writer<Recording> {
        Writer::with_transport(Recording::default(), &config(compress_type)).unwrap()
    }

    /// Bytes of one message as the receiver sees them after reassembly.
    fn reassemble(datagrams: &[Vec<u8>]) -> Vec<u8> {
        if datagrams.len() == 1 && ChunkHeader::decode(&datagrams[0]).is_none() {
            return datagrams[0].clone();
        }
        let mut out = Vec::new();
        for (i, datagram) in datagrams.iter().enumerate() {
            let (header, data) = ChunkHeader::decode(datagram).unwrap();
            assert_eq!(header.sequence as usize, i);
            assert_eq!(header.total as usize, datagrams.len());
            out.extend_from_slice(data);
        }
        out
    }

    fn pseudo_random(len: usize) -> Vec<u8> {
        let mut rng = fastrand::Rng::with_seed(7);
        (0..len).map(|_| rng.u8(..)).collect()
    }

    #[test]
    fn test_uncompressed_small_payload_single_datagram() {
        let writer = writer(CompressType::None);
        let payload = vec![b'x'; 100];
        writer.send_payload(&payload).unwrap();

        let sent = writer.transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], payload);
    }

    #[test]
    fn test_uncompressed_5000_bytes_four_chunks() {
        let writer = writer(CompressType::None);
        let payload = pseudo_random(5000);
        writer.send_payload(&payload).unwrap();

        let sent = writer.transport().sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[3].len() - CHUNKED_HEADER_LEN, 776);
        assert_eq!(reassemble(&sent), payload);
        assert_eq!(writer.pool().outstanding(), 0);
    }

    #[test]
    fn test_failure_on_second_chunk_aborts() {
        let writer =
            Writer::with_transport(Recording::failing_on(1), &config(CompressType::None)).unwrap();
        let err = writer.send_payload(&pseudo_random(5000)).unwrap_err();

        assert!(matches!(err, GelfError::Transport(_)));
        assert_eq!(writer.transport().sent().len(), 2);
        assert_eq!(writer.pool().outstanding(), 0);
    }

    #[test]
    fn test_gzip_repetitive_payload() {
        let writer = writer(CompressType::Gzip);
        let payload = vec![b'z'; 2000];
        writer.send_payload(&payload).unwrap();

        let sent = writer.transport().sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].len() < payload.len());

        let mut decoded = Vec::new();
        GzDecoder::new(sent[0].as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_gzip_chunked_round_trip() {
        let writer = writer(CompressType::Gzip);
        // Incompressible, so the gzip output still needs several chunks
        let payload = pseudo_random(10_000);
        writer.send_payload(&payload).unwrap();

        let sent = writer.transport().sent();
        assert!(sent.len() > 1);

        let mut decoded = Vec::new();
        GzDecoder::new(reassemble(&sent).as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_zlib_message_round_trip() {
        let writer = writer(CompressType::Zlib);
        let message = Message::new("web-1", "payment accepted")
            .with_level(Level::Notice)
            .with_extra("amount", 42)
            .unwrap();
        writer.write_message(&message).unwrap();

        let sent = writer.transport().sent();
        assert_eq!(sent[0][0], 0x78);

        let mut decoded = Vec::new();
        ZlibDecoder::new(sent[0].as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, serde_json::to_vec(&message).unwrap());
    }

    #[test]
    fn test_pool_balanced_after_every_outcome() {
        for compress_type in [CompressType::Gzip, CompressType::Zlib, CompressType::None] {
            let ok = writer(compress_type);
            ok.write_message(&Message::new("h", "x".repeat(8000))).unwrap();
            assert_eq!(ok.pool().outstanding(), 0);

            let failing =
                Writer::with_transport(Recording::failing_on(0), &config(compress_type)).unwrap();
            assert!(failing.write_message(&Message::new("h", "short")).is_err());
            assert_eq!(failing.pool().outstanding(), 0);
        }
    }

    #[test]
    fn test_too_many_chunks_is_rejected() {
        let writer = writer(CompressType::None);
        let err = writer.send_payload(&vec![0u8; 200_000]).unwrap_err();

        assert!(matches!(err, GelfError::TooManyChunks { .. }));
        assert!(writer.transport().sent().is_empty());
        assert_eq!(writer.pool().outstanding(), 0);
    }

    #[test]
    fn test_short_write_is_an_error() {
        struct HalfWrites;
        impl Transport for HalfWrites {
            fn send(&self, datagram: &[u8]) -> io::Result<usize> {
                Ok(datagram.len() / 2)
            }
        }

        let writer = Writer::with_transport(HalfWrites, &config(CompressType::None)).unwrap();
        let err = writer.send_payload(&[1, 2, 3, 4]).unwrap_err();
        assert_eq!(err.to_string(), "bad write (2/4)");
    }

    #[test]
    fn test_io_write_reports_input_length() {
        let mut writer = writer(CompressType::None);
        let line = b"cache warmed in 12ms\n";
        let written = writer.write(line).unwrap();
        assert_eq!(written, line.len());

        let sent = writer.transport().sent();
        let value: Value = serde_json::from_slice(&sent[0]).unwrap();
        assert_eq!(value["short_message"], "cache warmed in 12ms");
        assert_eq!(value["host"], "web-1");
        assert_eq!(value["facility"], "billing");
        assert_eq!(value["level"], 6);
        assert_eq!(value["_line"], line!() - 9);
        assert!(value["_file"].as_str().unwrap().ends_with("writer.rs"));
    }

    #[test]
    fn test_line_oriented_writes_record_call_site() {
        let mut writer = writer(CompressType::None);
        writer.write_all(b"via write_all\n").unwrap();
        let write_all_line = line!() - 1;
        let via = "writeln";
        writeln!(writer, "via {via}").unwrap();
        let writeln_line = line!() - 1;

        let mut shared = &writer;
        writeln!(shared, "via shared writer").unwrap();
        let shared_line = line!() - 1;

        let sent = writer.transport().sent();
        assert_eq!(sent.len(), 3);
        let expected = [
            ("via write_all", write_all_line),
            ("via writeln", writeln_line),
            ("via shared writer", shared_line),
        ];
        for (datagram, (short_message, line)) in sent.iter().zip(expected) {
            let value: Value = serde_json::from_slice(datagram).unwrap();
            assert_eq!(value["short_message"], short_message);
            assert_eq!(value["_line"], line);
            assert!(value["_file"].as_str().unwrap().ends_with("writer.rs"));
        }
    }

    #[test]
    fn test_empty_line_oriented_writes_send_nothing() {
        let mut writer = writer(CompressType::None);
        writer.write_all(b"").unwrap();
        let nothing = String::new();
        write!(writer, "{nothing}").unwrap();
        assert!(writer.transport().sent().is_empty());
        assert_eq!(writer.pool().outstanding(), 0);
    }

    #[test]
    fn test_io_write_failure_reports_error() {
        let mut writer =
            Writer::with_transport(Recording::failing_on(0), &config(CompressType::Gzip)).unwrap();
        let err = writer.write(b"lost").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[test]
    fn test_shared_writer_concurrent_messages() {
        let writer = Arc::new(writer(CompressType::None));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let writer = Arc::clone(&writer);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        writer.send_payload(&vec![b'a'; CHUNK_SIZE * 2]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sent = writer.transport().sent();
        assert_eq!(sent.len(), 8 * 50 * 3);

        let mut per_message: std::collections::HashMap<_, Vec<u8>> = Default::default();
        for datagram in &sent {
            let (header, _) = ChunkHeader::decode(datagram).unwrap();
            assert_eq!(header.total, 3);
            per_message.entry(header.id).or_default().push(header.sequence);
        }
        assert_eq!(per_message.len(), 400);
        for sequences in per_message.values_mut() {
            sequences.sort_unstable();
            assert_eq!(sequences, &vec![0, 1, 2]);
        }

        let ids: HashSet<_> = per_message.keys().collect();
        assert_eq!(ids.len(), 400);
        assert_eq!(writer.pool().outstanding(), 0);
    }

    #[test]
    fn test_shared_pool() {
        let pool = Arc::new(BufferPool::new());
        let first = writer(CompressType::Gzip).with_pool(Arc::clone(&pool));
        let second = writer(CompressType::Zlib).with_pool(Arc::clone(&pool));

        first.write_message(&Message::new("h", "one")).unwrap();
        second.write_message(&Message::new("h", "two")).unwrap();

        assert_eq!(pool.outstanding(), 0);
        assert!(!pool.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = WriterConfig {
            chunk_size: 4,
            ..config(CompressType::Gzip)
        };
        assert!(matches!(
            Writer::with_transport(Recording::default(), &config),
            Err(GelfError::InvalidConfig(_))
        ));
    }

    #[test]
    #[traced_test]
    fn test_from_config_logs_destination_only() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = WriterConfig {
            address: receiver.local_addr().unwrap().to_string(),
            ..config(CompressType::None)
        };
        let writer = Writer::from_config(&config).unwrap();
        writer.send_payload(b"{}").unwrap();

        assert!(logs_contain("GELF | Sending to"));
        logs_assert(|lines: &[&str]| match lines.len() {
            1 => Ok(()),
            n => Err(format!("expected one log line, got {n}")),
        });
    }
}
