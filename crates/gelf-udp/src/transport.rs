// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Datagram transport used by the writer.
//!
//! [`Transport`] is the seam between message framing and the socket. The
//! production implementation is a connected [`UdpSocket`]; tests substitute
//! recording or failing transports.

use crate::error::GelfError;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

/// A connected, message-oriented socket. Each `send` is one datagram.
pub trait Transport: Send + Sync {
    /// Sends `datagram` and returns the number of bytes the transport accepted.
    fn send(&self, datagram: &[u8]) -> io::Result<usize>;
}

impl Transport for UdpSocket {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, datagram)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        (**self).send(datagram)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        (**self).send(datagram)
    }
}

/// Opens a UDP socket connected to `addr` (`host:port`).
///
/// The local socket is bound to an ephemeral port of the same address family
/// as the first resolved destination.
pub fn connect_udp(addr: &str) -> Result<UdpSocket, GelfError> {
    let remote = addr
        .to_socket_addrs()
        .map_err(GelfError::Connect)?
        .next()
        .ok_or_else(|| {
            GelfError::Connect(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses found for '{addr}'"),
            ))
        })?;

    let local: SocketAddr = if remote.is_ipv4() {
        ([0u8; 4], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };

    let socket = UdpSocket::bind(local).map_err(GelfError::Connect)?;
    socket.connect(remote).map_err(GelfError::Connect)?;
    Ok(socket)
}

/// Sends `bytes` as exactly one datagram.
///
/// A transport that accepts fewer bytes than offered is reported as
/// [`GelfError::ShortWrite`].
pub fn send_datagram<T: Transport + ?Sized>(transport: &T, bytes: &[u8]) -> Result<(), GelfError> {
    let written = transport.send(bytes).map_err(GelfError::Transport)?;
    if written != bytes.len() {
        return Err(GelfError::ShortWrite {
            written,
            expected: bytes.len(),
        });
    }
    Ok(())
}
