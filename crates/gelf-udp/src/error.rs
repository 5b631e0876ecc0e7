// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;

/// Errors returned by the GELF writer.
///
/// The writer never logs or swallows its own failures; every error is handed
/// back to the caller of the write.
#[derive(Debug, thiserror::Error)]
pub enum GelfError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to connect to GELF endpoint: {0}")]
    Connect(#[source] io::Error),

    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to compress message: {0}")]
    Compression(#[source] io::Error),

    #[error("Failed to send datagram: {0}")]
    Transport(#[source] io::Error),

    #[error("bad write ({written}/{expected})")]
    ShortWrite { written: usize, expected: usize },

    #[error("Message needs {chunks} chunks, more than the {max} allowed")]
    TooManyChunks { chunks: usize, max: usize },
}

impl From<GelfError> for io::Error {
    fn from(err: GelfError) -> Self {
        match err {
            GelfError::Transport(e) | GelfError::Connect(e) => e,
            GelfError::InvalidConfig(_) | GelfError::TooManyChunks { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            GelfError::ShortWrite { .. } => io::Error::new(io::ErrorKind::WriteZero, err),
            other => io::Error::other(other),
        }
    }
}
