use std::io;

use thiserror::Error;

/// Broad failure categories, used to decide what a caller can do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket bind/connect/send/receive failures and timeouts.
    Transport,
    /// The server answered with something the protocol does not allow.
    ProtocolMismatch,
    /// The answer was cut short or otherwise unreadable.
    MalformedData,
    /// The client was constructed with invalid options.
    Configuration,
}

#[derive(Debug, Error)]
pub enum SourceQueryError {
    #[error("invalid client configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to bind local socket: {0}")]
    FailedPortBind(#[source] io::Error),
    #[error("host is unreachable: {0}")]
    UnreachableHost(#[source] io::Error),
    #[error("failed to send packet: {0}")]
    SendError(#[source] io::Error),
    #[error("failed to receive packet: {0}")]
    ReceiveError(#[source] io::Error),
    #[error("operation timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("unexpected packet header {0}")]
    HeaderMismatch(i32),
    #[error("expected packet type {expected:#04x}, got {found:#04x}")]
    UnexpectedPacketType { expected: u8, found: u8 },
    #[error("unsupported info response schema {0:#04x}")]
    UnsupportedInfoSchema(u8),
    #[error("fragment {index} is outside of a {total} fragment response")]
    FragmentOutOfRange { index: u8, total: u8 },
    #[error("fragment {0} was received twice")]
    DuplicateFragment(u8),
    #[error("fragment {index} of {total} was never received")]
    MissingFragment { index: u8, total: u8 },
    #[error("split response declares zero fragments")]
    EmptySplitResponse,
    #[error("declared decompressed size {0} exceeds the 1 MiB limit")]
    DecompressedSizeTooLarge(u32),
    #[error("decompressed {actual} bytes, expected {expected}")]
    DecompressedSizeMismatch { expected: u32, actual: usize },
    #[error("checksum mismatch: declared {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("failed to decompress split response: {0}")]
    Decompression(#[source] io::Error),

    #[error("read of {requested} bytes at offset {position} runs past the end of a {len} byte packet")]
    OutOfBounds {
        position: usize,
        requested: usize,
        len: usize,
    },
    #[error("string starting at offset {0} is not null-terminated")]
    UnterminatedString(usize),
}

impl SourceQueryError {
    pub fn kind(&self) -> ErrorKind {
        use SourceQueryError::*;

        match self {
            InvalidConfiguration(_) => ErrorKind::Configuration,
            FailedPortBind(_) | UnreachableHost(_) | SendError(_) | ReceiveError(_) | Timeout(_) => {
                ErrorKind::Transport
            }
            OutOfBounds { .. } | UnterminatedString(_) => ErrorKind::MalformedData,
            _ => ErrorKind::ProtocolMismatch,
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceQueryError>;
