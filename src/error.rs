//! Error types
//!
//! Every way a relay connection can end is an [`Error`]. The supervisor asks
//! the error how it should be counted: a refused connection means the capture
//! process is simply not listening yet, while resets, timeouts and protocol
//! violations hint that the shared capture process is unhealthy.

use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket level failure (connect, read or write)
    Io(io::Error),
    /// The upstream stream violated the expected framing
    Protocol(ProtocolError),
    /// TCP connect did not complete within the configured timeout
    ConnectTimeout,
    /// Upstream closed the stream cleanly
    ConnectionClosed,
}

impl Error {
    /// Connection refused: the capture process is not listening (yet)
    pub fn is_benign(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused)
    }

    /// Whether this closure feeds the erroneous-close burst detector
    pub fn counts_toward_burst(&self) -> bool {
        match self {
            Error::Io(e) => e.kind() != io::ErrorKind::ConnectionRefused,
            Error::ConnectTimeout => true,
            Error::Protocol(ProtocolError::Unauthorized) => false,
            Error::Protocol(_) => true,
            Error::ConnectionClosed => false,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::ConnectTimeout => write!(f, "Connect timed out"),
            Error::ConnectionClosed => write!(f, "Connection closed by peer"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

/// Framing errors raised by the stream parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// No digit run in the block following `Content-Length:`
    MissingContentLength(String),
    /// Declared frame length exceeds the configured limit
    FrameTooLarge { length: usize, max: usize },
    /// A header scan consumed too many bytes without finding its delimiter
    HeaderTooLong { expected: &'static str, limit: usize },
    /// The server answered with 401 again after the challenge was answered
    Unauthorized,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::MissingContentLength(header) => {
                write!(f, "could not find content length in header \"{}\"", header)
            }
            ProtocolError::FrameTooLarge { length, max } => {
                write!(f, "frame of {} bytes exceeds limit of {} bytes", length, max)
            }
            ProtocolError::HeaderTooLong { expected, limit } => {
                write!(f, "no {:?} within {} bytes", expected, limit)
            }
            ProtocolError::Unauthorized => write!(f, "authentication rejected"),
        }
    }
}

impl std::error::Error for ProtocolError {}
