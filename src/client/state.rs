//! Connection lifecycle phase
//!
//! Tracks where a relay connection is between socket connect and close.

/// Relay connection phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// TCP connect in progress
    Connecting,
    /// Request sent, scanning for the status line
    AwaitingStatus,
    /// 401 received, scanning for the `WWW-Authenticate` challenge
    AwaitingAuthChallenge,
    /// Scanning for the next `Content-Length` header
    AwaitingContentLength,
    /// Reading a frame body of known length
    ReadingBody,
    /// Socket released
    Closed,
}

impl ConnectionPhase {
    /// Check if the socket is still held
    pub fn is_open(&self) -> bool {
        *self != ConnectionPhase::Closed
    }

    /// Check if the stream has reached the frame loop
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            ConnectionPhase::AwaitingContentLength | ConnectionPhase::ReadingBody
        )
    }
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::AwaitingStatus => "awaiting_status",
            ConnectionPhase::AwaitingAuthChallenge => "awaiting_auth_challenge",
            ConnectionPhase::AwaitingContentLength => "awaiting_content_length",
            ConnectionPhase::ReadingBody => "reading_body",
            ConnectionPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}
