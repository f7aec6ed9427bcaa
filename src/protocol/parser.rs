//! MJPEG stream parser
//!
//! A sans-IO state machine: the caller appends socket bytes to a `BytesMut`
//! and calls [`StreamParser::parse`] until it returns `Ok(None)`, meaning more
//! bytes are needed. Each scan consumes its input exactly once; a frame is only
//! emitted after its full declared length is buffered.
//!
//! ```text
//!   Status ──401──► ChallengeHeader ──► ChallengeLine ──Basic/Digest──► Status
//!     │                                      │
//!     │ other                                │ unknown (lenient)
//!     ▼                                      ▼
//!   ContentLengthHeader ◄───────────── ContentLengthValue ◄──┐
//!     │                                                      │
//!     └──► ContentLengthValue ──► Body(n) ──► frame ─────────┘
//! ```

use std::sync::OnceLock;

use bytes::{Buf, Bytes, BytesMut};
use regex::bytes::Regex;

use crate::client::config::{AuthMode, Credentials};
use crate::client::state::ConnectionPhase;
use crate::error::ProtocolError;

use super::auth::{authorized_request, basic_header, digest_header, Challenge, DigestChallenge};
use super::constants::*;

/// Output of the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// Bytes to write to the socket (authenticated re-request)
    Request(Bytes),
    /// A complete JPEG payload
    Frame(Bytes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Scanning for `HTTP/1.x nnn `
    Status,
    /// Scanning for `WWW-Authenticate:`
    ChallengeHeader,
    /// Collecting the challenge value up to `\r\n`
    ChallengeLine,
    /// Scanning for `Content-Length:`
    ContentLengthHeader,
    /// Collecting the header block up to `\r\n\r\n`
    ContentLengthValue,
    /// Waiting for a body of the given length
    Body(usize),
}

/// Protocol state machine for one upstream connection
#[derive(Debug)]
pub struct StreamParser {
    auth: AuthMode,
    credentials: Credentials,
    step: Step,
    /// Realm/nonce from a digest challenge, set at most once
    digest: Option<DigestChallenge>,
    /// Whether a 401 has already been answered on this connection
    challenged: bool,
    max_header_size: usize,
    max_frame_size: usize,
}

impl StreamParser {
    /// Create a parser awaiting the status line
    pub fn new(auth: AuthMode, credentials: Credentials) -> Self {
        Self {
            auth,
            credentials,
            step: Step::Status,
            digest: None,
            challenged: false,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Override the header scan and frame size limits
    pub fn with_limits(mut self, max_header_size: usize, max_frame_size: usize) -> Self {
        self.max_header_size = max_header_size;
        self.max_frame_size = max_frame_size;
        self
    }

    /// Request to send once the socket is connected
    ///
    /// Basic auth is sent up front; digest waits for the challenge.
    pub fn initial_request(&self) -> Bytes {
        match self.auth {
            AuthMode::Basic => {
                tracing::debug!("Using basic authentication");
                authorized_request(&basic_header(
                    &self.credentials.username,
                    &self.credentials.password,
                ))
            }
            AuthMode::None | AuthMode::Digest => Bytes::from_static(REQUEST),
        }
    }

    /// Current connection phase
    pub fn phase(&self) -> ConnectionPhase {
        match self.step {
            Step::Status => ConnectionPhase::AwaitingStatus,
            Step::ChallengeHeader | Step::ChallengeLine => ConnectionPhase::AwaitingAuthChallenge,
            Step::ContentLengthHeader | Step::ContentLengthValue => {
                ConnectionPhase::AwaitingContentLength
            }
            Step::Body(_) => ConnectionPhase::ReadingBody,
        }
    }

    /// Digest challenge state, if one was received
    pub fn digest_challenge(&self) -> Option<&DigestChallenge> {
        self.digest.as_ref()
    }

    /// Advance over buffered bytes
    ///
    /// Returns the next event, or `Ok(None)` when more input is needed.
    pub fn parse(&mut self, buf: &mut BytesMut) -> Result<Option<ParseEvent>, ProtocolError> {
        loop {
            match self.step {
                Step::Status => {
                    let Some(end) = find_status_line(buf) else {
                        self.check_scan_limit(buf, "HTTP status line")?;
                        return Ok(None);
                    };
                    let token = buf.split_to(end);
                    if token.ends_with(UNAUTHORIZED_SUFFIX) {
                        if self.challenged {
                            return Err(ProtocolError::Unauthorized);
                        }
                        self.step = Step::ChallengeHeader;
                    } else {
                        self.step = Step::ContentLengthHeader;
                    }
                }
                Step::ChallengeHeader => {
                    if !skip_past(buf, WWW_AUTHENTICATE) {
                        return Ok(None);
                    }
                    self.step = Step::ChallengeLine;
                }
                Step::ChallengeLine => {
                    let Some(line) = self.take_until(buf, LINE_END, "end of challenge line")? else {
                        return Ok(None);
                    };
                    let line = String::from_utf8_lossy(&line).into_owned();
                    match self.answer_challenge(&line) {
                        Some(request) => {
                            self.step = Step::Status;
                            return Ok(Some(ParseEvent::Request(request)));
                        }
                        None => {
                            tracing::warn!(header = %line.trim(), "Unknown authentication header");
                            self.step = Step::ContentLengthHeader;
                        }
                    }
                }
                Step::ContentLengthHeader => {
                    if !skip_past(buf, CONTENT_LENGTH) {
                        return Ok(None);
                    }
                    self.step = Step::ContentLengthValue;
                }
                Step::ContentLengthValue => {
                    let Some(block) = self.take_until(buf, HEADER_END, "end of frame header")? else {
                        return Ok(None);
                    };
                    let length = self.content_length(&block)?;
                    self.step = Step::Body(length);
                }
                Step::Body(length) => {
                    if buf.len() < length {
                        buf.reserve(length - buf.len());
                        return Ok(None);
                    }
                    let frame = buf.split_to(length).freeze();
                    self.step = Step::ContentLengthHeader;
                    return Ok(Some(ParseEvent::Frame(frame)));
                }
            }
        }
    }

    fn answer_challenge(&mut self, line: &str) -> Option<Bytes> {
        let username = &self.credentials.username;
        let password = &self.credentials.password;

        match Challenge::parse(line)? {
            Challenge::Basic { realm } => {
                tracing::debug!(realm = %realm, "Using basic authentication");
                self.challenged = true;
                Some(authorized_request(&basic_header(username, password)))
            }
            Challenge::Digest(challenge) => {
                tracing::debug!(realm = %challenge.realm, "Using digest authentication");
                let header = digest_header(REQUEST_METHOD, REQUEST_PATH, username, password, &challenge);
                self.digest = Some(challenge);
                self.challenged = true;
                Some(authorized_request(&header))
            }
        }
    }

    fn content_length(&self, block: &[u8]) -> Result<usize, ProtocolError> {
        static DIGITS: OnceLock<Regex> = OnceLock::new();
        let digits = DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("valid digits regex"));

        let Some(m) = digits.find(block) else {
            return Err(ProtocolError::MissingContentLength(
                String::from_utf8_lossy(block).into_owned(),
            ));
        };

        // Digit runs are ASCII, so the UTF-8 conversion cannot fail
        let length = std::str::from_utf8(m.as_bytes())
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(usize::MAX);

        if length > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                length,
                max: self.max_frame_size,
            });
        }
        Ok(length)
    }

    /// Split off everything before `delim` and consume the delimiter
    fn take_until(
        &self,
        buf: &mut BytesMut,
        delim: &[u8],
        expected: &'static str,
    ) -> Result<Option<BytesMut>, ProtocolError> {
        match find(buf, delim) {
            Some(pos) => {
                let block = buf.split_to(pos);
                buf.advance(delim.len());
                Ok(Some(block))
            }
            None => {
                self.check_scan_limit(buf, expected)?;
                Ok(None)
            }
        }
    }

    fn check_scan_limit(&self, buf: &BytesMut, expected: &'static str) -> Result<(), ProtocolError> {
        if buf.len() > self.max_header_size {
            return Err(ProtocolError::HeaderTooLong {
                expected,
                limit: self.max_header_size,
            });
        }
        Ok(())
    }
}

/// End offset of the first status line token in `buf`
fn find_status_line(buf: &[u8]) -> Option<usize> {
    static STATUS: OnceLock<Regex> = OnceLock::new();
    let status = STATUS.get_or_init(|| Regex::new(STATUS_LINE_PATTERN).expect("valid status regex"));
    status.find(buf).map(|m| m.end())
}

/// Consume through `pattern`
///
/// When absent, bytes that cannot start a match are dropped so a long run of
/// inter-frame noise does not grow the buffer.
fn skip_past(buf: &mut BytesMut, pattern: &[u8]) -> bool {
    match find(buf, pattern) {
        Some(pos) => {
            buf.advance(pos + pattern.len());
            true
        }
        None => {
            let keep = pattern.len() - 1;
            if buf.len() > keep {
                buf.advance(buf.len() - keep);
            }
            false
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
