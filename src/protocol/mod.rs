//! MJPEG stream protocol
//!
//! The capture process answers `GET / HTTP/1.0` with a status line, an
//! optional 401 challenge, and then an unbounded run of
//! `Content-Length: <n>\r\n\r\n<n bytes>` frames:
//!
//! ```text
//! Client                                        Capture process
//!   |------- GET / HTTP/1.0 -------------------->|
//!   |<------ HTTP/1.0 401 ... WWW-Authenticate --|   (optional)
//!   |------- GET / + Authorization ------------->|
//!   |<------ HTTP/1.0 200 OK --------------------|
//!   |<------ Content-Length: n + JPEG -----------|
//!   |<------ Content-Length: n + JPEG -----------|
//!   |                   ...                      |
//! ```
//!
//! [`StreamParser`] implements this as a sans-IO state machine; the I/O
//! loop lives in [`crate::client::connection`].

pub mod auth;
pub mod constants;
pub mod parser;

pub use auth::{basic_header, digest_header, Challenge, DigestChallenge};
pub use parser::{ParseEvent, StreamParser};
