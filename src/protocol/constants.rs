//! Protocol constants
//!
//! Byte patterns and limits for the capture process's MJPEG stream.

/// Request sent on connect
pub const REQUEST: &[u8] = b"GET / HTTP/1.0\r\n\r\n";

/// Method used in the request and in digest computation
pub const REQUEST_METHOD: &str = "GET";

/// Path used in the request and in digest computation
pub const REQUEST_PATH: &str = "/";

/// Start of an HTTP status line: `HTTP/1.<digit> <code> `
///
/// ASCII digits only; the stream is raw bytes, not text.
pub const STATUS_LINE_PATTERN: &str = r"HTTP/1\.[0-9] [0-9]+ ";

/// Status token suffix that triggers the auth challenge scan
pub const UNAUTHORIZED_SUFFIX: &[u8] = b"401 ";

/// Challenge header name
pub const WWW_AUTHENTICATE: &[u8] = b"WWW-Authenticate:";

/// Frame length header name
pub const CONTENT_LENGTH: &[u8] = b"Content-Length:";

/// End of a single header line
pub const LINE_END: &[u8] = b"\r\n";

/// End of a header block
pub const HEADER_END: &[u8] = b"\r\n\r\n";

/// Number of frame arrival timestamps kept for frame rate computation
pub const FPS_SAMPLES: usize = 4;

/// Default upstream host (the capture process runs locally)
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bytes scanned for a header delimiter before giving up
pub const DEFAULT_MAX_HEADER_SIZE: usize = 64 * 1024;

/// Default upper bound on a single JPEG frame
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Default socket read size
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;
