//! Relay client configuration

use std::time::Duration;

use crate::protocol::constants::*;

/// Authentication scheme used against the capture process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// No authentication
    #[default]
    None,
    /// Basic auth, sent with the first request
    Basic,
    /// Digest auth, answered after the 401 challenge
    Digest,
}

impl AuthMode {
    /// Decode a `stream_auth_method` level: 0 = none, 1 = basic, 2+ = digest
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => AuthMode::None,
            1 => AuthMode::Basic,
            _ => AuthMode::Digest,
        }
    }
}

/// Username/password pair
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Create from a username and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse a `user:pass` string, splitting at the first `:`
    ///
    /// A string without `:` is taken as a bare username.
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((username, password)) => Self::new(username, password),
            None => Self::new(s, ""),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Per-connection configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host the capture process listens on
    pub host: String,

    /// Stream port of the camera
    pub port: u16,

    /// Authentication scheme
    pub auth: AuthMode,

    /// Credentials (ignored when `auth` is `None`)
    pub credentials: Credentials,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Bytes requested per socket read
    pub read_buffer_size: usize,

    /// Bytes scanned for a header delimiter before failing
    pub max_header_size: usize,

    /// Largest accepted frame
    pub max_frame_size: usize,

    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 8081,
            auth: AuthMode::None,
            credentials: Credentials::default(),
            connect_timeout: Duration::from_secs(10),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            tcp_nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Create a config for a local stream port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Set the upstream host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the stream port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set authentication scheme and credentials
    pub fn auth(mut self, auth: AuthMode, credentials: Credentials) -> Self {
        self.auth = auth;
        self.credentials = credentials;
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the largest accepted frame
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the header scan limit
    pub fn max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }
}
