//! Relay connection driver
//!
//! Connects to the capture process and feeds socket bytes through the
//! [`StreamParser`], writing any re-requests it produces and publishing every
//! completed frame to the shared [`RelayEntry`].

use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::protocol::{ParseEvent, StreamParser};
use crate::registry::entry::RelayEntry;

use super::config::ClientConfig;

/// Upstream client for one camera stream
pub struct RelayClient {
    config: ClientConfig,
    entry: Arc<RelayEntry>,
}

impl RelayClient {
    /// Create a client publishing into `entry`
    pub fn new(config: ClientConfig, entry: Arc<RelayEntry>) -> Self {
        Self { config, entry }
    }

    /// Connect and stream frames until the connection fails
    ///
    /// Never reconnects; a new connection is created by the registry on the
    /// next frame request.
    pub async fn run(&self) -> Result<()> {
        let mut socket = self.connect().await?;

        tracing::debug!(
            camera = %self.entry.camera_id(),
            port = self.config.port,
            "Mjpg client connected"
        );

        self.stream(&mut socket).await
    }

    async fn connect(&self) -> Result<TcpStream> {
        let addr = (self.config.host.as_str(), self.config.port);
        let socket = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectTimeout)??;

        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(socket)
    }

    /// Run the protocol over an already connected stream
    pub async fn stream<S>(&self, socket: &mut S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut parser = StreamParser::new(self.config.auth, self.config.credentials.clone())
            .with_limits(self.config.max_header_size, self.config.max_frame_size);

        socket.write_all(&parser.initial_request()).await?;
        self.entry.set_phase(parser.phase());

        let mut buf = BytesMut::with_capacity(self.config.read_buffer_size);
        loop {
            while let Some(event) = parser.parse(&mut buf)? {
                match event {
                    ParseEvent::Request(request) => socket.write_all(&request).await?,
                    ParseEvent::Frame(frame) => self.entry.push_frame(frame, Instant::now()),
                }
            }
            self.entry.set_phase(parser.phase());

            buf.reserve(self.config.read_buffer_size);
            if socket.read_buf(&mut buf).await? == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }
}
