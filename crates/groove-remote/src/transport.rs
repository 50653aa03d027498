//! The duplexed transport seam.
//!
//! A `Transport` opens a framed, full-duplex connection and hands back its two
//! halves. The session owns both halves exclusively for the lifetime of one
//! connection.

use async_trait::async_trait;
use futures_util::{Sink, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{self, Message, protocol::WebSocketConfig},
};
use tracing::debug;

/// Ceiling for a single inbound frame (and message), 16 MiB.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Outbound half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;

/// Inbound half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message, tungstenite::Error>> + Send>>;

/// Opens duplexed connections for a session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a connection to `url`, resolving once the upgrade handshake is done.
    async fn open(&self, url: &str) -> Result<(FrameSink, FrameStream), tungstenite::Error>;
}

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    config: WebSocketConfig,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(MAX_FRAME_SIZE);
        config.max_frame_size = Some(MAX_FRAME_SIZE);
        Self { config }
    }

    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &str) -> Result<(FrameSink, FrameStream), tungstenite::Error> {
        let (ws_stream, response) = connect_async_with_config(url, Some(self.config), false).await?;
        debug!(status = %response.status(), "WebSocket handshake complete");
        let (sink, stream) = ws_stream.split();
        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
