//! Manages the lifecycle of one remote-control connection.
//!
//! A `Session` owns the transport halves, the authentication token and the
//! event channel. Inbound frames are read by a background task which decodes
//! them and dispatches either the token handshake or a generic message event.

use crate::{
    config::{Endpoint, RemoteConfig},
    error::RemoteError,
    protocol::{self, Envelope},
    transport::{FrameSink, FrameStream, Transport, WebSocketTransport},
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::{
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{Instrument, debug, error, info, instrument, trace, warn};

/// The observable surface of a session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The server issued a token; the session is authenticated.
    Connect,
    /// A non-reserved envelope arrived.
    Message { name: String, args: Value },
    /// A recoverable failure. Never fatal to the session.
    Error(Arc<RemoteError>),
    /// The transport reported closure.
    Close,
}

/// Receiving half of a subscription. Unbounded, so a slow subscriber never
/// loses events.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// State shared between the session handle and its reader task.
struct Shared {
    subscribers: StdMutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
    token: watch::Sender<Option<Value>>,
}

impl Shared {
    fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber, pruning dropped ones.
    fn emit(&self, event: SessionEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            trace!("Dropped session event, no subscribers");
        }
    }

    fn emit_error(&self, err: RemoteError) {
        warn!(error = %err, "Session error");
        self.emit(SessionEvent::Error(Arc::new(err)));
    }

    fn handle_frame(&self, frame: Message) {
        match frame {
            Message::Text(text) => match protocol::decode(&text) {
                Ok(envelope) => self.dispatch(envelope),
                // A malformed frame is reported and goes no further.
                Err(e) => self.emit_error(e),
            },
            Message::Binary(data) => {
                warn!(len = data.len(), "Ignoring binary frame, text frames only");
            }
            Message::Close(frame) => debug!(?frame, "Received close frame"),
            _ => {}
        }
    }

    fn dispatch(&self, envelope: Envelope) {
        if envelope.is_token() {
            // A null token is no token; the session stays unauthenticated.
            if envelope.args.is_null() {
                warn!("Ignoring token message without a token");
                return;
            }
            let already_authenticated = self.token.borrow().is_some();
            if already_authenticated {
                self.emit_error(RemoteError::TokenTwice);
                self.token.send_replace(Some(envelope.args));
            } else {
                self.token.send_replace(Some(envelope.args));
                info!("Session authenticated");
                self.emit(SessionEvent::Connect);
            }
        } else {
            debug!(name = %envelope.name, "Received message");
            self.emit(SessionEvent::Message {
                name: envelope.name,
                args: envelope.args,
            });
        }
    }
}

/// Reads inbound frames in transport order until the stream ends.
async fn read_frames(shared: Arc<Shared>, mut stream: FrameStream) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(frame) => shared.handle_frame(frame),
            Err(e) => {
                error!(error = %e, "Transport error");
                shared.emit(SessionEvent::Error(Arc::new(RemoteError::Transport(e))));
            }
        }
    }
    // A closed transport's token must not outlive it.
    shared.token.send_replace(None);
    info!("Transport closed");
    shared.emit(SessionEvent::Close);
}

/// A live transport: the outbound half plus the task draining the inbound half.
struct Link {
    sink: Mutex<FrameSink>,
    reader: JoinHandle<()>,
}

/// A remote-control session against one media server.
pub struct Session {
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
    pub(crate) http: reqwest::Client,
    shared: Arc<Shared>,
    link: Option<Link>,
}

impl Session {
    /// Creates a session using the WebSocket transport. No network activity
    /// happens until [`Session::connect`].
    pub fn new(config: RemoteConfig) -> Self {
        Self::with_transport(config, WebSocketTransport::new())
    }

    /// Creates a session over a caller-provided transport.
    pub fn with_transport(config: RemoteConfig, transport: impl Transport + 'static) -> Self {
        let (token, _) = watch::channel(None);
        Self {
            endpoint: config.resolve(),
            transport: Arc::new(transport),
            http: reqwest::Client::new(),
            shared: Arc::new(Shared {
                subscribers: StdMutex::new(Vec::new()),
                token,
            }),
            link: None,
        }
    }

    /// Replaces the HTTP client used for companion requests.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Registers a new subscriber. Every event emitted afterwards is
    /// delivered to it in order. Dropping the receiver unsubscribes it.
    pub fn subscribe(&self) -> EventReceiver {
        self.shared.subscribe()
    }

    /// The current token, if the server has issued one on this connection.
    pub fn token(&self) -> Option<Value> {
        self.shared.token.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.shared.token.borrow().is_some()
    }

    /// Observes token changes: issued, overwritten, or cleared on close.
    pub fn token_changes(&self) -> watch::Receiver<Option<Value>> {
        self.shared.token.subscribe()
    }

    /// True while a transport is open and its reader task is running.
    pub fn is_connected(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| !link.reader.is_finished())
    }

    /// Opens the duplexed transport and starts reading from it.
    ///
    /// Resolves once the transport is open. Authentication completes later and
    /// is signalled by [`SessionEvent::Connect`]. Fails with
    /// [`RemoteError::AlreadyConnected`] while a live transport exists; a
    /// transport that has already closed is replaced.
    #[instrument(name = "connect", skip(self), fields(endpoint = %self.endpoint))]
    pub async fn connect(&mut self) -> Result<(), RemoteError> {
        if self.is_connected() {
            return Err(RemoteError::AlreadyConnected);
        }

        let url = self.endpoint.ws_url();
        info!(%url, "Opening transport");
        let (sink, stream) = self.transport.open(&url).await.map_err(|e| {
            error!(error = %e, "Failed to open transport");
            RemoteError::Transport(e)
        })?;

        let reader = tokio::spawn(read_frames(self.shared.clone(), stream).in_current_span());
        self.link = Some(Link {
            sink: Mutex::new(sink),
            reader,
        });
        Ok(())
    }

    /// Closes the active transport. [`SessionEvent::Close`] follows once the
    /// transport reports closure.
    pub async fn close(&self) -> Result<(), RemoteError> {
        let link = self.link.as_ref().ok_or(RemoteError::NotConnected)?;
        info!("Closing transport");
        match link.sink.lock().await.close().await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sends `{name, args}` as one text frame.
    ///
    /// A payload that cannot be serialized is reported on the event channel
    /// and nothing is sent; the call itself still succeeds. Transport failures
    /// are returned.
    pub async fn send_message<A>(&self, name: &str, args: &A) -> Result<(), RemoteError>
    where
        A: Serialize + ?Sized,
    {
        let link = self.link.as_ref().ok_or(RemoteError::NotConnected)?;
        let text = match protocol::encode(name, args) {
            Ok(text) => text,
            Err(e) => {
                self.shared.emit_error(e);
                return Ok(());
            }
        };
        debug!(%name, len = text.len(), "Sending message");
        link.sink.lock().await.send(Message::text(text)).await?;
        Ok(())
    }
}

/// Alias kept for callers that prefer a factory function.
pub fn create_client(config: RemoteConfig) -> Session {
    Session::new(config)
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.reader.abort();
        }
    }
}
