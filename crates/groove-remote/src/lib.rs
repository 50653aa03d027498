//! Remote-control client for a Groove Basin media server.
//!
//! A [`Session`] keeps one duplexed connection to the server, completes the
//! token handshake and turns inbound `{name, args}` envelopes into
//! [`SessionEvent`]s. Companion HTTP requests built through the session carry
//! the same token as a cookie.
//!
//! - `config`: connection options and the resolved endpoint.
//! - `protocol`: the JSON envelope codec.
//! - `transport`: the duplexed transport seam and its WebSocket implementation.
//! - `session`: connection lifecycle, handshake and event dispatch.
//! - `request`: the companion request bridge.
//!
//! This library uses `tracing` for logging; install a subscriber in the
//! application to see it.

pub mod config;
pub mod error;
pub mod protocol;
pub mod request;
pub mod session;
pub mod transport;

pub use config::{ConfigError, Endpoint, RemoteConfig};
pub use error::RemoteError;
pub use protocol::{Envelope, TOKEN_MESSAGE};
pub use request::RequestOptions;
pub use session::{EventReceiver, Session, SessionEvent, create_client};
pub use transport::{Transport, WebSocketTransport};
