//! Defines the JSON envelope exchanged over the duplexed transport.
//!
//! Every frame is a UTF-8 JSON object `{"name": string, "args": any}`. The
//! codec never inspects `args`; only the session looks at `name`.

use crate::error::RemoteError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved envelope name carrying the authentication token.
pub const TOKEN_MESSAGE: &str = "token";

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub name: String,
    /// Opaque payload; `null` when the server omits it.
    #[serde(default)]
    pub args: Value,
}

impl Envelope {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn is_token(&self) -> bool {
        self.name == TOKEN_MESSAGE
    }
}

/// Borrowed form used for encoding so callers can pass any `Serialize` value.
#[derive(Serialize)]
struct OutboundEnvelope<'a, A: ?Sized> {
    name: &'a str,
    args: &'a A,
}

/// Parses one inbound text frame.
pub fn decode(raw: &str) -> Result<Envelope, RemoteError> {
    let envelope: Envelope = serde_json::from_str(raw).map_err(RemoteError::Decode)?;
    if envelope.name.is_empty() {
        return Err(RemoteError::EmptyName);
    }
    Ok(envelope)
}

/// Serializes `{name, args}` into a single text frame.
pub fn encode<A>(name: &str, args: &A) -> Result<String, RemoteError>
where
    A: Serialize + ?Sized,
{
    serde_json::to_string(&OutboundEnvelope { name, args }).map_err(RemoteError::Encode)
}
