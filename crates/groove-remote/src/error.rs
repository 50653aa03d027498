use tokio_tungstenite::tungstenite;

/// Every failure a session can report, either on its event channel or as the
/// `Err` of a call.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Raised by the duplexed transport and passed through unchanged.
    #[error(transparent)]
    Transport(#[from] tungstenite::Error),

    /// An inbound frame was not a valid JSON envelope.
    #[error("invalid JSON from server: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("invalid message from server: envelope name is empty")]
    EmptyName,

    /// An outbound payload could not be serialized.
    #[error("error converting message to JSON: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("received token twice")]
    TokenTwice,

    #[error("session is already connected")]
    AlreadyConnected,

    #[error("session is not connected")]
    NotConnected,

    #[error("invalid value for header {0}")]
    InvalidHeader(String),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("companion request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl RemoteError {
    /// Errors that describe misuse of the session rather than something the
    /// server or transport did.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::AlreadyConnected | Self::NotConnected)
    }
}
