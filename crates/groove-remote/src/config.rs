//! Connection configuration for a remote session.
//!
//! `RemoteConfig` is the caller-facing option bag; `Endpoint` is the resolved,
//! immutable target both transports are addressed through.

use std::fmt;

pub const DEFAULT_PROTOCOL: &str = "http:";
pub const DEFAULT_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 16242;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Options recognized when constructing a session. Unset fields fall back to
/// the defaults at resolution time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Scheme selecting the secure or insecure variant of both transports,
    /// e.g. `"http:"`, `"https"`, `"wss:"`.
    pub protocol: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
}

impl RemoteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Recognizes `GROOVEBASIN_PROTOCOL`, `GROOVEBASIN_HOSTNAME` and
    /// `GROOVEBASIN_PORT`. Variables that are unset stay unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let protocol = std::env::var("GROOVEBASIN_PROTOCOL").ok();
        let hostname = std::env::var("GROOVEBASIN_HOSTNAME").ok();
        let port = match std::env::var("GROOVEBASIN_PORT") {
            Ok(value) => Some(value.parse::<u16>().map_err(|e| {
                ConfigError::InvalidValue("GROOVEBASIN_PORT".to_string(), e.to_string())
            })?),
            Err(_) => None,
        };

        Ok(Self {
            protocol,
            hostname,
            port,
        })
    }

    /// Fills unset fields from `other`, keeping the values already present.
    pub fn or(self, other: RemoteConfig) -> Self {
        Self {
            protocol: self.protocol.or(other.protocol),
            hostname: self.hostname.or(other.hostname),
            port: self.port.or(other.port),
        }
    }

    /// Applies defaults and derives the security flag.
    pub fn resolve(&self) -> Endpoint {
        let protocol = self.protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL);
        let hostname = match self.hostname.as_deref() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => DEFAULT_HOSTNAME.to_string(),
        };
        // A zero port means "unset".
        let port = match self.port {
            Some(p) if p != 0 => p,
            _ => DEFAULT_PORT,
        };
        Endpoint {
            secure: is_protocol_secure(protocol),
            hostname,
            port,
        }
    }
}

/// Returns true for `wss` or `https`, case-insensitive, with an optional
/// trailing colon.
pub fn is_protocol_secure(protocol: &str) -> bool {
    let scheme = protocol.strip_suffix(':').unwrap_or(protocol);
    scheme.eq_ignore_ascii_case("wss") || scheme.eq_ignore_ascii_case("https")
}

/// The resolved target of a session. Fixed once the session is constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub secure: bool,
    pub hostname: String,
    pub port: u16,
}

impl Endpoint {
    pub fn ws_scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    pub fn http_scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }

    /// URL of the duplexed transport, always rooted at `/`.
    pub fn ws_url(&self) -> String {
        format!("{}://{}/", self.ws_scheme(), self.authority())
    }

    /// Base URL for companion requests.
    pub fn http_url(&self) -> String {
        format!("{}://{}/", self.http_scheme(), self.authority())
    }

    fn authority(&self) -> String {
        // IPv6 literals need brackets inside a URL.
        if self.hostname.contains(':') && !self.hostname.starts_with('[') {
            format!("[{}]:{}", self.hostname, self.port)
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.http_url())
    }
}
