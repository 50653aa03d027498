//! Argument definitions.

use clap::{Parser, Subcommand};
use groove_remote::RemoteConfig;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "groove-remote", version, about = "Remote control for a Groove Basin server")]
pub struct Cli {
    /// Scheme of the server, e.g. `http:` or `https:`. Overrides GROOVEBASIN_PROTOCOL.
    #[arg(long, global = true)]
    pub protocol: Option<String>,

    /// Overrides GROOVEBASIN_HOSTNAME.
    #[arg(long, global = true)]
    pub hostname: Option<String>,

    /// Overrides GROOVEBASIN_PORT.
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Seconds to wait for the server to issue a token.
    #[arg(long, global = true, default_value_t = 10)]
    pub auth_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every session event as a JSON line until the connection closes.
    Listen,
    /// Send one message once authenticated, then keep listening.
    Send {
        name: String,
        /// JSON payload; `null` when omitted.
        #[arg(value_parser = parse_json)]
        args: Option<Value>,
    },
    /// Perform a companion HTTP request with the session token.
    Request {
        #[arg(value_parser = parse_method)]
        method: Method,
        path: String,
        /// Extra header as `name:value`. Repeatable.
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },
}

impl Cli {
    /// Connection options given on the command line. Unset values are later
    /// filled from the environment.
    pub fn config(&self) -> RemoteConfig {
        RemoteConfig {
            protocol: self.protocol.clone(),
            hostname: self.hostname.clone(),
            port: self.port,
        }
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout)
    }
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("not valid JSON: {e}"))
}

fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("invalid HTTP method: {raw}"))
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected name:value, got {raw}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {raw}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
