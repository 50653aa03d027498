//! Subcommand implementations.

use crate::cli::{Cli, Command};
use anyhow::{Context, Result, anyhow, bail};
use groove_remote::{EventReceiver, RemoteConfig, RequestOptions, Session, SessionEvent};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

/// Renders an event as one JSON line for stdout.
pub fn event_to_json(event: &SessionEvent) -> Value {
    match event {
        SessionEvent::Connect => json!({ "event": "connect" }),
        SessionEvent::Message { name, args } => {
            json!({ "event": "message", "name": name, "args": args })
        }
        SessionEvent::Error(err) => json!({ "event": "error", "message": err.to_string() }),
        SessionEvent::Close => json!({ "event": "close" }),
    }
}

/// Connects and executes the parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    let env_config = RemoteConfig::from_env().context("Failed to load configuration")?;
    let config = cli.config().or(env_config);
    let auth_timeout = cli.auth_timeout();

    let mut session = Session::new(config);
    let mut events = session.subscribe();
    info!(endpoint = %session.endpoint(), "Connecting to server...");
    session.connect().await.context("Failed to connect")?;

    match cli.command {
        Command::Listen => listen(&session, &mut events).await,
        Command::Send { name, args } => {
            wait_for_auth(&mut events, auth_timeout).await?;
            session
                .send_message(&name, &args.unwrap_or(Value::Null))
                .await
                .context("Failed to send message")?;
            listen(&session, &mut events).await
        }
        Command::Request {
            method,
            path,
            headers,
        } => {
            wait_for_auth(&mut events, auth_timeout).await?;
            let mut options = RequestOptions::new(method, path);
            for (name, value) in &headers {
                options = options.try_header(name, value)?;
            }
            let response = session
                .request(options)
                .await
                .context("Companion request failed")?;
            let status = response.status();
            let body = response.text().await.context("Failed to read response body")?;
            println!("{status}");
            println!("{body}");
            session.close().await.context("Failed to close session")?;
            Ok(())
        }
    }
}

/// Waits until the server issues a token, printing anything that arrives first.
async fn wait_for_auth(events: &mut EventReceiver, limit: Duration) -> Result<()> {
    let handshake = async {
        loop {
            match events.recv().await {
                Some(SessionEvent::Connect) => return Ok::<(), anyhow::Error>(()),
                Some(SessionEvent::Close) => bail!("Connection closed before authentication"),
                Some(event) => println!("{}", event_to_json(&event)),
                None => bail!("Session event channel closed"),
            }
        }
    };
    tokio::time::timeout(limit, handshake)
        .await
        .map_err(|_| anyhow!("Server did not issue a token within {limit:?}"))?
}

/// Prints events until the transport closes or Ctrl+C is pressed.
async fn listen(session: &Session, events: &mut EventReceiver) -> Result<()> {
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Some(event) => {
                    println!("{}", event_to_json(&event));
                    if matches!(event, SessionEvent::Close) {
                        return Ok(());
                    }
                }
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal. Closing session...");
                session.close().await.context("Failed to close session")?;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groove_remote::RemoteError;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[test]
    fn test_event_to_json() {
        assert_eq!(event_to_json(&SessionEvent::Connect), json!({"event": "connect"}));
        assert_eq!(event_to_json(&SessionEvent::Close), json!({"event": "close"}));
        assert_eq!(
            event_to_json(&SessionEvent::Message {
                name: "volumeUpdate".into(),
                args: json!(0.5),
            }),
            json!({"event": "message", "name": "volumeUpdate", "args": 0.5})
        );
        assert_eq!(
            event_to_json(&SessionEvent::Error(Arc::new(RemoteError::TokenTwice))),
            json!({"event": "error", "message": "received token twice"})
        );
    }

    #[tokio::test]
    async fn test_wait_for_auth_returns_on_connect() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(SessionEvent::Message {
            name: "hello".into(),
            args: Value::Null,
        })
        .unwrap();
        tx.send(SessionEvent::Connect).unwrap();
        wait_for_auth(&mut rx, Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_auth_fails_on_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(SessionEvent::Close).unwrap();
        let err = wait_for_auth(&mut rx, Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("closed before authentication"));
    }

    #[tokio::test]
    async fn test_wait_for_auth_times_out() {
        let (_tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();
        let err = wait_for_auth(&mut rx, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not issue a token"));
    }

    #[tokio::test]
    async fn test_wait_for_auth_fails_when_session_is_gone() {
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();
        drop(tx);
        let err = wait_for_auth(&mut rx, Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("event channel closed"));
    }
}
