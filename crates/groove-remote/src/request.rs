//! Companion request/response calls authenticated with the session token.

use crate::{config::Endpoint, error::RemoteError, session::Session};
use reqwest::{
    Method, RequestBuilder, Response, Url,
    header::{COOKIE, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;
use tracing::debug;

/// Describes one companion request. Built fresh per call.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Path and optional query, resolved against the session's endpoint. An
    /// absolute URL contributes only its path and query.
    pub path: String,
    /// Merged over the injected credential header; wins on key collision.
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Like [`RequestOptions::header`] but parses both halves.
    pub fn try_header(self, name: &str, value: &str) -> Result<Self, RemoteError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RemoteError::InvalidHeader(name.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| RemoteError::InvalidHeader(name.to_string()))?;
        Ok(self.header(name, value))
    }
}

/// Renders the credential cookie. Without a token this is the literal
/// `token=null`.
pub fn cookie_value(token: Option<&Value>) -> String {
    match token {
        Some(Value::String(token)) => format!("token={token}"),
        Some(other) => format!("token={other}"),
        None => "token=null".to_string(),
    }
}

/// Joins the caller's path onto the endpoint without ever changing the
/// endpoint's scheme, host or port.
pub(crate) fn target_url(endpoint: &Endpoint, path: &str) -> Result<Url, RemoteError> {
    let mut url =
        Url::parse(&endpoint.http_url()).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
    let (path, query) = match Url::parse(path) {
        Ok(absolute) => (
            absolute.path().to_string(),
            absolute.query().map(str::to_string),
        ),
        Err(_) => match path.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (path.to_string(), None),
        },
    };
    url.set_path(&path);
    url.set_query(query.as_deref());
    Ok(url)
}

impl Session {
    /// Builds a companion request against the session's endpoint with the
    /// current token injected as `Cookie: token=<token>`.
    ///
    /// The returned builder is not sent; the caller drives it.
    pub fn build_request(&self, options: RequestOptions) -> Result<RequestBuilder, RemoteError> {
        let cookie = cookie_value(self.token().as_ref());
        // The error names the header only; the value carries the credential.
        let cookie = HeaderValue::from_str(&cookie)
            .map_err(|_| RemoteError::InvalidHeader(COOKIE.as_str().to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie);
        // Caller headers replace defaults with the same name.
        headers.extend(options.headers);

        let url = target_url(self.endpoint(), &options.path)?;
        debug!(method = %options.method, %url, "Building companion request");
        Ok(self.http.request(options.method, url).headers(headers))
    }

    /// Builds and sends a companion request. The response is returned as is.
    pub async fn request(&self, options: RequestOptions) -> Result<Response, RemoteError> {
        Ok(self.build_request(options)?.send().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RemoteConfig,
        session::{
            SessionEvent,
            tests::{next_event, push},
        },
        transport::testing::channel_transport,
    };
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
    use serde_json::json;

    fn cookie_of(request: &reqwest::Request) -> Vec<&str> {
        request
            .headers()
            .get_all(COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect()
    }

    #[test]
    fn test_cookie_value_rendering() {
        assert_eq!(cookie_value(None), "token=null");
        assert_eq!(cookie_value(Some(&json!("abc"))), "token=abc");
        assert_eq!(cookie_value(Some(&json!(42))), "token=42");
        assert_eq!(cookie_value(Some(&Value::Null)), "token=null");
    }

    #[test]
    fn test_target_url_ignores_caller_host() {
        let endpoint = RemoteConfig::new().with_hostname("music.local").resolve();
        let url = target_url(&endpoint, "https://evil.example:1/upload?x=1").unwrap();
        assert_eq!(url.as_str(), "http://music.local:16242/upload?x=1");

        let url = target_url(&endpoint, "//evil.example/x").unwrap();
        assert_eq!(url.host_str(), Some("music.local"));
        assert_eq!(url.port(), Some(16242));
    }

    #[test]
    fn test_target_url_relative_paths() {
        let endpoint = RemoteConfig::new().with_protocol("https").resolve();
        let url = target_url(&endpoint, "/library/download?id=3").unwrap();
        assert_eq!(url.as_str(), "https://127.0.0.1:16242/library/download?id=3");

        let url = target_url(&endpoint, "upload").unwrap();
        assert_eq!(url.as_str(), "https://127.0.0.1:16242/upload");
    }

    #[test]
    fn test_build_request_before_token() {
        let (transport, _inbound, _outbound) = channel_transport();
        let session = Session::with_transport(RemoteConfig::default(), transport);

        let request = session
            .build_request(
                RequestOptions::get("/upload").header(AUTHORIZATION, HeaderValue::from_static("x")),
            )
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(cookie_of(&request), vec!["token=null"]);
        assert_eq!(request.headers()[AUTHORIZATION], "x");
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.url().as_str(), "http://127.0.0.1:16242/upload");
    }

    #[tokio::test]
    async fn test_build_request_after_token() {
        let (transport, inbound, _outbound) = channel_transport();
        let config = RemoteConfig::new().with_hostname("music.local").with_port(9000);
        let mut session = Session::with_transport(config, transport);
        let mut events = session.subscribe();
        session.connect().await.unwrap();

        push(&inbound, r#"{"name":"token","args":"abc"}"#);
        assert!(matches!(next_event(&mut events).await, SessionEvent::Connect));

        let request = session
            .build_request(
                RequestOptions::post("http://elsewhere:1234/upload")
                    .try_header("content-type", "application/json")
                    .unwrap(),
            )
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(cookie_of(&request), vec!["token=abc"]);
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(request.url().as_str(), "http://music.local:9000/upload");
    }

    #[test]
    fn test_caller_cookie_overrides_default() {
        let (transport, _inbound, _outbound) = channel_transport();
        let session = Session::with_transport(RemoteConfig::default(), transport);

        let request = session
            .build_request(
                RequestOptions::get("/").header(COOKIE, HeaderValue::from_static("token=mine")),
            )
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(cookie_of(&request), vec!["token=mine"]);
    }

    #[test]
    fn test_try_header_rejects_invalid_name() {
        let err = RequestOptions::get("/").try_header("bad header", "v").unwrap_err();
        assert!(matches!(err, RemoteError::InvalidHeader(_)));
    }

    #[test]
    fn test_try_header_error_omits_value() {
        let err = RequestOptions::get("/")
            .try_header("x-api-key", "secret\nvalue")
            .unwrap_err();
        assert!(matches!(&err, RemoteError::InvalidHeader(name) if name == "x-api-key"));
        assert!(!err.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn test_unencodable_token_is_not_leaked() {
        let (transport, inbound, _outbound) = channel_transport();
        let mut session = Session::with_transport(RemoteConfig::default(), transport);
        let mut events = session.subscribe();
        session.connect().await.unwrap();

        push(&inbound, r#"{"name":"token","args":"hunter2\nInjected: 1"}"#);
        assert!(matches!(next_event(&mut events).await, SessionEvent::Connect));

        let err = session.build_request(RequestOptions::get("/")).unwrap_err();
        assert!(matches!(&err, RemoteError::InvalidHeader(name) if name == "cookie"));
        let rendered = format!("{err} {err:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
