//! Outbound HTTP transport shared by authenticators, the prober and diagnostics.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use integration_gateway_sdk::GatewayError;
use thiserror::Error;
use url::Url;

/// Transport-level failures. Mapped into [`GatewayError`] before leaving the crate.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("no response within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("transport error: {0}")]
    Other(String),
}

impl From<TransportError> for GatewayError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout(_) => GatewayError::timeout(e.to_string()),
            TransportError::BodyTooLarge { .. } => GatewayError::malformed(e.to_string()),
            _ => GatewayError::network(e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

impl OutboundRequest {
    #[must_use]
    pub fn new(method: Method, url: Url, timeout: Duration) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout,
        }
    }

    /// Adds a header. Values that are not valid header text are rejected.
    ///
    /// # Errors
    ///
    /// [`TransportError::InvalidRequest`] for values containing control characters.
    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self, TransportError> {
        let mut value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidRequest(format!("bad value for header {name}")))?;
        if name == header::AUTHORIZATION || name == header::COOKIE {
            value.set_sensitive(true);
        }
        self.headers.append(name, value);
        Ok(self)
    }

    /// Sets a JSON body and the matching content type.
    #[must_use]
    pub fn json(mut self, body: &serde_json::Value) -> Self {
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(Bytes::from(body.to_string()));
        self
    }

    /// Sets a form-encoded body.
    #[must_use]
    pub fn form(mut self, pairs: &[(&str, &str)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self.body = Some(Bytes::from(encoded));
        self
    }
}

#[derive(Debug, Clone)]
pub struct OutboundResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundResponse {
    /// # Errors
    ///
    /// When the body is not valid JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// All values of a header that are valid UTF-8.
    pub fn header_values(&self, name: &HeaderName) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// Short body excerpt for diagnostics. Never includes more than 200 chars.
    #[must_use]
    pub fn body_excerpt(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let trimmed = text.trim();
        match trimmed.char_indices().nth(200) {
            Some((idx, _)) => format!("{}...", &trimmed[..idx]),
            None => trimmed.to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub max_response_bytes: usize,
    pub allow_insecure_http: bool,
    pub user_agent: String,
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_response_bytes: 8 * 1024 * 1024,
            allow_insecure_http: true,
            user_agent: concat!("integration-gateway/", env!("CARGO_PKG_VERSION")).to_owned(),
            pool_max_idle_per_host: 4,
        }
    }
}

type HyperClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Pooled hyper client over rustls with a per-request deadline and a body size cap.
#[derive(Clone)]
pub struct HttpTransport {
    client: HyperClient,
    user_agent: HeaderValue,
    max_response_bytes: usize,
}

impl HttpTransport {
    /// # Errors
    ///
    /// [`TransportError::Tls`] if the TLS connector cannot be initialised, or
    /// [`TransportError::InvalidRequest`] for a user agent that is not valid header text.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let provider = crypto_provider();
        let builder = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(provider)
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        let https = if config.allow_insecure_http {
            builder.https_or_http().enable_all_versions().build()
        } else {
            builder.https_only().enable_all_versions().build()
        };

        let mut client_builder = Client::builder(TokioExecutor::new());
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host);
        let client = client_builder.build::<_, Full<Bytes>>(https);

        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|_| TransportError::InvalidRequest("user agent is not valid header text".to_owned()))?;

        Ok(Self {
            client,
            user_agent,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Sends the request and buffers the response body.
    ///
    /// Any status code is returned as `Ok`; classifying it is the caller's job.
    ///
    /// # Errors
    ///
    /// Connection failures, the request deadline, and oversized bodies.
    pub async fn send(&self, req: OutboundRequest) -> Result<OutboundResponse, TransportError> {
        let deadline = req.timeout;
        match tokio::time::timeout(deadline, self.send_inner(req)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(deadline)),
        }
    }

    async fn send_inner(&self, req: OutboundRequest) -> Result<OutboundResponse, TransportError> {
        let mut builder = Request::builder()
            .method(req.method)
            .uri(req.url.as_str())
            .header(header::USER_AGENT, self.user_agent.clone());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(req.headers);
        }
        let request = builder
            .body(Full::new(req.body.unwrap_or_default()))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let response = self.client.request(request).await.map_err(|e| {
            if e.is_connect() {
                TransportError::Connect(error_chain(&e))
            } else {
                TransportError::Other(error_chain(&e))
            }
        })?;

        let (parts, body) = response.into_parts();
        let limit = self.max_response_bytes;
        let body = Limited::new(body, limit)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    TransportError::BodyTooLarge { limit }
                } else {
                    TransportError::Other(error_chain(e.as_ref()))
                }
            })?
            .to_bytes();

        Ok(OutboundResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Joins an error with its sources: "client error (Connect): tcp connect error: Connection refused".
fn error_chain(e: &(dyn StdError + 'static)) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        let text = s.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = s.source();
    }
    out
}

/// Appends `path` to the base URL, keeping any path prefix the base carries.
///
/// # Errors
///
/// [`TransportError::InvalidRequest`] if the result is not a valid URL.
pub fn join_url(base: &str, path: &str) -> Result<Url, TransportError> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| TransportError::InvalidRequest(format!("{joined}: {e}")))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::Method;
    use httpmock::prelude::*;

    fn transport() -> HttpTransport {
        HttpTransport::new(&TransportConfig {
            max_response_bytes: 64,
            ..TransportConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn join_url_keeps_base_prefix() {
        let url = join_url("https://bacula.test/bweb/", "/api/v2/jobs").unwrap();
        assert_eq!(url.as_str(), "https://bacula.test/bweb/api/v2/jobs");
        assert!(matches!(
            join_url("not a url", "/x"),
            Err(TransportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let err: GatewayError = TransportError::Timeout(Duration::from_secs(5)).into();
        assert!(matches!(err, GatewayError::Timeout { ref message } if message.contains("5000ms")));
        let err: GatewayError = TransportError::Connect("refused".to_owned()).into();
        assert!(matches!(err, GatewayError::Network { .. }));
    }

    #[tokio::test]
    async fn send_returns_non_success_status_as_ok() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/missing").header_exists("user-agent");
            then.status(404).body("nope");
        });

        let req = OutboundRequest::new(
            Method::GET,
            join_url(&server.base_url(), "/missing").unwrap(),
            Duration::from_secs(2),
        );
        let resp = transport().send(req).await.unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(resp.body_excerpt(), "nope");
        mock.assert();
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/big");
            then.status(200).body("x".repeat(1024));
        });

        let req = OutboundRequest::new(
            Method::GET,
            join_url(&server.base_url(), "/big").unwrap(),
            Duration::from_secs(2),
        );
        let err = transport().send(req).await.unwrap_err();
        assert!(
            matches!(err, TransportError::BodyTooLarge { limit: 64 }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn slow_server_hits_deadline() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_millis(800)).body("[]");
        });

        let req = OutboundRequest::new(
            Method::GET,
            join_url(&server.base_url(), "/slow").unwrap(),
            Duration::from_millis(100),
        );
        let err = transport().send(req).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let req = OutboundRequest::new(
            Method::GET,
            Url::parse("http://127.0.0.1:1/").unwrap(),
            Duration::from_secs(2),
        );
        let err = transport().send(req).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)), "got {err:?}");
    }
}
