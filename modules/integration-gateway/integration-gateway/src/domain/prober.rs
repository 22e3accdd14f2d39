//! Endpoint discovery: try candidates in priority order until one answers
//! with a structurally valid body.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use http::{Method, StatusCode, header};
use integration_gateway_sdk::{Credential, GatewayError, ProbeAttempt, Session, SessionKind};
use serde_json::{Map, Value};
use url::Url;

use crate::config::HttpMethod;
use crate::domain::elapsed_ms;
use crate::domain::registry::{Dialect, Operation, Provider};
use crate::infra::http::{HttpTransport, OutboundRequest, TransportError, join_url};
use crate::infra::jsonrpc::{self, METHOD_NOT_FOUND};

/// Everything one probe run needs.
pub struct ProbeContext<'a> {
    pub provider: &'a Provider,
    pub operation: &'a Operation,
    pub credential: &'a Credential,
    pub session: &'a Session,
    pub params: &'a Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ProbeSuccess {
    pub value: Value,
    /// Index of the winning candidate in priority order.
    pub index: usize,
    /// Candidates rejected before the winner.
    pub attempts: Vec<ProbeAttempt>,
}

/// Result of trying a single candidate.
enum Outcome {
    Success(Value),
    /// Record the reason and move on to the next candidate.
    Skip(String),
    /// Stop probing; the error applies to every candidate.
    Abort(GatewayError),
}

pub struct EndpointProber {
    transport: HttpTransport,
    default_timeout: Duration,
}

impl EndpointProber {
    #[must_use]
    pub fn new(transport: HttpTransport, default_timeout: Duration) -> Self {
        Self {
            transport,
            default_timeout,
        }
    }

    /// Runs the operation, trying `preferred` first when given.
    ///
    /// A failing preferred candidate is not retried in the full pass that follows.
    ///
    /// # Errors
    ///
    /// - `AuthExpired` as soon as any candidate answers 401/403 or the RPC
    ///   layer reports the session as gone.
    /// - `RemoteRejected` for an explicit JSON-RPC domain error.
    /// - `Network` when the request cannot be built for this credential at all.
    /// - `EndpointNotFound` with every rejection reason once all candidates fail.
    pub async fn execute(
        &self,
        ctx: &ProbeContext<'_>,
        preferred: Option<usize>,
    ) -> Result<ProbeSuccess, GatewayError> {
        let candidates = &ctx.operation.candidates;
        let preferred = preferred.filter(|i| *i < candidates.len());
        let order = preferred
            .into_iter()
            .chain((0..candidates.len()).filter(|i| Some(*i) != preferred));

        let mut attempts = Vec::new();
        for index in order {
            let template = &candidates[index].template;
            let started = Instant::now();
            let outcome = self.try_candidate(ctx, template).await;
            let elapsed_ms = elapsed_ms(started);

            match outcome {
                Outcome::Success(value) => {
                    tracing::debug!(index, template, elapsed_ms, "candidate answered");
                    return Ok(ProbeSuccess {
                        value,
                        index,
                        attempts,
                    });
                }
                Outcome::Skip(reason) => {
                    tracing::debug!(index, template, elapsed_ms, %reason, "candidate rejected");
                    attempts.push(ProbeAttempt::new(index, template.clone(), reason));
                }
                Outcome::Abort(err) => {
                    tracing::debug!(index, template, elapsed_ms, error = %err, "probe aborted");
                    return Err(err);
                }
            }
        }
        Err(GatewayError::endpoint_not_found(attempts))
    }

    async fn try_candidate(&self, ctx: &ProbeContext<'_>, template: &str) -> Outcome {
        let timeout = ctx.operation.timeout.unwrap_or(self.default_timeout);
        let request = match &ctx.provider.dialect {
            Dialect::Rest => rest_request(ctx, template, timeout),
            Dialect::JsonRpc { path } => rpc_request(ctx, path, template, timeout),
        };
        let request = match request {
            Ok(r) => r,
            Err(BuildError::Skip(reason)) => return Outcome::Skip(reason),
            Err(BuildError::Fatal(e)) => return Outcome::Abort(e.into()),
        };

        let response = match self.transport.send(request).await {
            Ok(r) => r,
            Err(e) => return Outcome::Skip(e.to_string()),
        };

        if matches!(
            response.status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Outcome::Abort(GatewayError::auth_expired(
                format!("candidate '{template}' answered HTTP {}", response.status.as_u16()),
                Some(response.status.as_u16()),
            ));
        }
        if !response.status.is_success() {
            return Outcome::Skip(format!("HTTP {}", response.status.as_u16()));
        }

        let body = match response.json() {
            Ok(v) => v,
            Err(e) => return Outcome::Skip(format!("body is not JSON: {e}")),
        };

        let body = match ctx.provider.dialect {
            Dialect::Rest => body,
            Dialect::JsonRpc { .. } => match jsonrpc::parse_response(body) {
                Ok(Ok(result)) => result,
                Ok(Err(rpc)) if rpc.code == METHOD_NOT_FOUND => {
                    return Outcome::Skip(format!("method not found: {}", rpc.detail()));
                }
                Ok(Err(rpc)) if rpc.is_session_rejected() => {
                    return Outcome::Abort(GatewayError::auth_expired(rpc.detail(), None));
                }
                Ok(Err(rpc)) => {
                    return Outcome::Abort(GatewayError::remote_rejected(rpc.code, rpc.detail()));
                }
                Err(reason) => return Outcome::Skip(reason),
            },
        };

        match ctx.operation.shape.extract(body) {
            Ok(value) => Outcome::Success(value),
            Err(reason) => Outcome::Skip(format!("unexpected shape: {reason}")),
        }
    }
}

enum BuildError {
    /// This candidate cannot be built but another might.
    Skip(String),
    /// No candidate can be built for this credential.
    Fatal(TransportError),
}

fn rest_request(
    ctx: &ProbeContext<'_>,
    template: &str,
    timeout: Duration,
) -> Result<OutboundRequest, BuildError> {
    let (path, rest) = fill_template(template, ctx.params, &ctx.credential.extra)
        .map_err(BuildError::Skip)?;
    let mut url = join_url(&ctx.credential.base_url, &path).map_err(BuildError::Fatal)?;

    let method = ctx.operation.method.as_http();
    let mut req = match ctx.operation.method {
        HttpMethod::Get => {
            append_query(&mut url, &rest);
            OutboundRequest::new(method, url, timeout)
        }
        HttpMethod::Post => {
            OutboundRequest::new(method, url, timeout).json(&Value::Object(rest))
        }
    };
    req = req
        .header(header::ACCEPT, "application/json")
        .map_err(BuildError::Fatal)?;
    apply_session(req, ctx.session, false).map_err(BuildError::Fatal)
}

fn rpc_request(
    ctx: &ProbeContext<'_>,
    path: &str,
    method: &str,
    timeout: Duration,
) -> Result<OutboundRequest, BuildError> {
    let url = join_url(&ctx.credential.base_url, path).map_err(BuildError::Fatal)?;
    let auth = match ctx.session.kind {
        SessionKind::RpcAuthToken => Some(ctx.session.artifact.expose()),
        SessionKind::Bearer | SessionKind::Cookie => None,
    };
    let body = jsonrpc::request(method, Value::Object(ctx.params.clone()), auth);
    let req = OutboundRequest::new(Method::POST, url, timeout).json(&body);
    apply_session(req, ctx.session, auth.is_some()).map_err(BuildError::Fatal)
}

/// Presents the session on the request according to its kind.
///
/// RPC tokens already embedded in a JSON-RPC envelope need nothing more;
/// elsewhere they are sent as a bearer header.
fn apply_session(
    req: OutboundRequest,
    session: &Session,
    auth_in_envelope: bool,
) -> Result<OutboundRequest, TransportError> {
    let artifact = session.artifact.expose();
    match session.kind {
        SessionKind::Cookie => req.header(header::COOKIE, artifact),
        SessionKind::RpcAuthToken if auth_in_envelope => Ok(req),
        SessionKind::Bearer | SessionKind::RpcAuthToken => {
            req.header(header::AUTHORIZATION, &format!("Bearer {artifact}"))
        }
    }
}

/// Substitutes `{name}` placeholders with URL-encoded params, falling back
/// to the credential's `extra` entries (site name, data source).
///
/// Returns the filled path and the params that were not consumed.
fn fill_template(
    template: &str,
    params: &Map<String, Value>,
    extra: &BTreeMap<String, String>,
) -> Result<(String, Map<String, Value>), String> {
    let mut rest = params.clone();
    let mut out = String::with_capacity(template.len());
    let mut remaining = template;
    while let Some(open) = remaining.find('{') {
        let Some(close) = remaining[open..].find('}') else {
            break;
        };
        let name = &remaining[open + 1..open + close];
        let value = match rest.remove(name) {
            Some(v) => scalar_text(&v),
            None => extra
                .get(name)
                .cloned()
                .ok_or_else(|| format!("missing path parameter '{name}'"))?,
        };
        out.push_str(&remaining[..open]);
        out.push_str(&urlencoding::encode(&value));
        remaining = &remaining[open + close + 1..];
    }
    out.push_str(remaining);
    Ok((out, rest))
}

fn append_query(url: &mut Url, params: &Map<String, Value>) {
    if params.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (k, v) in params {
        match v {
            Value::Array(items) => {
                for item in items {
                    pairs.append_pair(k, &scalar_text(item));
                }
            }
            other => {
                pairs.append_pair(k, &scalar_text(other));
            }
        }
    }
}

fn scalar_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
