use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::{Method, header};
use integration_gateway_sdk::{Authenticator, Credential, GatewayError, Session, SessionKind};

use super::{rejected_login, unreachable_login};
use crate::infra::http::{HttpTransport, OutboundRequest, join_url};

/// Logs in with a JSON body and replays the cookies the server sets (UniFi style).
///
/// The session expires with the earliest cookie that carries `Max-Age` or
/// `Expires`, or after the default TTL when none does.
pub struct CookieSessionAuthenticator {
    pub transport: HttpTransport,
    pub path: String,
    pub username_field: String,
    pub password_field: String,
    pub timeout: Duration,
    pub default_ttl: Duration,
}

#[async_trait]
impl Authenticator for CookieSessionAuthenticator {
    fn name(&self) -> &'static str {
        "cookie_session"
    }

    #[tracing::instrument(skip_all, fields(provider_id = %credential.provider_id))]
    async fn authenticate(&self, credential: &Credential) -> Result<Session, GatewayError> {
        let url = join_url(&credential.base_url, &self.path).map_err(|e| unreachable_login(&e))?;
        let mut body = serde_json::Map::new();
        body.insert(self.username_field.clone(), credential.principal.clone().into());
        body.insert(
            self.password_field.clone(),
            credential.secret.expose().to_owned().into(),
        );
        let req = OutboundRequest::new(Method::POST, url, self.timeout)
            .json(&serde_json::Value::Object(body));

        let resp = self
            .transport
            .send(req)
            .await
            .map_err(|e| unreachable_login(&e))?;
        if !resp.status.is_success() {
            return Err(rejected_login(&resp));
        }

        let now = Utc::now();
        let cookies: Vec<SetCookie> = resp
            .header_values(&header::SET_COOKIE)
            .filter_map(|v| SetCookie::parse(v, now))
            .filter(|c| !c.is_removal(now))
            .collect();
        if cookies.is_empty() {
            return Err(GatewayError::auth_failed(
                "login succeeded but no session cookie was set",
                Some(resp.status.as_u16()),
            ));
        }

        let jar = cookies
            .iter()
            .map(|c| c.pair.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let session = Session::new(jar, SessionKind::Cookie);
        let session = match cookies.iter().filter_map(|c| c.expires_at).min() {
            Some(at) => session.with_expires_at(at),
            None => session.expires_in(self.default_ttl),
        };
        tracing::debug!(cookies = cookies.len(), "cookie login succeeded");
        Ok(session)
    }
}

/// The parts of a `Set-Cookie` header that matter for replay.
#[derive(Debug, PartialEq, Eq)]
struct SetCookie {
    /// `name=value`
    pair: String,
    expires_at: Option<DateTime<Utc>>,
}

impl SetCookie {
    fn parse(header: &str, now: DateTime<Utc>) -> Option<Self> {
        let mut parts = header.split(';').map(str::trim);
        let pair = parts.next().filter(|p| p.contains('='))?.to_owned();

        let mut max_age = None;
        let mut expires = None;
        for attr in parts {
            let (name, value) = attr.split_once('=').unwrap_or((attr, ""));
            if name.eq_ignore_ascii_case("max-age") {
                max_age = value.trim().parse::<i64>().ok();
            } else if name.eq_ignore_ascii_case("expires") {
                expires = httpdate::parse_http_date(value.trim())
                    .ok()
                    .map(DateTime::<Utc>::from);
            }
        }

        // Max-Age wins over Expires when both are present.
        let expires_at = match max_age {
            Some(secs) => Some(
                chrono::Duration::try_seconds(secs)
                    .and_then(|d| now.checked_add_signed(d))
                    .unwrap_or(if secs > 0 {
                        DateTime::<Utc>::MAX_UTC
                    } else {
                        DateTime::<Utc>::MIN_UTC
                    }),
            ),
            None => expires,
        };
        Some(Self { pair, expires_at })
    }

    fn is_removal(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::infra::http::TransportConfig;
    use httpmock::prelude::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn parse_reads_max_age() {
        let c = SetCookie::parse("unifises=abc123; Path=/; Max-Age=3600; HttpOnly", now()).unwrap();
        assert_eq!(c.pair, "unifises=abc123");
        assert_eq!(c.expires_at, Some(now() + chrono::Duration::hours(1)));
    }

    #[test]
    fn out_of_range_max_age_saturates() {
        let c = SetCookie::parse("unifises=abc; Path=/; Max-Age=9223372036854775807", now())
            .unwrap();
        assert_eq!(c.expires_at, Some(DateTime::<Utc>::MAX_UTC));
        assert!(!c.is_removal(now()));

        let c = SetCookie::parse("unifises=; Max-Age=-9223372036854775808", now()).unwrap();
        assert!(c.is_removal(now()));
    }

    #[test]
    fn parse_reads_expires_date() {
        let c = SetCookie::parse(
            "csrf_token=xyz; expires=Sun, 01 Mar 2026 13:30:00 GMT; path=/",
            now(),
        )
        .unwrap();
        assert_eq!(c.expires_at, Some(now() + chrono::Duration::minutes(90)));
    }

    #[test]
    fn zero_max_age_is_a_removal() {
        let c = SetCookie::parse("TOKEN=; Max-Age=0", now()).unwrap();
        assert!(c.is_removal(now()));
        assert!(SetCookie::parse("garbage", now()).is_none());
    }

    fn authenticator() -> CookieSessionAuthenticator {
        CookieSessionAuthenticator {
            transport: HttpTransport::new(&TransportConfig::default()).unwrap(),
            path: "/api/login".to_owned(),
            username_field: "username".to_owned(),
            password_field: "password".to_owned(),
            timeout: Duration::from_secs(2),
            default_ttl: Duration::from_secs(3000),
        }
    }

    #[tokio::test]
    async fn login_collects_cookies_and_earliest_expiry() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/login")
                .json_body(serde_json::json!({ "username": "admin", "password": "pw" }));
            then.status(200)
                .header("set-cookie", "unifises=abc; Path=/; Max-Age=7200")
                .header("set-cookie", "csrf_token=xyz; Path=/; Max-Age=600")
                .json_body(serde_json::json!({ "meta": { "rc": "ok" }, "data": [] }));
        });

        let cred = Credential::new("unifi", server.base_url(), "admin", "pw");
        let session = authenticator().authenticate(&cred).await.unwrap();

        mock.assert();
        assert_eq!(session.kind, SessionKind::Cookie);
        assert_eq!(session.artifact.expose(), "unifises=abc; csrf_token=xyz");
        let ttl = session.expires_at.unwrap() - session.obtained_at;
        assert!((599..=600).contains(&ttl.num_seconds()), "ttl {ttl}");
    }

    #[tokio::test]
    async fn huge_max_age_still_yields_an_expiring_session() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/login");
            then.status(200)
                .header("set-cookie", "unifises=abc; Path=/; Max-Age=9223372036854775807")
                .json_body(serde_json::json!({ "meta": { "rc": "ok" } }));
        });

        let cred = Credential::new("unifi", server.base_url(), "admin", "pw");
        let session = authenticator().authenticate(&cred).await.unwrap();
        assert_eq!(session.expires_at, Some(DateTime::<Utc>::MAX_UTC));
    }

    #[tokio::test]
    async fn login_without_cookie_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/login");
            then.status(200).json_body(serde_json::json!({ "meta": { "rc": "ok" } }));
        });

        let cred = Credential::new("unifi", server.base_url(), "admin", "pw");
        let err = authenticator().authenticate(&cred).await.unwrap_err();
        assert!(matches!(err, GatewayError::AuthFailed { status: Some(200), .. }));
    }

    #[tokio::test]
    async fn bad_password_is_auth_failed_with_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/login");
            then.status(400)
                .json_body(serde_json::json!({ "meta": { "rc": "error", "msg": "api.err.Invalid" } }));
        });

        let cred = Credential::new("unifi", server.base_url(), "admin", "wrong");
        let err = authenticator().authenticate(&cred).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("api.err.Invalid"));
    }
}
