use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use integration_gateway_sdk::{Authenticator, Credential, GatewayError, Session, SessionKind};

use super::{rejected_login, seconds_at, unreachable_login};
use crate::infra::http::{HttpTransport, OutboundRequest, join_url};

/// Exchanges username and password for a token found in the login response.
///
/// Fits Guacamole (`POST /api/tokens`, form body, `/authToken`) and the
/// Bacula/Baculum style REST APIs that return `{ "token": ..., "expires_in": ... }`.
pub struct TokenLoginAuthenticator {
    pub transport: HttpTransport,
    pub path: String,
    pub token_pointer: String,
    pub expires_in_pointer: Option<String>,
    pub username_field: String,
    pub password_field: String,
    pub form: bool,
    pub timeout: Duration,
    pub default_ttl: Duration,
}

#[async_trait]
impl Authenticator for TokenLoginAuthenticator {
    fn name(&self) -> &'static str {
        "token_login"
    }

    #[tracing::instrument(skip_all, fields(provider_id = %credential.provider_id))]
    async fn authenticate(&self, credential: &Credential) -> Result<Session, GatewayError> {
        let url = join_url(&credential.base_url, &self.path).map_err(|e| unreachable_login(&e))?;
        let req = OutboundRequest::new(Method::POST, url, self.timeout);
        let req = if self.form {
            req.form(&[
                (self.username_field.as_str(), credential.principal.as_str()),
                (self.password_field.as_str(), credential.secret.expose()),
            ])
        } else {
            let mut body = serde_json::Map::new();
            body.insert(self.username_field.clone(), credential.principal.clone().into());
            body.insert(
                self.password_field.clone(),
                credential.secret.expose().to_owned().into(),
            );
            req.json(&serde_json::Value::Object(body))
        };

        let resp = self
            .transport
            .send(req)
            .await
            .map_err(|e| unreachable_login(&e))?;
        if !resp.status.is_success() {
            return Err(rejected_login(&resp));
        }

        let body = resp.json().map_err(|e| {
            GatewayError::auth_failed(
                format!("login response is not JSON: {e}"),
                Some(resp.status.as_u16()),
            )
        })?;
        let token = body
            .pointer(&self.token_pointer)
            .and_then(serde_json::Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                GatewayError::auth_failed(
                    format!("login response has no token at '{}'", self.token_pointer),
                    Some(resp.status.as_u16()),
                )
            })?;

        let ttl = self
            .expires_in_pointer
            .as_deref()
            .and_then(|p| seconds_at(&body, p))
            .unwrap_or(self.default_ttl);
        tracing::debug!(ttl_secs = ttl.as_secs(), "token login succeeded");
        Ok(Session::new(token, SessionKind::Bearer).expires_in(ttl))
    }
}
