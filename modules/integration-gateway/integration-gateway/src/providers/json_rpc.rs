use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use integration_gateway_sdk::{Authenticator, Credential, GatewayError, Session, SessionKind};
use serde_json::Value;

use super::{rejected_login, unreachable_login};
use crate::infra::http::{HttpTransport, OutboundRequest, join_url};
use crate::infra::jsonrpc::{self, INVALID_PARAMS, RpcError};

/// JSON-RPC login (Zabbix `user.login`).
///
/// Zabbix 5.4 renamed the `user` parameter to `username`; older servers
/// answer the new name with invalid-params, so the legacy name is tried next.
pub struct JsonRpcAuthenticator {
    pub transport: HttpTransport,
    pub path: String,
    pub method: String,
    pub timeout: Duration,
    pub default_ttl: Duration,
}

const PRINCIPAL_PARAMS: [&str; 2] = ["username", "user"];

impl JsonRpcAuthenticator {
    async fn login(
        &self,
        credential: &Credential,
        principal_param: &str,
    ) -> Result<Result<String, RpcError>, GatewayError> {
        let url = join_url(&credential.base_url, &self.path).map_err(|e| unreachable_login(&e))?;
        let mut params = serde_json::Map::new();
        params.insert(principal_param.to_owned(), credential.principal.clone().into());
        params.insert(
            "password".to_owned(),
            credential.secret.expose().to_owned().into(),
        );
        let req = OutboundRequest::new(Method::POST, url, self.timeout)
            .json(&jsonrpc::request(&self.method, Value::Object(params), None));

        let resp = self
            .transport
            .send(req)
            .await
            .map_err(|e| unreachable_login(&e))?;
        if !resp.status.is_success() {
            return Err(rejected_login(&resp));
        }
        let status = Some(resp.status.as_u16());
        let body = resp.json().map_err(|e| {
            GatewayError::auth_failed(format!("login response is not JSON: {e}"), status)
        })?;

        match jsonrpc::parse_response(body).map_err(|m| GatewayError::auth_failed(m, status))? {
            Ok(Value::String(token)) if !token.is_empty() => Ok(Ok(token)),
            Ok(other) => Err(GatewayError::auth_failed(
                format!("login result is not a session id: {other}"),
                status,
            )),
            Err(rpc) => Ok(Err(rpc)),
        }
    }
}

#[async_trait]
impl Authenticator for JsonRpcAuthenticator {
    fn name(&self) -> &'static str {
        "json_rpc"
    }

    #[tracing::instrument(skip_all, fields(provider_id = %credential.provider_id))]
    async fn authenticate(&self, credential: &Credential) -> Result<Session, GatewayError> {
        let mut last_error = None;
        for param in PRINCIPAL_PARAMS {
            match self.login(credential, param).await? {
                Ok(token) => {
                    return Ok(Session::new(token, SessionKind::RpcAuthToken)
                        .expires_in(self.default_ttl));
                }
                Err(rpc) if rpc.code == INVALID_PARAMS => {
                    tracing::debug!(param, "login rejected parameter name, trying legacy form");
                    last_error = Some(rpc);
                }
                Err(rpc) => {
                    return Err(GatewayError::auth_failed(
                        format!("{} (code {})", rpc.detail(), rpc.code),
                        None,
                    ));
                }
            }
        }
        let detail = last_error.map_or_else(|| "login rejected".to_owned(), |rpc| rpc.detail());
        Err(GatewayError::auth_failed(detail, None))
    }
}
