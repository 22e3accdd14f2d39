//! Built-in [`Authenticator`] strategies.

use std::sync::Arc;
use std::time::Duration;

use integration_gateway_sdk::{Authenticator, GatewayError};

use crate::config::{AuthConfig, GatewayConfig, default_rpc_path};
use crate::domain::registry::Dialect;
use crate::infra::http::{HttpTransport, OutboundResponse, TransportError};

mod callback;
mod cookie_session;
mod json_rpc;
mod static_token;
mod token_login;

pub use callback::{CallbackAuthenticator, CallbackHandle};
pub use cookie_session::CookieSessionAuthenticator;
pub use json_rpc::JsonRpcAuthenticator;
pub use static_token::StaticTokenAuthenticator;
pub use token_login::TokenLoginAuthenticator;

/// Builds the authenticator declared for a provider.
#[must_use]
pub fn from_config(
    auth: &AuthConfig,
    dialect: &Dialect,
    gateway: &GatewayConfig,
    transport: &HttpTransport,
) -> Arc<dyn Authenticator> {
    let ttl = gateway.default_session_ttl;
    let timeout = gateway.auth_timeout;
    match auth {
        AuthConfig::StaticToken => Arc::new(StaticTokenAuthenticator::new(ttl)),
        AuthConfig::TokenLogin {
            path,
            token_pointer,
            expires_in_pointer,
            username_field,
            password_field,
            form,
        } => Arc::new(TokenLoginAuthenticator {
            transport: transport.clone(),
            path: path.clone(),
            token_pointer: token_pointer.clone(),
            expires_in_pointer: expires_in_pointer.clone(),
            username_field: username_field.clone(),
            password_field: password_field.clone(),
            form: *form,
            timeout,
            default_ttl: ttl,
        }),
        AuthConfig::CookieSession {
            path,
            username_field,
            password_field,
        } => Arc::new(CookieSessionAuthenticator {
            transport: transport.clone(),
            path: path.clone(),
            username_field: username_field.clone(),
            password_field: password_field.clone(),
            timeout,
            default_ttl: ttl,
        }),
        AuthConfig::JsonRpc { path, method } => {
            let path = path.clone().unwrap_or_else(|| match dialect {
                Dialect::JsonRpc { path } => path.clone(),
                Dialect::Rest => default_rpc_path(),
            });
            Arc::new(JsonRpcAuthenticator {
                transport: transport.clone(),
                path,
                method: method.clone(),
                timeout,
                default_ttl: ttl,
            })
        }
    }
}

/// Login request could not be delivered.
fn unreachable_login(e: &TransportError) -> GatewayError {
    GatewayError::auth_failed(format!("login request failed: {e}"), None)
}

/// Login endpoint answered with a non-success status.
fn rejected_login(resp: &OutboundResponse) -> GatewayError {
    let status = resp.status.as_u16();
    let excerpt = resp.body_excerpt();
    let message = if excerpt.is_empty() {
        format!("login rejected with HTTP {status}")
    } else {
        format!("login rejected with HTTP {status}: {excerpt}")
    };
    GatewayError::auth_failed(message, Some(status))
}

/// Reads a lifetime in seconds given as a number or numeric string.
fn seconds_at(body: &serde_json::Value, pointer: &str) -> Option<Duration> {
    let v = body.pointer(pointer)?;
    let secs = v
        .as_u64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))?;
    (secs > 0).then(|| Duration::from_secs(secs))
}
