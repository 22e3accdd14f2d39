//! Configuration for the integration gateway.

use std::collections::BTreeMap;
use std::time::Duration;

use integration_gateway_sdk::{Credential, EndpointCandidate};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::shape::ResponseShape;
use crate::infra::http::{TransportConfig, TransportError};

/// Gateway configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Whole-call deadline applied when a request does not carry its own.
    #[serde(with = "humantime_serde")]
    pub invoke_timeout: Duration,

    /// Upper bound for a single authentication exchange.
    #[serde(with = "humantime_serde")]
    pub auth_timeout: Duration,

    /// Per-candidate request timeout unless the operation overrides it.
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub reachability_timeout: Duration,

    /// Session lifetime assumed when the provider gives no expiry signal.
    #[serde(with = "humantime_serde")]
    pub default_session_ttl: Duration,

    /// Sessions expiring within this margin are treated as already expired.
    #[serde(with = "humantime_serde")]
    pub expiry_skew: Duration,

    pub max_response_bytes: usize,

    /// Permit plain `http://` base URLs.
    pub allow_insecure_http: bool,

    pub user_agent: String,

    pub providers: BTreeMap<String, ProviderConfig>,

    /// Credentials served by the built-in static store.
    pub credentials: Vec<Credential>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            invoke_timeout: Duration::from_secs(20),
            auth_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(10),
            reachability_timeout: Duration::from_secs(5),
            default_session_ttl: Duration::from_secs(55 * 60),
            expiry_skew: Duration::from_secs(10),
            max_response_bytes: 8 * 1024 * 1024,
            allow_insecure_http: true,
            user_agent: concat!("integration-gateway/", env!("CARGO_PKG_VERSION")).to_owned(),
            providers: BTreeMap::new(),
            credentials: Vec::new(),
        }
    }
}

/// One provider: how to authenticate and which endpoints implement each operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub auth: AuthConfig,

    #[serde(default)]
    pub dialect: DialectConfig,

    /// Path requested without credentials by diagnostics.
    #[serde(default = "default_reachability_path")]
    pub reachability_path: String,

    /// Operations exercised by diagnostics.
    #[serde(default)]
    pub critical_operations: Vec<String>,

    #[serde(default)]
    pub operations: BTreeMap<String, OperationConfig>,
}

fn default_reachability_path() -> String {
    "/".to_owned()
}

/// Login strategy for a provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// The credential secret is an API token presented as a bearer token.
    StaticToken,

    /// Exchange username and password for a token returned in the body.
    TokenLogin {
        path: String,
        #[serde(default = "default_token_pointer")]
        token_pointer: String,
        /// Pointer to a lifetime in seconds.
        #[serde(default)]
        expires_in_pointer: Option<String>,
        #[serde(default = "default_username_field")]
        username_field: String,
        #[serde(default = "default_password_field")]
        password_field: String,
        /// Send `application/x-www-form-urlencoded` instead of JSON.
        #[serde(default)]
        form: bool,
    },

    /// Log in once and replay the cookies the server sets.
    CookieSession {
        path: String,
        #[serde(default = "default_username_field")]
        username_field: String,
        #[serde(default = "default_password_field")]
        password_field: String,
    },

    /// JSON-RPC `user.login`. Uses the dialect path when `path` is unset.
    JsonRpc {
        #[serde(default)]
        path: Option<String>,
        #[serde(default = "default_login_method")]
        method: String,
    },
}

fn default_token_pointer() -> String {
    "/token".to_owned()
}

fn default_username_field() -> String {
    "username".to_owned()
}

fn default_password_field() -> String {
    "password".to_owned()
}

fn default_login_method() -> String {
    "user.login".to_owned()
}

/// Wire dialect spoken by a provider's operation endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialectConfig {
    /// Candidate templates are URL paths.
    #[default]
    Rest,
    /// Candidate templates are method names posted to one endpoint.
    JsonRpc {
        #[serde(default = "default_rpc_path")]
        path: String,
    },
}

pub(crate) fn default_rpc_path() -> String {
    "/api_jsonrpc.php".to_owned()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub fn as_http(self) -> http::Method {
        match self {
            Self::Get => http::Method::GET,
            Self::Post => http::Method::POST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationConfig {
    #[serde(default)]
    pub method: HttpMethod,

    pub candidates: Vec<EndpointCandidate>,

    #[serde(default)]
    pub shape: ResponseShape,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field}: {message}")]
    Invalid { field: String, message: String },

    #[error("cannot initialise HTTP transport: {0}")]
    Transport(#[from] TransportError),
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            max_response_bytes: self.max_response_bytes,
            allow_insecure_http: self.allow_insecure_http,
            user_agent: self.user_agent.clone(),
            ..TransportConfig::default()
        }
    }

    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("invoke_timeout", self.invoke_timeout),
            ("auth_timeout", self.auth_timeout),
            ("probe_timeout", self.probe_timeout),
            ("reachability_timeout", self.reachability_timeout),
            ("default_session_ttl", self.default_session_ttl),
        ] {
            if value.is_zero() {
                return Err(ConfigError::invalid(name, "must be greater than zero"));
            }
        }
        if self.max_response_bytes == 0 {
            return Err(ConfigError::invalid(
                "max_response_bytes",
                "must be greater than zero",
            ));
        }

        for (id, provider) in &self.providers {
            provider.validate(id)?;
        }

        for cred in &self.credentials {
            if !self.allow_insecure_http && cred.base_url.starts_with("http://") {
                return Err(ConfigError::invalid(
                    format!("credentials.{}.base_url", cred.provider_id),
                    "plain http is disabled (allow_insecure_http = false)",
                ));
            }
            if url::Url::parse(&cred.base_url).is_err() {
                return Err(ConfigError::invalid(
                    format!("credentials.{}.base_url", cred.provider_id),
                    format!("not a valid URL: {}", cred.base_url),
                ));
            }
        }
        Ok(())
    }
}

impl ProviderConfig {
    fn validate(&self, id: &str) -> Result<(), ConfigError> {
        if let AuthConfig::TokenLogin {
            token_pointer,
            expires_in_pointer,
            ..
        } = &self.auth
        {
            check_pointer(&format!("providers.{id}.auth.token_pointer"), token_pointer)?;
            if let Some(p) = expires_in_pointer {
                check_pointer(&format!("providers.{id}.auth.expires_in_pointer"), p)?;
            }
        }

        for (op_name, op) in &self.operations {
            let field = format!("providers.{id}.operations.{op_name}");
            if op.candidates.is_empty() {
                return Err(ConfigError::invalid(field, "needs at least one candidate"));
            }
            if op.timeout.is_some_and(|t| t.is_zero()) {
                return Err(ConfigError::invalid(
                    format!("{field}.timeout"),
                    "must be greater than zero",
                ));
            }
            if let Some(pointer) = op.shape.pointer() {
                check_pointer(&format!("{field}.shape.pointer"), pointer)?;
            }
        }

        for critical in &self.critical_operations {
            if !self.operations.contains_key(critical) {
                return Err(ConfigError::invalid(
                    format!("providers.{id}.critical_operations"),
                    format!("unknown operation '{critical}'"),
                ));
            }
        }
        Ok(())
    }
}

fn check_pointer(field: &str, pointer: &str) -> Result<(), ConfigError> {
    if pointer.is_empty() || pointer.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("JSON pointer must start with '/': {pointer}"),
        ))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> GatewayConfig {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn defaults_are_conservative() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.invoke_timeout, Duration::from_secs(20));
        assert_eq!(cfg.default_session_ttl, Duration::from_secs(3300));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_humantime_durations_and_provider_blocks() {
        let cfg = parse(serde_json::json!({
            "invoke_timeout": "30s",
            "default_session_ttl": "50m",
            "providers": {
                "zabbix": {
                    "auth": { "type": "json_rpc" },
                    "dialect": { "type": "json_rpc" },
                    "critical_operations": ["list_hosts"],
                    "operations": {
                        "list_hosts": {
                            "method": "POST",
                            "candidates": [{ "template": "host.get", "priority": 1 }],
                            "shape": { "type": "array" },
                            "timeout": "5s"
                        }
                    }
                }
            }
        }));
        assert_eq!(cfg.invoke_timeout, Duration::from_secs(30));
        assert_eq!(cfg.default_session_ttl, Duration::from_secs(3000));
        let zabbix = &cfg.providers["zabbix"];
        assert_eq!(
            zabbix.dialect,
            DialectConfig::JsonRpc {
                path: "/api_jsonrpc.php".to_owned()
            }
        );
        let op = &zabbix.operations["list_hosts"];
        assert_eq!(op.method, HttpMethod::Post);
        assert_eq!(op.timeout, Some(Duration::from_secs(5)));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unknown_top_level_field_is_rejected() {
        let res: Result<GatewayConfig, _> =
            serde_json::from_value(serde_json::json!({ "invoke_timout": "1s" }));
        assert!(res.is_err());
    }

    #[test]
    fn critical_operation_must_exist() {
        let cfg = parse(serde_json::json!({
            "providers": {
                "bacula": {
                    "auth": { "type": "static_token" },
                    "critical_operations": ["list_jobs"]
                }
            }
        }));
        let err = cfg.validate().unwrap_err();
        assert!(
            err.to_string().contains("unknown operation 'list_jobs'"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn empty_candidate_list_is_rejected() {
        let cfg = parse(serde_json::json!({
            "providers": {
                "bacula": {
                    "auth": { "type": "static_token" },
                    "operations": { "list_jobs": { "candidates": [] } }
                }
            }
        }));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "providers.bacula.operations.list_jobs"
        ));
    }

    #[test]
    fn zero_operation_timeout_is_rejected() {
        let cfg = parse(serde_json::json!({
            "providers": {
                "bacula": {
                    "auth": { "type": "static_token" },
                    "operations": {
                        "list_jobs": {
                            "candidates": [{ "template": "/api/v2/jobs", "priority": 1 }],
                            "timeout": "0s"
                        }
                    }
                }
            }
        }));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "providers.bacula.operations.list_jobs.timeout"
        ));
    }

    #[test]
    fn relative_pointer_is_rejected() {
        let cfg = parse(serde_json::json!({
            "providers": {
                "guac": {
                    "auth": { "type": "token_login", "path": "/api/tokens", "token_pointer": "authToken" }
                }
            }
        }));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn plain_http_rejected_when_disabled() {
        let cfg = parse(serde_json::json!({
            "allow_insecure_http": false,
            "credentials": [{
                "provider_id": "unifi",
                "base_url": "http://10.0.0.1:8443",
                "principal": "admin",
                "secret": "pw"
            }]
        }));
        assert!(cfg.validate().is_err());
    }
}
