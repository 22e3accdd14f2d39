//! Error taxonomy for the integration gateway.
//!
//! [`GatewayError`] is the only error shape that crosses the gateway boundary.
//! Authenticators and the endpoint prober map every provider-specific failure
//! into one of its variants before returning.

use serde::Serialize;
use thiserror::Error;

use crate::models::ProbeAttempt;

/// Stable tag for a [`GatewayError`], suitable for reports and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    AuthFailed,
    AuthExpired,
    EndpointNotFound,
    MalformedResponse,
    RemoteRejected,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::AuthFailed => "auth_failed",
            Self::AuthExpired => "auth_expired",
            Self::EndpointNotFound => "endpoint_not_found",
            Self::MalformedResponse => "malformed_response",
            Self::RemoteRejected => "remote_rejected",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by gateway operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The remote host could not be reached or the request could not be sent.
    #[error("network error: {message}")]
    Network { message: String },

    /// A deadline passed before the call completed.
    #[error("timed out: {message}")]
    Timeout { message: String },

    /// Credentials were rejected, missing, or the login exchange failed.
    #[error("authentication failed: {message}")]
    AuthFailed {
        message: String,
        status: Option<u16>,
    },

    /// A previously valid session was rejected by the remote system.
    #[error("session expired or revoked: {message}")]
    AuthExpired {
        message: String,
        status: Option<u16>,
    },

    /// No endpoint candidate produced a structurally valid response.
    #[error("no working endpoint ({} candidate(s) tried)", .attempts.len())]
    EndpointNotFound { attempts: Vec<ProbeAttempt> },

    /// The remote answered successfully but the payload was unusable.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// The remote returned an explicit domain error.
    #[error("remote rejected request (code {code}): {message}")]
    RemoteRejected { code: i64, message: String },
}

impl GatewayError {
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn auth_failed(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::AuthFailed {
            message: message.into(),
            status,
        }
    }

    #[must_use]
    pub fn auth_expired(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::AuthExpired {
            message: message.into(),
            status,
        }
    }

    #[must_use]
    pub fn endpoint_not_found(attempts: Vec<ProbeAttempt>) -> Self {
        Self::EndpointNotFound { attempts }
    }

    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn remote_rejected(code: i64, message: impl Into<String>) -> Self {
        Self::RemoteRejected {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::AuthFailed { .. } => ErrorKind::AuthFailed,
            Self::AuthExpired { .. } => ErrorKind::AuthExpired,
            Self::EndpointNotFound { .. } => ErrorKind::EndpointNotFound,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::RemoteRejected { .. } => ErrorKind::RemoteRejected,
        }
    }

    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }

    /// HTTP status attached to auth errors, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthFailed { status, .. } | Self::AuthExpired { status, .. } => *status,
            _ => None,
        }
    }
}

/// A terminal [`GatewayError`] tagged with the call it belongs to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{provider_id}/{operation}: {error}")]
pub struct InvokeError {
    pub provider_id: String,
    pub operation: String,
    #[source]
    pub error: GatewayError,
}

impl InvokeError {
    #[must_use]
    pub fn new(
        provider_id: impl Into<String>,
        operation: impl Into<String>,
        error: GatewayError,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            operation: operation.into(),
            error,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Failures of [`CredentialStore::get_credential`](crate::CredentialStore::get_credential).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialLookupError {
    #[error("no credential stored for provider {provider_id}")]
    NotFound { provider_id: String },

    #[error("credential store unavailable: {message}")]
    Unavailable { message: String },
}

impl From<CredentialLookupError> for GatewayError {
    fn from(e: CredentialLookupError) -> Self {
        GatewayError::auth_failed(e.to_string(), None)
    }
}
