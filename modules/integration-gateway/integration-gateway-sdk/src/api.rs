use async_trait::async_trait;

use crate::error::{CredentialLookupError, GatewayError, InvokeError};
use crate::models::{Credential, DiagnosticReport, InvokeRequest, InvokeResponse, Session};

/// Public API of the integration gateway.
#[async_trait]
pub trait IntegrationGatewayClient: Send + Sync {
    /// Execute a logical operation against a provider.
    ///
    /// Obtains (or reuses) a session, probes the operation's endpoint
    /// candidates and re-authenticates at most once if the session is
    /// rejected mid-call.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`GatewayError`] tagged with provider and operation.
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, InvokeError>;

    /// Run connectivity, authentication and endpoint checks for a provider.
    ///
    /// Never fails; each failure is recorded as a step of the report.
    async fn run_diagnostics(&self, provider_id: &str) -> DiagnosticReport;
}

/// Exchanges a credential for a session artifact.
///
/// Implementations must be safe to call concurrently for different
/// credentials. Calls for the same credential are serialised by the
/// session cache.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Short strategy name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Any failure is reported as [`GatewayError::AuthFailed`] (or `Timeout`
    /// when the exchange exceeded its deadline).
    async fn authenticate(&self, credential: &Credential) -> Result<Session, GatewayError>;
}

/// Pull-style credential source owned by the persistence layer.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// # Errors
    ///
    /// [`CredentialLookupError::NotFound`] when no record exists for the provider.
    async fn get_credential(&self, provider_id: &str) -> Result<Credential, CredentialLookupError>;
}
