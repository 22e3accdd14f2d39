#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Integration Gateway
//!
//! Talks to third-party systems (monitoring, backup, network controllers,
//! remote desktop brokers) through one call shape:
//!
//! ```text
//!   caller ──invoke(provider, operation, params)──▶ Service
//!                                                    │
//!           CredentialStore ◀── fresh read ──────────┤
//!           SessionCache    ◀── single-flight auth ──┤──▶ Authenticator
//!           CandidateMemo   ◀── preferred index ─────┤
//!                                                    ▼
//!                                              EndpointProber ──▶ HTTP / JSON-RPC
//! ```
//!
//! A call re-authenticates at most once when the session is rejected mid-call.
//! Diagnostics run the same steps against a private session and report each
//! one instead of failing fast.
//!
//! The public contract lives in `integration-gateway-sdk` and is re-exported here.

use std::sync::Arc;

pub use integration_gateway_sdk::{
    Authenticator, Credential, CredentialLookupError, CredentialStore, DiagnosticReport,
    DiagnosticStep, EndpointCandidate, ErrorKind, GatewayError, IntegrationGatewayClient,
    InvokeError, InvokeRequest, InvokeResponse, ProbeAttempt, SecretString, Session, SessionKind,
    StepStatus,
};

pub mod local_client;
pub use local_client::IntegrationGatewayLocalClient;

pub mod config;
pub mod domain;
pub mod infra;
pub mod providers;

use config::{ConfigError, GatewayConfig};
use domain::registry::ProviderRegistry;
use domain::service::Service;
use infra::credentials::StaticCredentialStore;
use infra::http::HttpTransport;

/// Builds a ready-to-use service from configuration.
///
/// Without an explicit `store`, credentials come from `config.credentials`.
///
/// # Errors
///
/// [`ConfigError`] if the configuration is invalid or the HTTP transport
/// cannot be initialised.
pub fn build(
    config: &GatewayConfig,
    store: Option<Arc<dyn CredentialStore>>,
) -> Result<Arc<Service>, ConfigError> {
    let transport = HttpTransport::new(&config.transport_config())?;
    let registry = ProviderRegistry::from_config(config, &transport)?;
    let store = store.unwrap_or_else(|| {
        Arc::new(StaticCredentialStore::from_credentials(
            config.credentials.clone(),
        ))
    });
    tracing::info!(
        providers = registry.ids().len(),
        "integration gateway ready"
    );
    Ok(Arc::new(Service::new(
        config,
        Arc::new(registry),
        store,
        transport,
    )))
}
