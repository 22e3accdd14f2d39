#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Integration Gateway SDK
//!
//! Public contract of the integration gateway:
//!
//! - [`IntegrationGatewayClient`] - entry point for callers (`invoke`, `run_diagnostics`)
//! - [`Authenticator`] - per-provider credential exchange strategy
//! - [`CredentialStore`] - pull-style source of provider credentials
//! - [`GatewayError`], [`ErrorKind`], [`InvokeError`] - the error taxonomy
//!
//! ## Usage
//!
//! ```ignore
//! use integration_gateway_sdk::{IntegrationGatewayClient, InvokeRequest};
//!
//! let resp = gateway
//!     .invoke(InvokeRequest::new("zabbix-main", "list_hosts"))
//!     .await?;
//! println!("{} via candidate #{}", resp.value, resp.candidate_index);
//!
//! let report = gateway.run_diagnostics("zabbix-main").await;
//! ```

pub mod api;
pub mod error;
pub mod models;
pub mod secret;

pub use api::{Authenticator, CredentialStore, IntegrationGatewayClient};
pub use error::{CredentialLookupError, ErrorKind, GatewayError, InvokeError};
pub use models::{
    Credential, DiagnosticReport, DiagnosticStep, EndpointCandidate, InvokeRequest, InvokeResponse,
    ProbeAttempt, Session, SessionKind, StepStatus,
};
pub use secret::SecretString;
