//! Read-only "test connection" pass.
//!
//! Every step runs even when an earlier one failed. The session used here is
//! private to the run and never enters the shared cache; probing ignores and
//! never updates the candidate memo.

use std::time::Instant;

use http::Method;
use integration_gateway_sdk::{
    Credential, CredentialLookupError, DiagnosticReport, GatewayError, Session, StepStatus,
};
use serde_json::Map;
use tracing::{info, instrument};

use crate::domain::elapsed_ms;
use crate::domain::prober::ProbeContext;
use crate::domain::registry::Provider;
use crate::domain::service::Service;
use crate::infra::http::{OutboundRequest, join_url};

const CREDENTIAL: &str = "credential";
const REACHABILITY: &str = "reachability";
const AUTHENTICATION: &str = "authentication";

impl Service {
    /// Runs credential, reachability, authentication and critical-operation
    /// checks for one provider. Never fails; problems become step statuses.
    #[instrument(skip(self))]
    pub async fn run_diagnostics(&self, provider_id: &str) -> DiagnosticReport {
        let mut report = DiagnosticReport::new(provider_id);
        let provider = self.registry.get(provider_id);

        let started = Instant::now();
        let credential = self.check_credential(provider.as_deref(), provider_id).await;
        let (status, detail, credential) = match credential {
            Ok(cred) if cred.active => {
                let detail = format!("found for principal '{}'", cred.principal);
                (StepStatus::Ok, detail, Some(cred))
            }
            Ok(cred) => (
                StepStatus::Warn,
                "credential is marked inactive; calls will be refused".to_owned(),
                Some(cred),
            ),
            Err(detail) => (StepStatus::Fail, detail, None),
        };
        report.push(CREDENTIAL, status, detail, elapsed_ms(started));

        let started = Instant::now();
        let (status, detail) = match (provider.as_deref(), credential.as_ref()) {
            (Some(p), Some(c)) => self.check_reachability(p, c).await,
            _ => (StepStatus::Fail, "skipped: no credential".to_owned()),
        };
        report.push(REACHABILITY, status, detail, elapsed_ms(started));

        let started = Instant::now();
        let session = match (provider.as_deref(), credential.as_ref()) {
            (Some(p), Some(c)) => match self.authenticate(p, c).await {
                Ok(session) => {
                    let detail = session.expires_at.map_or_else(
                        || format!("{} session obtained", p.authenticator.name()),
                        |at| {
                            format!(
                                "{} session obtained, expires {}",
                                p.authenticator.name(),
                                at.to_rfc3339()
                            )
                        },
                    );
                    report.push(AUTHENTICATION, StepStatus::Ok, detail, elapsed_ms(started));
                    Some(session)
                }
                Err(err) => {
                    report.push(
                        AUTHENTICATION,
                        StepStatus::Fail,
                        format!("{}: {err}", err.kind()),
                        elapsed_ms(started),
                    );
                    None
                }
            },
            _ => {
                report.push(
                    AUTHENTICATION,
                    StepStatus::Fail,
                    "skipped: no credential",
                    elapsed_ms(started),
                );
                None
            }
        };

        if let Some(provider) = provider.as_deref() {
            for name in &provider.critical_operations {
                let started = Instant::now();
                let (status, detail) = match (credential.as_ref(), session.as_ref()) {
                    (Some(c), Some(s)) => self.check_operation(provider, name, c, s).await,
                    _ => (StepStatus::Fail, "skipped: no session".to_owned()),
                };
                report.push(format!("operation:{name}"), status, detail, elapsed_ms(started));
            }
        }

        info!(overall = ?report.overall(), steps = report.steps.len(), "diagnostics finished");
        report
    }

    /// Unlike `fetch_credential`, an inactive credential is returned so later steps still run.
    async fn check_credential(
        &self,
        provider: Option<&Provider>,
        provider_id: &str,
    ) -> Result<Credential, String> {
        if provider.is_none() {
            return Err(format!("provider '{provider_id}' is not registered"));
        }
        self.credentials
            .get_credential(provider_id)
            .await
            .map_err(|e| match e {
                CredentialLookupError::NotFound { .. } => "no credential stored".to_owned(),
                CredentialLookupError::Unavailable { message } => {
                    format!("credential store unavailable: {message}")
                }
            })
    }

    /// Plain unauthenticated GET; any answer below 500 proves the host is there.
    async fn check_reachability(
        &self,
        provider: &Provider,
        credential: &Credential,
    ) -> (StepStatus, String) {
        let url = match join_url(&credential.base_url, &provider.reachability_path) {
            Ok(url) => url,
            Err(e) => return (StepStatus::Fail, e.to_string()),
        };
        let req = OutboundRequest::new(Method::GET, url, self.deadlines.reachability);
        match self.transport.send(req).await {
            Ok(resp) if resp.status.is_server_error() => (
                StepStatus::Warn,
                format!("reachable but answered HTTP {}", resp.status.as_u16()),
            ),
            Ok(resp) => (
                StepStatus::Ok,
                format!("answered HTTP {}", resp.status.as_u16()),
            ),
            Err(e) => (StepStatus::Fail, e.to_string()),
        }
    }

    async fn check_operation(
        &self,
        provider: &Provider,
        name: &str,
        credential: &Credential,
        session: &Session,
    ) -> (StepStatus, String) {
        let Some(operation) = provider.operation(name) else {
            return (StepStatus::Fail, "operation is not declared".to_owned());
        };
        let params = Map::new();
        let ctx = ProbeContext {
            provider,
            operation,
            credential,
            session,
            params: &params,
        };
        match self.prober.execute(&ctx, None).await {
            Ok(success) => (
                StepStatus::Ok,
                format!(
                    "candidate {} '{}' answered",
                    success.index, operation.candidates[success.index].template
                ),
            ),
            Err(GatewayError::EndpointNotFound { attempts }) => {
                let reasons: Vec<String> = attempts
                    .iter()
                    .map(|a| format!("[{}] {}: {}", a.index, a.template, a.reason))
                    .collect();
                (
                    StepStatus::Fail,
                    format!("no candidate answered: {}", reasons.join("; ")),
                )
            }
            Err(err) => (StepStatus::Fail, format!("{}: {err}", err.kind())),
        }
    }
}
