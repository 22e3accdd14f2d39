//! Gateway service: credential lookup, cached sessions, probing and the
//! single re-authentication retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use integration_gateway_sdk::{
    Credential, CredentialStore, GatewayError, InvokeRequest, InvokeResponse, Session,
};
use tracing::{info, instrument, warn};

use crate::config::GatewayConfig;
use crate::domain::elapsed_ms;
use crate::domain::memo::CandidateMemo;
use crate::domain::prober::{EndpointProber, ProbeContext, ProbeSuccess};
use crate::domain::registry::{Provider, ProviderRegistry};
use crate::domain::session_cache::{Obtained, SessionCache};
use crate::infra::http::HttpTransport;

/// Timeouts the service applies on top of each component's own.
#[derive(Debug, Clone, Copy)]
pub struct Deadlines {
    pub invoke: Duration,
    pub auth: Duration,
    pub reachability: Duration,
}

impl From<&GatewayConfig> for Deadlines {
    fn from(cfg: &GatewayConfig) -> Self {
        Self {
            invoke: cfg.invoke_timeout,
            auth: cfg.auth_timeout,
            reachability: cfg.reachability_timeout,
        }
    }
}

pub struct Service {
    pub(super) registry: Arc<ProviderRegistry>,
    pub(super) credentials: Arc<dyn CredentialStore>,
    pub(super) sessions: SessionCache,
    pub(super) memo: CandidateMemo,
    pub(super) prober: EndpointProber,
    pub(super) transport: HttpTransport,
    pub(super) deadlines: Deadlines,
}

impl Service {
    #[must_use]
    pub fn new(
        config: &GatewayConfig,
        registry: Arc<ProviderRegistry>,
        credentials: Arc<dyn CredentialStore>,
        transport: HttpTransport,
    ) -> Self {
        Self {
            registry,
            credentials,
            sessions: SessionCache::new(config.expiry_skew),
            memo: CandidateMemo::new(),
            prober: EndpointProber::new(transport.clone(), config.probe_timeout),
            transport,
            deadlines: Deadlines::from(config),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    #[must_use]
    pub fn memo(&self) -> &CandidateMemo {
        &self.memo
    }

    /// Runs one logical call under the request deadline.
    ///
    /// # Errors
    ///
    /// - `AuthFailed` for an unknown provider, a missing or inactive credential,
    ///   or a failed login.
    /// - `EndpointNotFound` for an operation the provider does not declare.
    /// - `Timeout` when the whole call exceeds its deadline.
    /// - Any probe error, with `AuthExpired` returned only after one re-authentication.
    #[instrument(
        skip_all,
        fields(provider_id = %req.provider_id, operation = %req.operation)
    )]
    pub async fn invoke(&self, req: &InvokeRequest) -> Result<InvokeResponse, GatewayError> {
        let deadline = req.timeout.unwrap_or(self.deadlines.invoke);
        let started = Instant::now();

        let outcome = match tokio::time::timeout(deadline, self.invoke_inner(req)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::timeout(format!(
                "call did not complete within {}",
                humantime::format_duration(deadline)
            ))),
        };
        let duration_ms = elapsed_ms(started);

        match outcome {
            Ok((success, reauthenticated, template)) => {
                info!(
                    candidate_index = success.index,
                    duration_ms, reauthenticated, "invoke succeeded"
                );
                Ok(InvokeResponse {
                    value: success.value,
                    candidate_index: success.index,
                    candidate: template,
                    reauthenticated,
                    duration_ms,
                })
            }
            Err(err) => {
                warn!(duration_ms, kind = %err.kind(), error = %err, "invoke failed");
                Err(err)
            }
        }
    }

    async fn invoke_inner(
        &self,
        req: &InvokeRequest,
    ) -> Result<(ProbeSuccess, bool, String), GatewayError> {
        let provider = self.registry.get(&req.provider_id).ok_or_else(|| {
            GatewayError::auth_failed(format!("unknown provider '{}'", req.provider_id), None)
        })?;
        let credential = self.fetch_credential(&provider.id).await?;
        let operation = provider
            .operation(&req.operation)
            .ok_or_else(|| GatewayError::endpoint_not_found(Vec::new()))?;

        let mut retried = false;
        loop {
            let obtained = self.obtain_session(&provider, &credential).await?;
            let ctx = ProbeContext {
                provider: &provider,
                operation,
                credential: &credential,
                session: &obtained.session,
                params: &req.params,
            };
            match self.execute(&ctx).await {
                Err(err) if err.is_auth_expired() && !retried => {
                    info!(status = ?err.status(), "session rejected, re-authenticating once");
                    _ = self.sessions.invalidate_if_current(
                        &provider.id,
                        &credential,
                        &obtained.session,
                    );
                    retried = true;
                }
                Err(err) => return Err(err),
                Ok(success) => {
                    let template = operation.candidates[success.index].template.clone();
                    return Ok((success, retried, template));
                }
            }
        }
    }

    /// Reads the credential fresh so rotations apply without a restart.
    pub(super) async fn fetch_credential(&self, provider_id: &str) -> Result<Credential, GatewayError> {
        let credential = self.credentials.get_credential(provider_id).await?;
        if !credential.active {
            return Err(GatewayError::auth_failed(
                format!("provider '{provider_id}' is inactive"),
                None,
            ));
        }
        Ok(credential)
    }

    async fn obtain_session(
        &self,
        provider: &Provider,
        credential: &Credential,
    ) -> Result<Obtained, GatewayError> {
        let obtained = self
            .sessions
            .get_or_authenticate(&provider.id, credential, || {
                self.authenticate(provider, credential)
            })
            .await?;
        if obtained.fresh {
            info!(
                authenticator = provider.authenticator.name(),
                expires_at = ?obtained.session.expires_at,
                "authenticated"
            );
        }
        Ok(obtained)
    }

    /// One bounded authentication exchange.
    pub(super) async fn authenticate(
        &self,
        provider: &Provider,
        credential: &Credential,
    ) -> Result<Session, GatewayError> {
        let limit = self.deadlines.auth;
        match tokio::time::timeout(limit, provider.authenticator.authenticate(credential)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::timeout(format!(
                "authentication did not complete within {}",
                humantime::format_duration(limit)
            ))),
        }
    }

    /// Probes with the memoized candidate first and keeps the memo current.
    async fn execute(&self, ctx: &ProbeContext<'_>) -> Result<ProbeSuccess, GatewayError> {
        let provider_id = ctx.provider.id.as_str();
        let op = ctx.operation.name.as_str();
        let preferred = self.memo.get(provider_id, op);

        let result = self.prober.execute(ctx, preferred).await;
        match &result {
            Ok(success) => {
                if preferred != Some(success.index) {
                    _ = self.memo.record(provider_id, op, success.index);
                    info!(
                        previous = ?preferred,
                        index = success.index,
                        "working candidate changed"
                    );
                }
            }
            Err(GatewayError::EndpointNotFound { .. }) => {
                if self.memo.forget(provider_id, op) {
                    info!("no candidate works any more, memo cleared");
                }
            }
            Err(_) => {}
        }
        result
    }
}
