#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Shared fixtures for integration-gateway integration tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use integration_gateway::config::GatewayConfig;
use integration_gateway::domain::registry::{Provider, ProviderRegistry};
use integration_gateway::domain::service::Service;
use integration_gateway::infra::credentials::StaticCredentialStore;
use integration_gateway::infra::http::{HttpTransport, TransportConfig};
use integration_gateway::{Authenticator, Credential, GatewayError, Session, SessionKind};

/// Hands out `tok-1`, `tok-2`, ... and counts how often it was asked.
pub struct ScriptedAuthenticator {
    calls: AtomicUsize,
    delay: Duration,
    ttl: Duration,
    reject: bool,
}

impl ScriptedAuthenticator {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            ttl: Duration::from_secs(3600),
            reject: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for ScriptedAuthenticator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Session, GatewayError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.reject || credential.secret.expose() == "bad" {
            return Err(GatewayError::auth_failed("token rejected", Some(401)));
        }
        Ok(Session::new(format!("tok-{n}"), SessionKind::Bearer).expires_in(self.ttl))
    }
}

pub fn init_tracing() {
    _ = tracing_subscriber::fmt()
        .with_env_filter("integration_gateway=debug")
        .with_test_writer()
        .try_init();
}

pub fn fast_config() -> GatewayConfig {
    GatewayConfig {
        invoke_timeout: Duration::from_secs(10),
        probe_timeout: Duration::from_secs(2),
        ..GatewayConfig::default()
    }
}

pub fn service_with(
    config: &GatewayConfig,
    provider: Provider,
    credential: Credential,
) -> (Arc<Service>, Arc<StaticCredentialStore>) {
    init_tracing();
    let mut registry = ProviderRegistry::new();
    registry.register(provider);
    let store = Arc::new(StaticCredentialStore::from_credentials(vec![credential]));
    let transport = HttpTransport::new(&TransportConfig::default()).unwrap();
    let service = Service::new(config, Arc::new(registry), Arc::clone(&store) as _, transport);
    (Arc::new(service), store)
}
