//! Domain models exchanged across the gateway boundary.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::secret::SecretString;

/// Connection record for one provider, as held by the credential store.
///
/// Read fresh on every call so that rotated credentials take effect without
/// a restart. The gateway never persists it.
#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
    pub provider_id: String,
    pub base_url: String,
    /// Username, client id, or API key id depending on the provider.
    pub principal: String,
    pub secret: SecretString,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

fn default_active() -> bool {
    true
}

impl Credential {
    #[must_use]
    pub fn new(
        provider_id: impl Into<String>,
        base_url: impl Into<String>,
        principal: impl Into<String>,
        secret: impl Into<SecretString>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            base_url: base_url.into(),
            principal: principal.into(),
            secret: secret.into(),
            active: true,
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// How a session artifact is presented on outgoing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// `Authorization: Bearer <artifact>`
    Bearer,
    /// `Cookie: <artifact>`
    Cookie,
    /// Embedded in the JSON-RPC request envelope as `auth`.
    RpcAuthToken,
}

/// An authenticated session obtained from a provider.
#[derive(Debug, Clone)]
pub struct Session {
    pub artifact: SecretString,
    pub kind: SessionKind,
    pub obtained_at: DateTime<Utc>,
    /// `None` means the provider session does not expire on its own.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    #[must_use]
    pub fn new(artifact: impl Into<SecretString>, kind: SessionKind) -> Self {
        Self {
            artifact: artifact.into(),
            kind,
            obtained_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Sets `expires_at` relative to `obtained_at`, saturating at the
    /// latest representable instant.
    #[must_use]
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        let at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.obtained_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.expires_at = Some(at);
        self
    }

    #[must_use]
    pub fn with_expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// True when the session expires within `skew` of `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        let Some(expires_at) = self.expires_at else {
            return false;
        };
        let skew = chrono::Duration::from_std(skew).unwrap_or_else(|_| chrono::Duration::zero());
        match now.checked_add_signed(skew) {
            Some(horizon) => expires_at <= horizon,
            None => true,
        }
    }

    #[must_use]
    pub fn is_expired(&self, skew: Duration) -> bool {
        self.is_expired_at(Utc::now(), skew)
    }
}

/// One hypothesised endpoint for a logical operation.
///
/// For REST providers `template` is a path such as `/api/v2/jobs/{job_id}`;
/// for JSON-RPC providers it is the method name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCandidate {
    pub template: String,
    /// Lower values are tried first.
    #[serde(default)]
    pub priority: i32,
}

impl EndpointCandidate {
    #[must_use]
    pub fn new(template: impl Into<String>, priority: i32) -> Self {
        Self {
            template: template.into(),
            priority,
        }
    }
}

/// Why a single candidate was rejected during probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeAttempt {
    /// Index of the candidate in priority order.
    pub index: usize,
    pub template: String,
    pub reason: String,
}

impl ProbeAttempt {
    #[must_use]
    pub fn new(index: usize, template: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            index,
            template: template.into(),
            reason: reason.into(),
        }
    }
}

/// A logical call routed through the gateway.
#[derive(Debug, Clone, Default)]
pub struct InvokeRequest {
    pub provider_id: String,
    pub operation: String,
    pub params: serde_json::Map<String, serde_json::Value>,
    /// Whole-call deadline. Falls back to the gateway default when `None`.
    pub timeout: Option<Duration>,
}

impl InvokeRequest {
    #[must_use]
    pub fn new(provider_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            operation: operation.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Successful result of [`IntegrationGatewayClient::invoke`](crate::IntegrationGatewayClient::invoke).
#[derive(Debug, Clone, Serialize)]
pub struct InvokeResponse {
    pub value: serde_json::Value,
    pub candidate_index: usize,
    pub candidate: String,
    /// True when the call had to re-authenticate after an expired session.
    pub reauthenticated: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticStep {
    pub name: String,
    pub status: StepStatus,
    pub detail: String,
    pub duration_ms: u64,
}

/// Result of a "test connection" pass. Always produced, even when every step fails.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub provider_id: String,
    pub generated_at: DateTime<Utc>,
    pub steps: Vec<DiagnosticStep>,
}

impl DiagnosticReport {
    #[must_use]
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            generated_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        name: impl Into<String>,
        status: StepStatus,
        detail: impl Into<String>,
        duration_ms: u64,
    ) {
        self.steps.push(DiagnosticStep {
            name: name.into(),
            status,
            detail: detail.into(),
            duration_ms,
        });
    }

    /// Worst status across all steps.
    #[must_use]
    pub fn overall(&self) -> StepStatus {
        if self.steps.iter().any(|s| s.status == StepStatus::Fail) {
            StepStatus::Fail
        } else if self.steps.iter().any(|s| s.status == StepStatus::Warn) {
            StepStatus::Warn
        } else {
            StepStatus::Ok
        }
    }

    #[must_use]
    pub fn step(&self, name: &str) -> Option<&DiagnosticStep> {
        self.steps.iter().find(|s| s.name == name)
    }
}
