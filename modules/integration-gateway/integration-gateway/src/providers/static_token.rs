use std::time::Duration;

use async_trait::async_trait;
use integration_gateway_sdk::{Authenticator, Credential, GatewayError, Session, SessionKind};

/// Uses the credential secret as a long-lived API token.
///
/// There is no exchange to perform; the session still expires after the
/// default TTL so that a rotated token is picked up.
pub struct StaticTokenAuthenticator {
    ttl: Duration,
}

impl StaticTokenAuthenticator {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    fn name(&self) -> &'static str {
        "static_token"
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Session, GatewayError> {
        if credential.secret.is_empty() {
            return Err(GatewayError::auth_failed("no API token configured", None));
        }
        Ok(Session::new(credential.secret.clone(), SessionKind::Bearer).expires_in(self.ttl))
    }
}
