use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use integration_gateway_sdk::{
    Authenticator, Credential, GatewayError, SecretString, Session, SessionKind,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;

type Outcome = Result<(SecretString, Option<Duration>), String>;

#[derive(Default)]
struct Pending {
    waiters: Mutex<HashMap<String, oneshot::Sender<Outcome>>>,
}

/// Authenticator that waits for an out-of-band authorization step.
///
/// Used for flows where an operator completes an OAuth consent page and
/// pastes the resulting code or token back into the admin UI. `authenticate`
/// parks until [`CallbackHandle::complete`] or [`CallbackHandle::fail`] is
/// called for the same provider, or until `wait` elapses.
pub struct CallbackAuthenticator {
    pending: Arc<Pending>,
    wait: Duration,
    default_ttl: Duration,
}

/// Delivers the result of the external step to a waiting authenticator.
#[derive(Clone)]
pub struct CallbackHandle {
    pending: Arc<Pending>,
}

impl CallbackAuthenticator {
    #[must_use]
    pub fn new(wait: Duration, default_ttl: Duration) -> (Self, CallbackHandle) {
        let pending = Arc::new(Pending::default());
        (
            Self {
                pending: Arc::clone(&pending),
                wait,
                default_ttl,
            },
            CallbackHandle { pending },
        )
    }
}

impl CallbackHandle {
    /// Providers currently waiting for authorization.
    #[must_use]
    pub fn awaiting(&self) -> Vec<String> {
        let waiters = self.pending.waiters.lock();
        let mut ids: Vec<String> = waiters
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Hands a token to the waiting call. Returns `false` if nobody was waiting.
    pub fn complete(
        &self,
        provider_id: &str,
        token: impl Into<SecretString>,
        ttl: Option<Duration>,
    ) -> bool {
        self.deliver(provider_id, Ok((token.into(), ttl)))
    }

    /// Aborts the waiting call with `reason`.
    #[must_use]
    pub fn fail(&self, provider_id: &str, reason: impl Into<String>) -> bool {
        self.deliver(provider_id, Err(reason.into()))
    }

    fn deliver(&self, provider_id: &str, outcome: Outcome) -> bool {
        let tx = self.pending.waiters.lock().remove(provider_id);
        tx.is_some_and(|tx| tx.send(outcome).is_ok())
    }
}

#[async_trait]
impl Authenticator for CallbackAuthenticator {
    fn name(&self) -> &'static str {
        "callback"
    }

    #[tracing::instrument(skip_all, fields(provider_id = %credential.provider_id))]
    async fn authenticate(&self, credential: &Credential) -> Result<Session, GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .waiters
            .lock()
            .insert(credential.provider_id.clone(), tx);
        tracing::info!(
            wait_secs = self.wait.as_secs(),
            "waiting for external authorization"
        );

        let outcome = tokio::time::timeout(self.wait, rx).await;
        match outcome {
            Ok(Ok(Ok((token, ttl)))) => {
                Ok(Session::new(token, SessionKind::Bearer).expires_in(ttl.unwrap_or(self.default_ttl)))
            }
            Ok(Ok(Err(reason))) => Err(GatewayError::auth_failed(
                format!("authorization refused: {reason}"),
                None,
            )),
            Ok(Err(_)) => Err(GatewayError::auth_failed(
                "authorization request was abandoned",
                None,
            )),
            Err(_) => {
                self.pending.waiters.lock().remove(&credential.provider_id);
                Err(GatewayError::auth_failed(
                    format!(
                        "no authorization received within {}",
                        humantime::format_duration(self.wait)
                    ),
                    None,
                ))
            }
        }
    }
}
