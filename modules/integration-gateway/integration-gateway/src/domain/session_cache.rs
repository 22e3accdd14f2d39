use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use integration_gateway_sdk::{Credential, GatewayError, Session};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// Cache key: provider id plus a fingerprint of the credential material.
///
/// Rotating the credential for a provider yields a new key, so a session
/// belonging to the old credential is never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    provider_id: String,
    fingerprint: String,
}

impl SessionKey {
    #[must_use]
    pub fn new(provider_id: &str, credential: &Credential) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(credential.base_url.as_bytes());
        hasher.update([0]);
        hasher.update(credential.principal.as_bytes());
        hasher.update([0]);
        hasher.update(credential.secret.expose().as_bytes());
        Self {
            provider_id: provider_id.to_owned(),
            fingerprint: hex::encode(hasher.finalize()),
        }
    }

    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }
}

#[derive(Default)]
struct SlotState {
    session: Option<Arc<Session>>,
    /// Bumped every time an authentication attempt completes.
    generation: u64,
    /// Error of the most recent completed attempt, if it failed.
    last_error: Option<GatewayError>,
}

#[derive(Default)]
struct SessionSlot {
    state: RwLock<SlotState>,
    /// Held for the whole duration of one authentication attempt.
    flight: Mutex<()>,
}

impl SessionSlot {
    fn live_session(&self, skew: Duration) -> Option<Arc<Session>> {
        let state = self.state.read();
        state
            .session
            .as_ref()
            .filter(|s| !s.is_expired(skew))
            .map(Arc::clone)
    }
}

/// Outcome of [`SessionCache::get_or_authenticate`].
#[derive(Debug, Clone)]
pub struct Obtained {
    pub session: Arc<Session>,
    /// True when this caller ran the authentication itself.
    pub fresh: bool,
}

/// In-memory, keyed session store with single-flight authentication.
///
/// Sessions expiring within `expiry_skew` are treated as absent.
pub struct SessionCache {
    slots: DashMap<SessionKey, Arc<SessionSlot>>,
    expiry_skew: Duration,
}

impl SessionCache {
    #[must_use]
    pub fn new(expiry_skew: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            expiry_skew,
        }
    }

    fn slot(&self, key: &SessionKey) -> Arc<SessionSlot> {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.slots.entry(key.clone()).or_default().value())
    }

    /// Returns the cached session unless it is missing or expired.
    #[must_use]
    pub fn get(&self, provider_id: &str, credential: &Credential) -> Option<Arc<Session>> {
        let key = SessionKey::new(provider_id, credential);
        self.slots
            .get(&key)
            .and_then(|slot| slot.live_session(self.expiry_skew))
    }

    #[must_use]
    pub fn put(&self, provider_id: &str, credential: &Credential, session: Session) -> Arc<Session> {
        let key = SessionKey::new(provider_id, credential);
        let session = Arc::new(session);
        let slot = self.slot(&key);
        let mut state = slot.state.write();
        state.session = Some(Arc::clone(&session));
        state.last_error = None;
        session
    }

    /// Drops whatever session is cached for this credential.
    ///
    /// Returns `true` if a session was removed.
    #[must_use]
    pub fn invalidate(&self, provider_id: &str, credential: &Credential) -> bool {
        let key = SessionKey::new(provider_id, credential);
        let removed = self
            .slots
            .get(&key)
            .is_some_and(|slot| slot.state.write().session.take().is_some());
        self.prune(&key);
        removed
    }

    /// Drops the cached session only if it is still `stale`.
    ///
    /// A concurrent caller may already have replaced it with a fresh one,
    /// which must survive.
    #[must_use]
    pub fn invalidate_if_current(
        &self,
        provider_id: &str,
        credential: &Credential,
        stale: &Arc<Session>,
    ) -> bool {
        let key = SessionKey::new(provider_id, credential);
        let removed = self.slots.get(&key).is_some_and(|slot| {
            let mut state = slot.state.write();
            if state.session.as_ref().is_some_and(|s| Arc::ptr_eq(s, stale)) {
                state.session = None;
                true
            } else {
                false
            }
        });
        self.prune(&key);
        removed
    }

    /// Returns a live session, running `authenticate` if there is none.
    ///
    /// At most one `authenticate` runs per key at a time. Callers that queue
    /// behind it reuse its session, or its error if it failed. If the running
    /// attempt is dropped before completing, the next queued caller becomes
    /// the one that authenticates.
    ///
    /// # Errors
    ///
    /// Whatever `authenticate` returned, for the caller that ran it and for
    /// every caller that was waiting on it.
    pub async fn get_or_authenticate<F, Fut>(
        &self,
        provider_id: &str,
        credential: &Credential,
        authenticate: F,
    ) -> Result<Obtained, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session, GatewayError>>,
    {
        let key = SessionKey::new(provider_id, credential);
        let slot = self.slot(&key);

        if let Some(session) = slot.live_session(self.expiry_skew) {
            return Ok(Obtained {
                session,
                fresh: false,
            });
        }
        let seen_generation = slot.state.read().generation;

        let flight = slot.flight.lock().await;
        let outcome = match Self::settled(&slot, seen_generation, self.expiry_skew) {
            Some(outcome) => outcome,
            None => {
                let result = authenticate().await;
                Self::complete(&slot, result)
            }
        };
        drop(flight);
        drop(slot);

        match &outcome {
            Ok(obtained) if obtained.fresh => self.sweep_rotated(&key),
            Ok(_) => {}
            Err(_) => self.prune(&key),
        }
        outcome
    }

    /// What a caller that waited for the flight lock should return without
    /// authenticating: a session someone else obtained, or their error.
    fn settled(
        slot: &SessionSlot,
        seen_generation: u64,
        skew: Duration,
    ) -> Option<Result<Obtained, GatewayError>> {
        let state = slot.state.read();
        if let Some(session) = state.session.as_ref().filter(|s| !s.is_expired(skew)) {
            return Some(Ok(Obtained {
                session: Arc::clone(session),
                fresh: false,
            }));
        }
        if state.generation != seen_generation {
            return state.last_error.clone().map(Err);
        }
        None
    }

    fn complete(
        slot: &SessionSlot,
        result: Result<Session, GatewayError>,
    ) -> Result<Obtained, GatewayError> {
        let mut state = slot.state.write();
        state.generation = state.generation.wrapping_add(1);
        match result {
            Ok(session) => {
                let session = Arc::new(session);
                state.session = Some(Arc::clone(&session));
                state.last_error = None;
                Ok(Obtained {
                    session,
                    fresh: true,
                })
            }
            Err(err) => {
                state.session = None;
                state.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Removes the slot for `key` once no call holds it and it has no session.
    fn prune(&self, key: &SessionKey) {
        _ = self.slots.remove_if(key, |_, slot| {
            Arc::strong_count(slot) == 1 && slot.state.read().session.is_none()
        });
    }

    /// Removes idle slots of earlier credentials for the same provider.
    fn sweep_rotated(&self, key: &SessionKey) {
        self.slots.retain(|k, slot| {
            k == key || k.provider_id != key.provider_id || Arc::strong_count(slot) > 1
        });
    }

    /// Number of credential keys with a live session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.live_session(self.expiry_skew).is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
