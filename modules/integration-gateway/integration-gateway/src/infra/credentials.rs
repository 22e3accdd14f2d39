//! In-memory credential store.

use std::collections::HashMap;

use async_trait::async_trait;
use integration_gateway_sdk::{Credential, CredentialLookupError, CredentialStore};
use parking_lot::RwLock;

/// Credentials keyed by provider id, replaceable at runtime.
///
/// Each lookup returns a snapshot, so an `upsert` takes effect on the next
/// call without touching calls already in flight.
#[derive(Default)]
pub struct StaticCredentialStore {
    entries: RwLock<HashMap<String, Credential>>,
}

impl StaticCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Later entries win when two share a provider id.
    #[must_use]
    pub fn from_credentials(credentials: Vec<Credential>) -> Self {
        let entries = credentials
            .into_iter()
            .map(|c| (c.provider_id.clone(), c))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Inserts or replaces, returning the previous credential.
    #[must_use]
    pub fn upsert(&self, credential: Credential) -> Option<Credential> {
        self.entries
            .write()
            .insert(credential.provider_id.clone(), credential)
    }

    #[must_use]
    pub fn remove(&self, provider_id: &str) -> Option<Credential> {
        self.entries.write().remove(provider_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn get_credential(&self, provider_id: &str) -> Result<Credential, CredentialLookupError> {
        self.entries
            .read()
            .get(provider_id)
            .cloned()
            .ok_or_else(|| CredentialLookupError::NotFound {
                provider_id: provider_id.to_owned(),
            })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_returns_snapshot_and_reflects_rotation() {
        let store = StaticCredentialStore::from_credentials(vec![Credential::new(
            "unifi",
            "https://unifi.local:8443",
            "admin",
            "old",
        )]);

        let before = store.get_credential("unifi").await.unwrap();
        let previous = store.upsert(Credential::new(
            "unifi",
            "https://unifi.local:8443",
            "admin",
            "new",
        ));
        let after = store.get_credential("unifi").await.unwrap();

        assert_eq!(previous.unwrap().secret.expose(), "old");
        assert_eq!(before.secret.expose(), "old");
        assert_eq!(after.secret.expose(), "new");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_provider_is_not_found() {
        let store = StaticCredentialStore::new();
        _ = store.upsert(Credential::new("zabbix", "http://zbx", "Admin", "zabbix"));
        assert!(store.remove("zabbix").is_some());

        let err = store.get_credential("zabbix").await.unwrap_err();
        assert!(matches!(err, CredentialLookupError::NotFound { ref provider_id } if provider_id == "zabbix"));
        assert!(store.is_empty());
    }
}
