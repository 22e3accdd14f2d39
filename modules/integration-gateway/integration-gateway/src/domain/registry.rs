//! Static provider registration: authenticator plus candidate lists per operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use integration_gateway_sdk::{Authenticator, EndpointCandidate};

use crate::config::{ConfigError, DialectConfig, GatewayConfig, HttpMethod, ProviderConfig};
use crate::domain::shape::ResponseShape;
use crate::infra::http::HttpTransport;
use crate::providers;

/// Wire dialect of a provider's operation endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialect {
    Rest,
    JsonRpc { path: String },
}

impl From<&DialectConfig> for Dialect {
    fn from(cfg: &DialectConfig) -> Self {
        match cfg {
            DialectConfig::Rest => Self::Rest,
            DialectConfig::JsonRpc { path } => Self::JsonRpc { path: path.clone() },
        }
    }
}

/// One logical operation and the endpoints hypothesised to implement it.
#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub method: HttpMethod,
    /// Sorted by ascending priority. Ties keep declaration order.
    pub candidates: Vec<EndpointCandidate>,
    pub shape: ResponseShape,
    pub timeout: Option<Duration>,
}

impl Operation {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: HttpMethod::Get,
            candidates: Vec::new(),
            shape: ResponseShape::AnyJson,
            timeout: None,
        }
    }

    #[must_use]
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn candidate(mut self, template: impl Into<String>, priority: i32) -> Self {
        self.candidates
            .push(EndpointCandidate::new(template, priority));
        self.sort_candidates();
        self
    }

    #[must_use]
    pub fn shape(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn sort_candidates(&mut self) {
        self.candidates.sort_by_key(|c| c.priority);
    }
}

/// A registered provider.
pub struct Provider {
    pub id: String,
    pub authenticator: Arc<dyn Authenticator>,
    pub dialect: Dialect,
    pub reachability_path: String,
    pub critical_operations: Vec<String>,
    operations: HashMap<String, Operation>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("authenticator", &self.authenticator.name())
            .field("dialect", &self.dialect)
            .field("reachability_path", &self.reachability_path)
            .field("critical_operations", &self.critical_operations)
            .field("operations", &self.operations)
            .finish()
    }
}

impl Provider {
    #[must_use]
    pub fn builder(id: impl Into<String>, authenticator: Arc<dyn Authenticator>) -> ProviderBuilder {
        ProviderBuilder {
            provider: Self {
                id: id.into(),
                authenticator,
                dialect: Dialect::Rest,
                reachability_path: "/".to_owned(),
                critical_operations: Vec::new(),
                operations: HashMap::new(),
            },
        }
    }

    #[must_use]
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    /// Operation names in lexical order.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

pub struct ProviderBuilder {
    provider: Provider,
}

impl ProviderBuilder {
    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.provider.dialect = dialect;
        self
    }

    #[must_use]
    pub fn reachability_path(mut self, path: impl Into<String>) -> Self {
        self.provider.reachability_path = path.into();
        self
    }

    #[must_use]
    pub fn operation(mut self, operation: Operation) -> Self {
        self.provider
            .operations
            .insert(operation.name.clone(), operation);
        self
    }

    #[must_use]
    pub fn critical(mut self, operation: impl Into<String>) -> Self {
        self.provider.critical_operations.push(operation.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Provider {
        self.provider
    }
}

/// All providers known to the gateway, fixed at startup.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<Provider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider, replacing any previous one with the same id.
    pub fn register(&mut self, provider: Provider) {
        self.providers
            .insert(provider.id.clone(), Arc::new(provider));
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Provider>> {
        self.providers.get(id).cloned()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Builds every provider declared in `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if the configuration does not validate.
    pub fn from_config(config: &GatewayConfig, transport: &HttpTransport) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut registry = Self::new();
        for (id, provider_cfg) in &config.providers {
            registry.register(provider_from_config(id, provider_cfg, config, transport));
        }
        Ok(registry)
    }
}

fn provider_from_config(
    id: &str,
    cfg: &ProviderConfig,
    gateway: &GatewayConfig,
    transport: &HttpTransport,
) -> Provider {
    let dialect = Dialect::from(&cfg.dialect);
    let authenticator = providers::from_config(&cfg.auth, &dialect, gateway, transport);

    let mut builder = Provider::builder(id, authenticator)
        .dialect(dialect)
        .reachability_path(cfg.reachability_path.clone());
    for (name, op_cfg) in &cfg.operations {
        let mut op = Operation::new(name.clone())
            .method(op_cfg.method)
            .shape(op_cfg.shape.clone());
        op.candidates.clone_from(&op_cfg.candidates);
        op.sort_candidates();
        op.timeout = op_cfg.timeout;
        builder = builder.operation(op);
    }
    for critical in &cfg.critical_operations {
        builder = builder.critical(critical.clone());
    }
    builder.build()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::providers::StaticTokenAuthenticator;

    #[test]
    fn candidates_sorted_by_priority_stable() {
        let op = Operation::new("list_jobs")
            .candidate("/api/v3/jobs", 3)
            .candidate("/api/v1/jobs", 1)
            .candidate("/jobs", 3)
            .candidate("/api/v2/jobs", 2);
        let order: Vec<&str> = op.candidates.iter().map(|c| c.template.as_str()).collect();
        assert_eq!(order, ["/api/v1/jobs", "/api/v2/jobs", "/api/v3/jobs", "/jobs"]);
    }

    #[test]
    fn registry_lookup_by_id() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            Provider::builder(
                "bacula",
                Arc::new(StaticTokenAuthenticator::new(Duration::from_secs(60))),
            )
            .operation(Operation::new("list_jobs").candidate("/api/v2/jobs", 1))
            .critical("list_jobs")
            .build(),
        );

        let bacula = registry.get("bacula").unwrap();
        assert_eq!(bacula.authenticator.name(), "static_token");
        assert!(bacula.operation("list_jobs").is_some());
        assert!(bacula.operation("list_clients").is_none());
        assert_eq!(registry.ids(), ["bacula"]);
        assert!(registry.get("zabbix").is_none());
    }

    #[test]
    fn from_config_builds_sorted_operations() {
        let config: GatewayConfig = serde_json::from_value(serde_json::json!({
            "providers": {
                "zabbix": {
                    "auth": { "type": "json_rpc" },
                    "dialect": { "type": "json_rpc", "path": "/zabbix/api_jsonrpc.php" },
                    "operations": {
                        "list_hosts": {
                            "method": "POST",
                            "candidates": [
                                { "template": "host.list", "priority": 5 },
                                { "template": "host.get", "priority": 1 }
                            ]
                        }
                    }
                }
            }
        }))
        .unwrap();
        let transport = HttpTransport::new(&crate::infra::http::TransportConfig::default()).unwrap();

        let registry = ProviderRegistry::from_config(&config, &transport).unwrap();
        let zabbix = registry.get("zabbix").unwrap();
        assert_eq!(
            zabbix.dialect,
            Dialect::JsonRpc {
                path: "/zabbix/api_jsonrpc.php".to_owned()
            }
        );
        assert_eq!(zabbix.authenticator.name(), "json_rpc");
        let op = zabbix.operation("list_hosts").unwrap();
        assert_eq!(op.candidates[0].template, "host.get");
        assert_eq!(op.method, HttpMethod::Post);
    }
}
