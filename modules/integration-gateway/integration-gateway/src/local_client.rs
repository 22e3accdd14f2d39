//! Local client adapter implementing the SDK API trait.

use std::sync::Arc;

use async_trait::async_trait;
use integration_gateway_sdk::{
    DiagnosticReport, GatewayError, IntegrationGatewayClient, InvokeError, InvokeRequest,
    InvokeResponse,
};

use crate::domain::service::Service;

/// In-process [`IntegrationGatewayClient`] backed by a shared [`Service`].
pub struct IntegrationGatewayLocalClient {
    service: Arc<Service>,
}

impl IntegrationGatewayLocalClient {
    #[must_use]
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }

    #[must_use]
    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }
}

/// Tags a domain error with the call it came from. Already logged by the service.
fn into_invoke_error(req: &InvokeRequest, error: GatewayError) -> InvokeError {
    InvokeError::new(req.provider_id.as_str(), req.operation.as_str(), error)
}

#[async_trait]
impl IntegrationGatewayClient for IntegrationGatewayLocalClient {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, InvokeError> {
        self.service
            .invoke(&request)
            .await
            .map_err(|e| into_invoke_error(&request, e))
    }

    async fn run_diagnostics(&self, provider_id: &str) -> DiagnosticReport {
        self.service.run_diagnostics(provider_id).await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use integration_gateway_sdk::{Credential, ErrorKind};

    use super::*;
    use crate::config::GatewayConfig;
    use crate::domain::registry::{Operation, Provider, ProviderRegistry};
    use crate::infra::credentials::StaticCredentialStore;
    use crate::infra::http::{HttpTransport, TransportConfig};
    use crate::providers::StaticTokenAuthenticator;

    fn client(base_url: &str) -> IntegrationGatewayLocalClient {
        let mut registry = ProviderRegistry::new();
        registry.register(
            Provider::builder(
                "guacamole",
                Arc::new(StaticTokenAuthenticator::new(Duration::from_secs(60))),
            )
            .operation(Operation::new("list_connections").candidate("/api/connections", 1))
            .build(),
        );
        let store = StaticCredentialStore::from_credentials(vec![Credential::new(
            "guacamole",
            base_url,
            "guacadmin",
            "tok",
        )]);
        let service = Service::new(
            &GatewayConfig::default(),
            Arc::new(registry),
            Arc::new(store),
            HttpTransport::new(&TransportConfig::default()).unwrap(),
        );
        IntegrationGatewayLocalClient::new(Arc::new(service))
    }

    #[tokio::test]
    async fn invoke_passes_value_through() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/connections")
                .header("authorization", "Bearer tok");
            then.status(200).json_body(serde_json::json!({ "1": { "name": "rdp" } }));
        });

        let resp = client(&server.base_url())
            .invoke(InvokeRequest::new("guacamole", "list_connections"))
            .await
            .unwrap();
        assert_eq!(resp.value["1"]["name"], "rdp");
        assert_eq!(resp.candidate, "/api/connections");
        assert!(!resp.reauthenticated);
    }

    #[tokio::test]
    async fn errors_are_tagged_with_provider_and_operation() {
        let err = client("http://127.0.0.1:1")
            .invoke(InvokeRequest::new("guacamole", "list_users"))
            .await
            .unwrap_err();
        assert_eq!(err.provider_id, "guacamole");
        assert_eq!(err.operation, "list_users");
        assert_eq!(err.kind(), ErrorKind::EndpointNotFound);
    }
}
