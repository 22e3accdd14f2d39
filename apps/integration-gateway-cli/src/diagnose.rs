use std::process::ExitCode;

use clap::Args;
use integration_gateway::config::GatewayConfig;
use integration_gateway::{IntegrationGatewayClient, IntegrationGatewayLocalClient, StepStatus};

#[derive(Args)]
pub struct DiagnoseArgs {
    /// Provider id as configured under `providers`
    provider: String,
}

impl DiagnoseArgs {
    /// Prints the report as JSON. Exits non-zero only when a step failed.
    pub async fn run(self, config: &GatewayConfig) -> anyhow::Result<ExitCode> {
        let client = IntegrationGatewayLocalClient::new(integration_gateway::build(config, None)?);
        let report = client.run_diagnostics(&self.provider).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(match report.overall() {
            StepStatus::Fail => ExitCode::FAILURE,
            StepStatus::Ok | StepStatus::Warn => ExitCode::SUCCESS,
        })
    }
}
