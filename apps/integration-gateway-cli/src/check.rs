use std::process::ExitCode;

use integration_gateway::config::GatewayConfig;

pub fn run(config: &GatewayConfig) -> anyhow::Result<ExitCode> {
    tracing::info!("Checking configuration...");
    let service = integration_gateway::build(config, None)?;

    for id in service.registry().ids() {
        let Some(provider) = service.registry().get(id) else {
            continue;
        };
        println!("{id}: {}", provider.operation_names().join(", "));
    }
    for cred in &config.credentials {
        if service.registry().get(&cred.provider_id).is_none() {
            tracing::warn!(provider_id = %cred.provider_id, "credential for unknown provider");
        }
    }

    tracing::info!("Configuration is valid");
    Ok(ExitCode::SUCCESS)
}
