use std::process::ExitCode;
use std::time::Duration;

use clap::Args;
use integration_gateway::config::GatewayConfig;
use integration_gateway::{
    GatewayError, IntegrationGatewayClient, IntegrationGatewayLocalClient, InvokeError,
    InvokeRequest,
};
use serde_json::{Value, json};

#[derive(Args)]
pub struct InvokeArgs {
    /// Provider id as configured under `providers`
    provider: String,

    /// Operation name
    operation: String,

    /// Call parameter as `key=value`; JSON values are parsed, anything else is a string
    #[arg(short = 'p', long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,

    /// Whole-call deadline, e.g. `10s` or `1m 30s`
    #[arg(short = 't', long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
}

impl InvokeArgs {
    pub async fn run(self, config: &GatewayConfig) -> anyhow::Result<ExitCode> {
        let client = IntegrationGatewayLocalClient::new(integration_gateway::build(config, None)?);

        let mut request = InvokeRequest::new(self.provider, self.operation);
        for (key, value) in self.params {
            request = request.param(key, value);
        }
        if let Some(timeout) = self.timeout {
            request = request.with_timeout(timeout);
        }

        match client.invoke(request).await {
            Ok(resp) => {
                println!("{}", serde_json::to_string_pretty(&resp)?);
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                println!("{}", serde_json::to_string_pretty(&error_body(&err))?);
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn error_body(err: &InvokeError) -> Value {
    let mut body = json!({
        "provider_id": err.provider_id,
        "operation": err.operation,
        "error": err.kind(),
        "status": err.error.status(),
        "message": err.error.to_string(),
    });
    if let GatewayError::EndpointNotFound { attempts } = &err.error {
        body["attempts"] = json!(attempts);
    }
    body
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((key.to_owned(), value))
}
