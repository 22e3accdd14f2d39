use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, ValueEnum};
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use integration_gateway::config::GatewayConfig;

/// Environment variables with this prefix override the YAML file,
/// `__` separating nested keys.
pub const ENV_PREFIX: &str = "INTEGRATION_GATEWAY__";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct CommonArgs {
    /// Path to the YAML configuration file
    #[arg(short = 'c', long, global = true, default_value = "./integration-gateway.yaml")]
    pub config: PathBuf,

    /// Filter directive used when `RUST_LOG` is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl CommonArgs {
    pub fn load_config(&self) -> anyhow::Result<GatewayConfig> {
        load_config(&self.config)
    }
}

/// Layered config: defaults, then the YAML file, then `INTEGRATION_GATEWAY__*`.
pub fn load_config(path: &Path) -> anyhow::Result<GatewayConfig> {
    if !path.is_file() {
        anyhow::bail!("config file does not exist: {}", path.display());
    }
    let config: GatewayConfig = Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::io::Write as _;
    use std::time::Duration;

    use super::*;

    fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn yaml_values_override_defaults() {
        let file = write_yaml(
            r#"
invoke_timeout: 7s
providers:
  veeam:
    auth:
      type: token_login
      path: /api/oauth2/token
      token_pointer: /access_token
      expires_in_pointer: /expires_in
      form: true
    operations:
      list_jobs:
        candidates:
          - { template: /api/v1/jobs, priority: 1 }
        shape: { type: object, pointer: "", required: [data] }
"#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.invoke_timeout, Duration::from_secs(7));
        assert_eq!(config.auth_timeout, GatewayConfig::default().auth_timeout);
        assert!(config.providers["veeam"].operations.contains_key("list_jobs"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_config(Path::new("/nonexistent/integration-gateway.yaml")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_yaml("invoke_timeot: 7s\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }
}
