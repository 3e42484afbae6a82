//! Settings file and command-line overrides.

use anyhow::{Context, Result};
use clap::Args;
use edgeshift_analyzer::OracleConfig;
use edgeshift_migration::{PipelineConfig, StepDelays};
use edgeshift_redaction::Redactor;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Upload limit when neither the file nor the environment sets one.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 100;

/// Values read from `--config`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub oracle: OracleConfig,
    pub steps: StepDelays,
    pub pipeline: PipelineConfig,
    pub max_upload_mb: Option<u64>,
}

/// Oracle and limit flags, each also readable from the environment.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Oracle API key (falls back to OPENAI_API_KEY)
    #[arg(long, env = "EDGESHIFT_ORACLE_API_KEY", hide_env_values = true, global = true)]
    pub oracle_api_key: Option<String>,

    /// Oracle model name
    #[arg(long, env = "EDGESHIFT_ORACLE_MODEL", global = true)]
    pub oracle_model: Option<String>,

    /// Oracle base URL
    #[arg(long, env = "EDGESHIFT_ORACLE_URL", global = true)]
    pub oracle_url: Option<String>,

    /// Oracle request timeout in seconds
    #[arg(long, env = "EDGESHIFT_ORACLE_TIMEOUT_SECS", global = true)]
    pub oracle_timeout_secs: Option<u64>,

    /// Largest accepted upload in megabytes
    #[arg(long, env = "EDGESHIFT_MAX_UPLOAD_MB", global = true)]
    pub max_upload_mb: Option<u64>,
}

impl Settings {
    /// Read the settings file, or defaults when none is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Apply command-line and environment values over the file.
    pub fn apply(&mut self, overrides: &Overrides) {
        let api_key = overrides
            .oracle_api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        if api_key.is_some() {
            self.oracle.api_key = api_key;
        }
        if let Some(model) = &overrides.oracle_model {
            self.oracle.model = model.clone();
        }
        if let Some(url) = &overrides.oracle_url {
            self.oracle.base_url = url.clone();
        }
        if let Some(timeout) = overrides.oracle_timeout_secs {
            self.oracle.timeout_secs = timeout;
        }
        if let Some(limit) = overrides.max_upload_mb {
            self.max_upload_mb = Some(limit);
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.unwrap_or(DEFAULT_MAX_UPLOAD_MB) * 1024 * 1024
    }

    /// Log the effective settings with secrets masked.
    pub fn log_summary(&self) {
        let redactor = Redactor::new();
        let (api_key, _) = redactor.redact_key_value(
            "api_key",
            self.oracle.api_key.as_deref().unwrap_or_default(),
        );
        info!(
            "Oracle: model={} url={} timeout={}s api_key={}",
            self.oracle.model,
            self.oracle.base_url,
            self.oracle.timeout_secs,
            if api_key.is_empty() { "<unset>" } else { api_key.as_str() }
        );
        info!(
            "Deployment target: {}/{}, upload limit {} MB",
            self.pipeline.deployment_org,
            self.pipeline.deployment_env,
            self.max_upload_mb.unwrap_or(DEFAULT_MAX_UPLOAD_MB)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.oracle.model, "gpt-4o");
        assert_eq!(settings.steps, StepDelays::default());
        assert_eq!(settings.pipeline.deployment_org, "demo-org");
        assert_eq!(settings.max_upload_bytes(), 100 * 1024 * 1024);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "oracle:\n  model: gpt-4o-mini\nsteps:\n  deploy_ms: 5\npipeline:\n  deployment_env: prod\nmax_upload_mb: 2"
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.oracle.model, "gpt-4o-mini");
        assert_eq!(settings.oracle.timeout_secs, 60);
        assert_eq!(settings.steps.deploy_ms, 5);
        assert_eq!(settings.steps.validate_source_ms, 2000);
        assert_eq!(settings.pipeline.deployment_org, "demo-org");
        assert_eq!(settings.pipeline.deployment_env, "prod");
        assert_eq!(settings.max_upload_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut settings = Settings::default();
        settings.oracle.model = "from-file".to_string();
        settings.max_upload_mb = Some(5);

        settings.apply(&Overrides {
            oracle_api_key: Some("sk-test".to_string()),
            oracle_model: Some("from-cli".to_string()),
            oracle_timeout_secs: Some(5),
            max_upload_mb: Some(1),
            ..Default::default()
        });

        assert_eq!(settings.oracle.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.oracle.model, "from-cli");
        assert_eq!(settings.oracle.timeout_secs, 5);
        assert_eq!(settings.max_upload_bytes(), 1024 * 1024);
    }

    #[test]
    fn test_missing_or_invalid_file() {
        assert!(Settings::load(Some(Path::new("/nonexistent/settings.yaml"))).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "steps: [1, 2]").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }
}
