use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Redline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedlineConfig {
    /// Review workflow settings
    pub review: ReviewSettings,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReviewSettings {
    /// Number of submitted rounds in the workflow (must be even, >= 2)
    pub max_rounds: u32,
    /// Question lock time-to-live in seconds
    pub lock_ttl_seconds: u64,
    /// Per-topic buffer size for the change-notification registry
    pub notify_buffer: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Enable structured tracing output
    pub tracing_enabled: bool,
    /// Log level
    pub log_level: String,
}

impl Default for RedlineConfig {
    fn default() -> Self {
        Self {
            review: ReviewSettings {
                max_rounds: 2,
                lock_ttl_seconds: 120,
                notify_buffer: 64,
            },
            observability: ObservabilityConfig {
                tracing_enabled: true,
                log_level: "info".to_string(),
            },
        }
    }
}

impl ReviewSettings {
    pub fn lock_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.lock_ttl_seconds)
    }
}

impl RedlineConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (redline.toml)
    /// 3. Environment variables (prefixed with REDLINE_)
    pub fn load() -> Result<Self> {
        let defaults = RedlineConfig::default();
        let mut builder = Config::builder()
            .set_default("review.max_rounds", defaults.review.max_rounds as u64)?
            .set_default("review.lock_ttl_seconds", defaults.review.lock_ttl_seconds)?
            .set_default("review.notify_buffer", defaults.review.notify_buffer as u64)?
            .set_default(
                "observability.tracing_enabled",
                defaults.observability.tracing_enabled,
            )?
            .set_default("observability.log_level", defaults.observability.log_level)?;

        if Path::new("redline.toml").exists() {
            builder = builder.add_source(File::with_name("redline"));
        }

        builder = builder.add_source(
            Environment::with_prefix("REDLINE")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<RedlineConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = RedlineConfig::load_env_file();
        RedlineConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static RedlineConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_a_valid_round_plan() {
        let cfg = RedlineConfig::default();
        assert!(crate::status::RoundPlan::new(cfg.review.max_rounds).is_ok());
        assert_eq!(cfg.review.lock_ttl(), std::time::Duration::from_secs(120));
    }
}
