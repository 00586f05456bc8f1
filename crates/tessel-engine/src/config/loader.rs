use super::schema::EngineConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Names a config file that must exist, bypassing the search path.
pub const CONFIG_ENV: &str = "TESSEL_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// `$TESSEL_CONFIG` when set, else the first file of [`Self::search_path`]
    /// that exists, else defaults.
    pub async fn load_default() -> Result<EngineConfig, ConfigError> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from(Path::new(&explicit)).await;
        }
        Self::load_first(&Self::search_path()).await
    }

    /// `./tessel.yaml`, then `~/.tessel/config.yaml`.
    pub fn search_path() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("tessel.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".tessel").join("config.yaml"));
        }
        paths
    }

    pub async fn load_first(candidates: &[PathBuf]) -> Result<EngineConfig, ConfigError> {
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Self::load_from(path).await,
            None => {
                debug!("No config file found, using defaults");
                Ok(EngineConfig::default())
            }
        }
    }

    pub async fn load_from(path: &Path) -> Result<EngineConfig, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parses and checks YAML text. Blank text yields the defaults.
    pub fn parse(content: &str) -> Result<EngineConfig, ConfigError> {
        let config = if content.trim().is_empty() {
            EngineConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        check(&config)?;
        Ok(config)
    }
}

/// Rejects settings the executor cannot honor.
fn check(config: &EngineConfig) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::Invalid(msg));
    let resolution = &config.resolution;

    for (name, value) in [
        ("confidence_threshold", resolution.confidence_threshold),
        ("min_match_score", resolution.min_match_score),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return invalid(format!("resolution.{name} must be within 0..=1, got {value}"));
        }
    }
    if resolution.min_match_score > resolution.confidence_threshold {
        return invalid(format!(
            "resolution.min_match_score ({}) exceeds confidence_threshold ({})",
            resolution.min_match_score, resolution.confidence_threshold
        ));
    }
    if config.waits.poll_interval_ms == 0 {
        return invalid("waits.poll_interval_ms must be positive".into());
    }
    if config.retry.backoff_multiplier < 1.0 {
        return invalid(format!(
            "retry.backoff_multiplier must be at least 1, got {}",
            config.retry.backoff_multiplier
        ));
    }
    if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
        return invalid(format!(
            "retry.initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
            config.retry.initial_backoff_ms, config.retry.max_backoff_ms
        ));
    }
    Ok(())
}
