//! Configuration Loader
//!
//! Builds [`CoreConfig`] from an optional file plus environment overrides using
//! the `config` crate, then validates it.

use super::error::{ConfigResult, ConfigurationError};
use super::CoreConfig;
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Prefix for environment overrides, e.g. `CONCEPT_PIPELINE__QUEUE__CONCURRENCY=4`
pub const ENV_PREFIX: &str = "CONCEPT_PIPELINE";

/// Owns the validated configuration and where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: CoreConfig,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load from `path` (YAML, TOML or JSON by extension; missing file is allowed)
    /// with environment overrides applied on top.
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading pipeline configuration");

        let layered = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(path.display().to_string(), e))?;

        let config: CoreConfig = layered
            .try_deserialize()
            .map_err(|e| ConfigurationError::load_error(path.display().to_string(), e))?;

        config.validate()?;

        info!(
            path = %path.display(),
            concurrency = config.queue.concurrency,
            auto_retry = config.queue.auto_retry,
            grounding = config.pipeline.enable_grounding,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            source_path: Some(path.to_path_buf()),
        }))
    }

    /// Wrap an already-built configuration after validating it
    pub fn from_config(config: CoreConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            source_path: None,
        }))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}
