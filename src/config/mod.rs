//! # Configuration System
//!
//! Layered configuration for the queue, the pipeline orchestrator, the retry
//! policy and logging. Every field carries a serde default, so an empty file (or
//! no file at all) yields a working configuration; environment variables with
//! the `CONCEPT_PIPELINE` prefix override file values.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use concept_pipeline::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_file("pipeline.yaml")?;
//! let concurrency = manager.config().queue.concurrency;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::defaults;
use crate::error::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CoreConfig {
    /// Task queue scheduling and persistence
    #[serde(default)]
    pub queue: QueueConfig,

    /// Pipeline orchestration behavior
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Retry policy tuning
    #[serde(default)]
    pub retry: RetryConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Validate cross-field constraints that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue.concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.concurrency",
                "0",
                "concurrency must be at least 1",
            ));
        }
        if self.queue.tick_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.tick_interval_ms",
                "0",
                "tick interval must be positive",
            ));
        }
        if self.queue.task_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.task_timeout_ms",
                "0",
                "task timeout must be positive",
            ));
        }
        if self.pipeline.max_input_length == 0 {
            return Err(ConfigurationError::invalid_value(
                "pipeline.max_input_length",
                "0",
                "maximum input length must be positive",
            ));
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.multiplier",
                self.retry.multiplier.to_string(),
                "backoff multiplier must be >= 1.0",
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.max_delay_ms",
                self.retry.max_delay_ms.to_string(),
                "maximum delay must not be below the base delay",
            ));
        }
        Ok(())
    }
}

/// Task queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Maximum number of tasks running at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Scheduler tick interval
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Per-task execution timeout
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
    /// Whether retryable failures go back to Pending automatically
    #[serde(default = "default_true")]
    pub auto_retry: bool,
    /// Number of terminal tasks kept in history
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Storage-relative path of the durable snapshot
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

impl QueueConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::CONCURRENCY,
            tick_interval_ms: defaults::TICK_INTERVAL_MS,
            task_timeout_ms: defaults::TASK_TIMEOUT_MS,
            auto_retry: true,
            max_history: defaults::MAX_HISTORY,
            snapshot_path: defaults::SNAPSHOT_PATH.to_string(),
        }
    }
}

/// Pipeline orchestration configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Storage-relative directory where notes are written
    #[serde(default = "default_notes_dir")]
    pub notes_dir: String,
    /// Maximum accepted user input length, in characters
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,
    /// Write the stub and continue without waiting for the user after enrichment
    #[serde(default = "default_true")]
    pub auto_confirm_create: bool,
    /// Run a fact-check pass before write confirmation
    #[serde(default)]
    pub enable_grounding: bool,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
    /// Prompt template that must exist before `define_direct` calls the provider
    #[serde(default)]
    pub define_template_id: Option<String>,
    /// Whether an AI provider has been set up at all
    #[serde(default = "default_true")]
    pub provider_configured: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            notes_dir: defaults::NOTES_DIR.to_string(),
            max_input_length: defaults::MAX_INPUT_LENGTH,
            auto_confirm_create: true,
            enable_grounding: false,
            chat_model: defaults::CHAT_MODEL.to_string(),
            embedding_model: defaults::EMBEDDING_MODEL.to_string(),
            embedding_dimensions: defaults::EMBEDDING_DIMENSIONS,
            define_template_id: None,
            provider_configured: true,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_retry_multiplier")]
    pub multiplier: f64,
    /// Retryable categories that wait with exponential backoff instead of retrying immediately
    #[serde(default)]
    pub exponential_categories: Vec<ErrorCategory>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            max_delay_ms: defaults::RETRY_MAX_DELAY_MS,
            multiplier: defaults::RETRY_MULTIPLIER,
            exponential_categories: Vec::new(),
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    defaults::CONCURRENCY
}

fn default_tick_interval_ms() -> u64 {
    defaults::TICK_INTERVAL_MS
}

fn default_task_timeout_ms() -> u64 {
    defaults::TASK_TIMEOUT_MS
}

fn default_max_history() -> usize {
    defaults::MAX_HISTORY
}

fn default_snapshot_path() -> String {
    defaults::SNAPSHOT_PATH.to_string()
}

fn default_notes_dir() -> String {
    defaults::NOTES_DIR.to_string()
}

fn default_max_input_length() -> usize {
    defaults::MAX_INPUT_LENGTH
}

fn default_chat_model() -> String {
    defaults::CHAT_MODEL.to_string()
}

fn default_embedding_model() -> String {
    defaults::EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimensions() -> usize {
    defaults::EMBEDDING_DIMENSIONS
}

fn default_retry_base_delay_ms() -> u64 {
    defaults::RETRY_BASE_DELAY_MS
}

fn default_retry_max_delay_ms() -> u64 {
    defaults::RETRY_MAX_DELAY_MS
}

fn default_retry_multiplier() -> f64 {
    defaults::RETRY_MULTIPLIER
}

fn default_log_level() -> String {
    "info".to_string()
}
