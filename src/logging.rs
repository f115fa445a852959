//! # Structured Logging Module
//!
//! Installs the global `tracing` subscriber and provides one-line structured
//! helpers for queue and pipeline operations.

use crate::config::LoggingConfig;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging. Safe to call more than once; only the first
/// call installs a subscriber, and an already-installed global subscriber is kept.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

        let result = if config.json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true),
                )
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_ansi(true),
                )
                .try_init()
        };

        if result.is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            level = %config.level,
            json = config.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Log structured data for task queue operations
pub fn log_task_operation(
    operation: &str,
    task_id: &str,
    node_id: &str,
    task_type: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_id = %task_id,
        node_id = %node_id,
        task_type = %task_type,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 TASK_OPERATION"
    );
}

/// Log structured data for pipeline operations
pub fn log_pipeline_operation(
    operation: &str,
    pipeline_id: &str,
    node_id: &str,
    stage: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        pipeline_id = %pipeline_id,
        node_id = %node_id,
        stage = %stage,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔧 PIPELINE_OPERATION"
    );
}
