//! Error types for the pipeline core.
//!
//! Every failure that crosses a component boundary is a [`PipelineError`]: a
//! namespaced code, a human-readable message and optional structured details.
//! The code alone drives retry classification (see [`crate::resilience`]).

use crate::constants::codes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error category, derived from the leading digit of an error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad user input or an operation requested in the wrong state
    Input,
    /// AI provider failures, including malformed model output
    Provider,
    /// Filesystem, timeout and other environmental failures
    System,
    /// Missing or invalid configuration, requires manual intervention
    Configuration,
    /// Broken invariants and uncaught execution errors
    Internal,
}

impl ErrorCategory {
    /// Category for an error code such as `E2301`. Unparseable codes are internal.
    pub fn from_code(code: &str) -> Self {
        match numeric_code(code).map(|n| n / 1000) {
            Some(1) => Self::Input,
            Some(2) => Self::Provider,
            Some(3) => Self::System,
            Some(4) => Self::Configuration,
            _ => Self::Internal,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Provider => write!(f, "provider"),
            Self::System => write!(f, "system"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Numeric part of a code (`"E2301"` ⇒ `2301`)
pub fn numeric_code(code: &str) -> Option<u16> {
    let digits = code.strip_prefix('E')?;
    if digits.len() != 4 {
        return None;
    }
    digits.parse().ok()
}

/// Structured error carried through the queue and the orchestrator
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct PipelineError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl PipelineError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(&self.code)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(codes::STORAGE_IO, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::INVARIANT_BROKEN, message)
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(codes::TASK_NOT_FOUND, format!("Task {task_id} not found"))
    }

    pub fn pipeline_not_found(pipeline_id: &str) -> Self {
        Self::new(
            codes::PIPELINE_NOT_FOUND,
            format!("Pipeline {pipeline_id} not found"),
        )
    }

    pub fn missing_artifact(pipeline_id: &str, artifact: &str) -> Self {
        Self::new(
            codes::MISSING_ARTIFACT,
            format!("Pipeline {pipeline_id} is missing {artifact}"),
        )
    }

    pub fn user_cancelled() -> Self {
        Self::new(codes::USER_CANCELLED, "Cancelled by user")
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::new(
            codes::SNAPSHOT_SERIALIZATION,
            format!("JSON serialization error: {error}"),
        )
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => {
                PipelineError::new(codes::FILE_NOT_FOUND, error.to_string())
            }
            _ => PipelineError::storage(error.to_string()),
        }
    }
}

impl From<crate::config::ConfigurationError> for PipelineError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        PipelineError::new(codes::INVALID_CONFIGURATION, error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_code() {
        assert_eq!(ErrorCategory::from_code("E1001"), ErrorCategory::Input);
        assert_eq!(ErrorCategory::from_code("E2301"), ErrorCategory::Provider);
        assert_eq!(ErrorCategory::from_code("E3002"), ErrorCategory::System);
        assert_eq!(
            ErrorCategory::from_code("E4001"),
            ErrorCategory::Configuration
        );
        assert_eq!(ErrorCategory::from_code("E5001"), ErrorCategory::Internal);
        assert_eq!(ErrorCategory::from_code("oops"), ErrorCategory::Internal);
        assert_eq!(ErrorCategory::from_code("E99"), ErrorCategory::Internal);
    }

    #[test]
    fn test_display_includes_code() {
        let error = PipelineError::new(codes::INPUT_EMPTY, "Input is empty");
        assert_eq!(error.to_string(), "[E1001] Input is empty");
    }

    #[test]
    fn test_io_not_found_maps_to_file_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: PipelineError = io.into();
        assert_eq!(error.code, codes::FILE_NOT_FOUND);
    }
}
