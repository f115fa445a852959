//! # Retry Handler
//!
//! Stateless retry policy: classifies an error code into a category and a retry
//! strategy, and runs fallible operations under that policy.
//!
//! ## Policy
//!
//! | Category | Retryable | Max attempts | Strategy |
//! | -------- | --------- | ------------ | -------- |
//! | input / validation | no | 1 | no retry |
//! | provider / AI | yes | 5 (model output `E23xx`: 3) | immediate |
//! | system / IO | yes | 3 | immediate |
//! | configuration | no | 1 | no retry |
//! | internal | no | 1 | no retry |
//!
//! Retryable categories listed in `RetryConfig::exponential_categories` wait
//! with exponential backoff between attempts instead of retrying immediately.
//!
//! The queue reuses [`RetryHandler::classify`] for its own Pending-vs-Failed
//! decision, so policy lives here and the mechanism lives with the caller.

use crate::config::RetryConfig;
use crate::constants::{codes, retry_limits};
use crate::error::{numeric_code, ErrorCategory, PipelineError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry strategy recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// No retry recommended
    NoRetry,
    /// Retry without waiting
    Immediate,
    /// Exponential backoff between attempts
    Exponential,
}

/// Result of classifying an error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub strategy: RetryStrategy,
    pub retryable: bool,
    pub max_attempts: u32,
}

/// One failed attempt recorded by [`RetryHandler::execute_with_retry`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptError {
    pub attempt: u32,
    pub code: String,
    pub message: String,
    pub category: ErrorCategory,
    pub timestamp: DateTime<Utc>,
}

/// Why `execute_with_retry` gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStopReason {
    /// A non-retryable error stopped the loop
    Terminated,
    /// The attempt budget ran out
    Exhausted,
}

/// Aggregated failure with the full attempt history
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("operation failed after {} attempt(s) ({reason:?}): {last_error}", .errors.len())]
pub struct RetryFailure {
    pub errors: Vec<AttemptError>,
    pub reason: RetryStopReason,
    pub last_error: PipelineError,
}

impl From<RetryFailure> for PipelineError {
    fn from(failure: RetryFailure) -> Self {
        let history = serde_json::to_value(&failure.errors).unwrap_or_default();
        failure
            .last_error
            .with_details(serde_json::json!({ "attempts": history, "reason": failure.reason }))
    }
}

/// Per-attempt observer
pub type AttemptCallback = Box<dyn Fn(&AttemptError) + Send + Sync>;

/// Caller options for a single `execute_with_retry` run
#[derive(Default)]
pub struct RetryOptions {
    /// Upper bound on attempts; the classified ceiling still applies
    pub max_attempts: Option<u32>,
    pub on_attempt: Option<AttemptCallback>,
}

impl RetryOptions {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn on_attempt(mut self, callback: impl Fn(&AttemptError) + Send + Sync + 'static) -> Self {
        self.on_attempt = Some(Box::new(callback));
        self
    }
}

/// Retry policy engine
#[derive(Debug, Clone, Default)]
pub struct RetryHandler {
    config: RetryConfig,
}

impl RetryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Classify an error code
    pub fn classify(&self, code: &str) -> ErrorClassification {
        let category = ErrorCategory::from_code(code);
        let (retryable, max_attempts) = match category {
            ErrorCategory::Input | ErrorCategory::Configuration | ErrorCategory::Internal => {
                (false, retry_limits::NON_RETRYABLE)
            }
            ErrorCategory::System => (true, retry_limits::SYSTEM_IO),
            ErrorCategory::Provider if is_model_output(code) => {
                (true, retry_limits::MODEL_OUTPUT)
            }
            ErrorCategory::Provider => (true, retry_limits::PROVIDER),
        };

        let strategy = if !retryable {
            RetryStrategy::NoRetry
        } else if self.config.exponential_categories.contains(&category) {
            RetryStrategy::Exponential
        } else {
            RetryStrategy::Immediate
        };

        ErrorClassification {
            category,
            strategy,
            retryable,
            max_attempts,
        }
    }

    /// Wait before the attempt following `attempt` (1-based)
    pub fn wait_time(&self, classification: &ErrorClassification, attempt: u32) -> Duration {
        match classification.strategy {
            RetryStrategy::Exponential => {
                let base = Duration::from_millis(self.config.base_delay_ms);
                let factor = self
                    .config
                    .multiplier
                    .powi(attempt.saturating_sub(1).min(30) as i32);
                base.mul_f64(factor)
                    .min(Duration::from_millis(self.config.max_delay_ms))
            }
            RetryStrategy::Immediate | RetryStrategy::NoRetry => Duration::ZERO,
        }
    }

    /// Run `operation` until it succeeds, hits a non-retryable error, or runs
    /// out of attempts. The operation receives the 1-based attempt number.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        mut operation: F,
        options: RetryOptions,
    ) -> Result<T, RetryFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = crate::error::Result<T>>,
    {
        let mut errors = Vec::new();
        let mut attempt = 1;

        loop {
            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let classification = self.classify(&error.code);
            let record = AttemptError {
                attempt,
                code: error.code.clone(),
                message: error.message.clone(),
                category: classification.category,
                timestamp: Utc::now(),
            };
            if let Some(callback) = &options.on_attempt {
                callback(&record);
            }
            errors.push(record);

            if !classification.retryable {
                return Err(RetryFailure {
                    errors,
                    reason: RetryStopReason::Terminated,
                    last_error: error,
                });
            }

            let budget = options
                .max_attempts
                .map_or(classification.max_attempts, |cap| {
                    cap.min(classification.max_attempts)
                });
            if attempt >= budget {
                warn!(
                    attempt,
                    budget,
                    error_code = %error.code,
                    "Retry budget exhausted"
                );
                return Err(RetryFailure {
                    errors,
                    reason: RetryStopReason::Exhausted,
                    last_error: error,
                });
            }

            let wait = self.wait_time(&classification, attempt);
            debug!(
                attempt,
                error_code = %error.code,
                wait_ms = wait.as_millis() as u64,
                "Retrying operation"
            );
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            attempt += 1;
        }
    }
}

fn is_model_output(code: &str) -> bool {
    let (low, high) = codes::MODEL_OUTPUT_RANGE;
    numeric_code(code).is_some_and(|n| (low..=high).contains(&n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_input_errors_never_retry() {
        let classification = RetryHandler::new().classify(codes::INPUT_EMPTY);
        assert_eq!(classification.category, ErrorCategory::Input);
        assert!(!classification.retryable);
        assert_eq!(classification.max_attempts, 1);
        assert_eq!(classification.strategy, RetryStrategy::NoRetry);
    }

    #[test]
    fn test_provider_and_model_output_ceilings() {
        let handler = RetryHandler::new();
        let provider = handler.classify(codes::PROVIDER_RATE_LIMITED);
        assert!(provider.retryable);
        assert_eq!(provider.max_attempts, 5);
        assert_eq!(provider.strategy, RetryStrategy::Immediate);

        let model_output = handler.classify(codes::MODEL_OUTPUT_MALFORMED);
        assert!(model_output.retryable);
        assert_eq!(model_output.max_attempts, 3);
    }

    #[test]
    fn test_system_io_and_internal() {
        let handler = RetryHandler::new();
        assert_eq!(handler.classify(codes::EXECUTION_TIMEOUT).max_attempts, 3);
        assert!(!handler.classify(codes::EXECUTION_PANICKED).retryable);
        assert!(!handler.classify(codes::TEMPLATE_MISSING).retryable);
    }

    #[test]
    fn test_exponential_wait_only_when_configured() {
        let immediate = RetryHandler::new();
        let c = immediate.classify(codes::STORAGE_IO);
        assert_eq!(immediate.wait_time(&c, 3), Duration::ZERO);

        let backoff = RetryHandler::with_config(RetryConfig {
            base_delay_ms: 100,
            max_delay_ms: 350,
            multiplier: 2.0,
            exponential_categories: vec![ErrorCategory::System],
        });
        let c = backoff.classify(codes::STORAGE_IO);
        assert_eq!(c.strategy, RetryStrategy::Exponential);
        assert_eq!(backoff.wait_time(&c, 1), Duration::from_millis(100));
        assert_eq!(backoff.wait_time(&c, 2), Duration::from_millis(200));
        assert_eq!(backoff.wait_time(&c, 3), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_execute_with_retry_succeeds_after_transient_failures() {
        let handler = RetryHandler::new();
        let calls = Arc::new(AtomicU32::new(0));
        let observed = Arc::new(AtomicU32::new(0));
        let observed_cb = observed.clone();

        let calls_op = calls.clone();
        let result = handler
            .execute_with_retry(
                move |attempt| {
                    calls_op.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 3 {
                            Err(PipelineError::storage("disk busy"))
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                RetryOptions::default().on_attempt(move |_| {
                    observed_cb.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(observed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_execute_with_retry_terminates_on_non_retryable() {
        let handler = RetryHandler::new();
        let failure = handler
            .execute_with_retry(
                |_| async { Err::<(), _>(PipelineError::new(codes::INPUT_TOO_LONG, "too long")) },
                RetryOptions::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(failure.reason, RetryStopReason::Terminated);
        assert_eq!(failure.errors.len(), 1);
        assert_eq!(failure.last_error.code, codes::INPUT_TOO_LONG);
    }

    #[tokio::test]
    async fn test_execute_with_retry_exhausts_model_output_budget() {
        let handler = RetryHandler::new();
        let failure = handler
            .execute_with_retry(
                |_| async {
                    Err::<(), _>(PipelineError::new(codes::MODEL_OUTPUT_MALFORMED, "not json"))
                },
                RetryOptions::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(failure.reason, RetryStopReason::Exhausted);
        assert_eq!(failure.errors.len(), 3);
        let attempts: Vec<u32> = failure.errors.iter().map(|e| e.attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);

        let as_error: PipelineError = failure.into();
        assert!(as_error.details.is_some());
    }

    #[tokio::test]
    async fn test_caller_cap_lowers_budget() {
        let handler = RetryHandler::new();
        let failure = handler
            .execute_with_retry(
                |_| async { Err::<(), _>(PipelineError::new(codes::PROVIDER_UNAVAILABLE, "503")) },
                RetryOptions::default().with_max_attempts(2),
            )
            .await
            .unwrap_err();
        assert_eq!(failure.errors.len(), 2);
    }
}
