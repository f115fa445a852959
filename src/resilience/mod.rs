//! # Resilience Module
//!
//! Retry policy shared by the task queue (Pending-vs-Failed decisions) and by
//! direct callers that want bounded retries around a fallible operation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use concept_pipeline::resilience::{RetryHandler, RetryOptions};
//! use concept_pipeline::error::PipelineError;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handler = RetryHandler::new();
//! let value = handler
//!     .execute_with_retry(|_attempt| async { Ok::<_, PipelineError>(42) }, RetryOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod retry_handler;

pub use retry_handler::{
    AttemptError, ErrorClassification, RetryFailure, RetryHandler, RetryOptions, RetryStopReason,
    RetryStrategy,
};
