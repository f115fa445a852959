#![allow(clippy::doc_markdown)] // Allow technical terms like YAML, JSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Concept Pipeline
//!
//! Durable task scheduling and multi-stage orchestration for AI-generated
//! knowledge notes.
//!
//! ## Overview
//!
//! A concept goes from raw user input to a note on disk through a directed
//! sequence of stages: it is defined, enriched, generated, embedded, optionally
//! fact-checked, written atomically and checked for duplicates. A human can
//! confirm, correct or cancel at defined checkpoints.
//!
//! ## Architecture
//!
//! - **RetryHandler** ([`resilience`]): stateless policy that classifies error
//!   codes into categories and retry strategies.
//! - **TaskQueue** ([`queue`]): durable, concurrency-limited scheduler with
//!   per-entity and per-category locks, crash recovery and classified retry.
//! - **PipelineOrchestrator** ([`pipeline`]): owns pipeline contexts and
//!   advances them from direct provider calls and queue events across the
//!   create, incremental-improve and merge workflows.
//!
//! External collaborators (storage, AI provider, prompt templates, vector
//! index, duplicate tracking, undo snapshots) are consumed through the traits
//! in [`ports`].
//!
//! ## Module Organization
//!
//! - [`config`] - Layered configuration (`config` crate, env overrides)
//! - [`constants`] - Error codes and tunable defaults
//! - [`error`] - Structured `PipelineError`
//! - [`events`] - Multi-listener event bus
//! - [`logging`] - `tracing` subscriber setup and operation logs
//! - [`models`] - Task records and note artifacts
//! - [`state_machine`] - Task and pipeline-stage transition tables
//! - [`storage`] - Filesystem storage with verified atomic writes
//! - [`test_helpers`] - In-memory collaborators for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use concept_pipeline::config::ConfigManager;
//! use concept_pipeline::queue::{InMemoryLockManager, TaskQueue};
//! use concept_pipeline::resilience::RetryHandler;
//! use concept_pipeline::storage::FsStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_file("pipeline.yaml")?;
//! let config = manager.config();
//! concept_pipeline::logging::init_structured_logging(&config.logging);
//!
//! let queue = Arc::new(TaskQueue::new(
//!     config.queue.clone(),
//!     Arc::new(InMemoryLockManager::new()),
//!     Arc::new(FsStorage::new("./vault")),
//!     RetryHandler::with_config(config.retry.clone()),
//! ));
//! queue.initialize().await?;
//! queue.start()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod ports;
pub mod queue;
pub mod resilience;
pub mod state_machine;
pub mod storage;
pub mod test_helpers;

pub use config::{ConfigManager, CoreConfig, PipelineConfig, QueueConfig, RetryConfig};
pub use error::{ErrorCategory, PipelineError, Result};
pub use models::{KnowledgeType, NewTask, TaskOutput, TaskRecord, TaskType, TaskWork};
pub use pipeline::{
    MergeRequest, PipelineCollaborators, PipelineContext, PipelineEvent, PipelineOrchestrator,
};
pub use queue::{InMemoryLockManager, ProviderTaskRunner, QueueEvent, QueueEventKind, TaskQueue};
pub use resilience::{RetryHandler, RetryOptions};
pub use state_machine::{PipelineStage, TaskState, WorkflowKind};
pub use storage::FsStorage;
