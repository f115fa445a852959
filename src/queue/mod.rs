//! # Task Queue
//!
//! Durable scheduling of long-running AI work.
//!
//! ## Task lifecycle
//!
//! ```text
//! Pending --(locks granted)--> Running --(success)--> Completed
//! Running --(retryable, under budget, auto-retry on)--> Pending
//! Running --(otherwise)--> Failed
//! {Pending, Running, Failed} --(cancel)--> Cancelled
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use concept_pipeline::config::QueueConfig;
//! use concept_pipeline::queue::{InMemoryLockManager, TaskQueue};
//! use concept_pipeline::resilience::RetryHandler;
//! use concept_pipeline::storage::FsStorage;
//!
//! # async fn example() -> concept_pipeline::Result<()> {
//! let queue = Arc::new(TaskQueue::new(
//!     QueueConfig::default(),
//!     Arc::new(InMemoryLockManager::new()),
//!     Arc::new(FsStorage::new("./vault")),
//!     RetryHandler::new(),
//! ));
//! queue.initialize().await?;
//! queue.start()?;
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod locks;
pub mod runner;
pub mod snapshot;
pub mod task_queue;

pub use events::{QueueEvent, QueueEventKind};
pub use locks::InMemoryLockManager;
pub use runner::ProviderTaskRunner;
pub use snapshot::{QueueSnapshot, QueueStats};
pub use task_queue::{QueueStatus, TaskQueue};

pub use crate::models::{NewTask, TaskPayload, TaskRecord, TaskWork};
