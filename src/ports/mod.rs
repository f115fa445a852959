//! # Collaborator Traits
//!
//! Narrow contracts the queue and the orchestrator consume. Production
//! implementations live in [`crate::storage`] and [`crate::queue`]; in-memory
//! doubles live in [`crate::test_helpers`].
//!
//! ## Seams
//!
//! - [`LockManager`]: entity and category locks held by running tasks
//! - [`StorageAdapter`]: file I/O including the verified atomic write
//! - [`TaskRunner`]: executes one queued task
//! - [`ProviderClient`] and [`PromptBuilder`]: AI chat and embedding calls
//! - [`VectorIndex`], [`DuplicateManager`], [`UndoStore`]: post-write bookkeeping

pub mod knowledge;
pub mod locks;
pub mod provider;
pub mod runner;
pub mod storage;

pub use knowledge::{
    DuplicateManager, DuplicatePair, DuplicateStatus, UndoSnapshot, UndoStore, VectorEntry,
    VectorIndex,
};
pub use locks::{LockKind, LockManager, LockRecord};
pub use provider::{
    ChatMessage, ChatRequest, ChatResponse, EmbedRequest, EmbedResponse, PromptBuilder,
    ProviderClient,
};
pub use runner::TaskRunner;
pub use storage::StorageAdapter;
