//! # Pipeline
//!
//! Multi-stage orchestration of knowledge notes across three workflow kinds:
//!
//! | Kind | Path |
//! | ---- | ---- |
//! | create | enriching → awaiting-create-confirm → reasoning → embedding → [grounding] → awaiting-write-confirm → writing → deduplicating → completed |
//! | incremental-improve | reasoning → embedding → [grounding] → awaiting-write-confirm → writing → deduplicating → completed |
//! | merge | same as incremental-improve, with a merge-specific write routine |
//!
//! Supporting pieces: input screening ([`sanitizer`]), tolerant parsing of
//! model output ([`response_parser`]) and note rendering ([`note`]).

pub mod context;
pub mod events;
pub mod note;
pub mod orchestrator;
pub mod response_parser;
pub mod sanitizer;

pub use context::{MergeDetails, MergeRequest, NoteRef, PipelineContext};
pub use events::{ConfirmationKind, PipelineEvent};
pub use note::{compose_note, note_path, sanitize_filename, NoteMetadata, NoteStatus};
pub use orchestrator::{PipelineCollaborators, PipelineOrchestrator};
pub use sanitizer::sanitize_input;

pub use crate::state_machine::{PipelineStage, WorkflowKind};
