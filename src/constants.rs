//! # System Constants
//!
//! Error codes, schema versions and tunable defaults shared across the queue and
//! the pipeline orchestrator.
//!
//! Error codes are namespaced by their leading digit so that both user-facing
//! messages and retry classification can be derived from the code alone:
//!
//! | Prefix | Category |
//! | ------ | -------- |
//! | `E1`   | input / validation |
//! | `E2`   | provider / AI (`E23xx` = model output) |
//! | `E3`   | system / IO |
//! | `E4`   | configuration |
//! | `E5`   | internal |

/// Version written into every persisted queue snapshot.
pub const QUEUE_SNAPSHOT_VERSION: u32 = 1;

/// Lock key prefix for category locks (`type:<category>`).
pub const CATEGORY_LOCK_PREFIX: &str = "type:";

/// Error codes by category
pub mod codes {
    // Input / validation
    pub const INPUT_EMPTY: &str = "E1001";
    pub const INPUT_TOO_LONG: &str = "E1002";
    pub const INPUT_INJECTION: &str = "E1003";
    pub const DUPLICATE_NOTE_NAME: &str = "E1004";
    pub const DUPLICATE_ACTIVE_TASK: &str = "E1005";
    pub const LOCK_HELD: &str = "E1006";
    pub const INVALID_STAGE: &str = "E1007";
    pub const TASK_NOT_FOUND: &str = "E1008";
    pub const PIPELINE_NOT_FOUND: &str = "E1009";
    pub const ILLEGAL_TASK_TRANSITION: &str = "E1010";
    pub const USER_CANCELLED: &str = "E1011";

    // Provider / AI
    pub const PROVIDER_REQUEST_FAILED: &str = "E2001";
    pub const PROVIDER_RATE_LIMITED: &str = "E2002";
    pub const PROVIDER_UNAVAILABLE: &str = "E2003";
    pub const MODEL_OUTPUT_MALFORMED: &str = "E2301";
    pub const MODEL_OUTPUT_INCOMPLETE: &str = "E2302";
    pub const MODEL_OUTPUT_MISSING_FIELDS: &str = "E2303";

    // System / IO
    pub const STORAGE_IO: &str = "E3001";
    pub const EXECUTION_TIMEOUT: &str = "E3002";
    pub const WRITE_VERIFICATION_FAILED: &str = "E3003";
    pub const FILE_NOT_FOUND: &str = "E3004";
    pub const SNAPSHOT_SERIALIZATION: &str = "E3005";

    // Configuration
    pub const PROVIDER_NOT_CONFIGURED: &str = "E4001";
    pub const TEMPLATE_MISSING: &str = "E4002";
    pub const INVALID_CONFIGURATION: &str = "E4003";

    // Internal
    pub const EXECUTION_PANICKED: &str = "E5001";
    pub const RESULT_MISMATCH: &str = "E5002";
    pub const MISSING_ARTIFACT: &str = "E5003";
    pub const INVARIANT_BROKEN: &str = "E5004";

    /// Model-output sub-range within the provider category (inclusive)
    pub const MODEL_OUTPUT_RANGE: (u16, u16) = (2300, 2399);
}

/// Retry ceilings per category
pub mod retry_limits {
    pub const NON_RETRYABLE: u32 = 1;
    pub const SYSTEM_IO: u32 = 3;
    pub const PROVIDER: u32 = 5;
    pub const MODEL_OUTPUT: u32 = 3;
    /// Attempt ceiling assigned to freshly enqueued tasks
    pub const DEFAULT_TASK: u32 = 3;
}

/// Default tunables, mirrored by the serde defaults in [`crate::config`]
pub mod defaults {
    pub const CONCURRENCY: usize = 1;
    pub const TICK_INTERVAL_MS: u64 = 500;
    pub const TASK_TIMEOUT_MS: u64 = 180_000;
    pub const MAX_HISTORY: usize = 100;
    pub const SNAPSHOT_PATH: &str = ".pipeline/queue-state.json";
    pub const NOTES_DIR: &str = "notes";
    pub const MAX_INPUT_LENGTH: usize = 2000;
    pub const EMBEDDING_DIMENSIONS: usize = 1536;
    pub const CHAT_MODEL: &str = "gpt-4o-mini";
    pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;
    pub const RETRY_MAX_DELAY_MS: u64 = 30_000;
    pub const RETRY_MULTIPLIER: f64 = 2.0;
}

/// Prompt template identifiers understood by the prompt builder
pub mod templates {
    pub const DEFINE: &str = "define";
    pub const ENRICH: &str = "enrich";
    /// Base id for create-mode generation, resolved per knowledge type
    pub const GENERATE: &str = "generate";
    pub const IMPROVE: &str = "improve";
    pub const MERGE: &str = "merge";
    pub const GROUND: &str = "ground";
    pub const CLASSIFY: &str = "classify";
}
