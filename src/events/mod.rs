//! # Event System
//!
//! Publish/subscribe plumbing shared by the queue (`QueueEvent`) and the
//! orchestrator (`PipelineEvent`). Each subscriber owns a channel, so listeners
//! never block the publisher or each other.

pub mod publisher;

pub use publisher::{EventBus, SharedEventBus, SubscriberId, Subscription};
