//! # Storage
//!
//! Filesystem implementation of [`StorageAdapter`](crate::ports::StorageAdapter).
//! Atomic writes go through a uniquely named temp file that is read back and
//! byte-compared before it is renamed over the target, so a short or corrupted
//! write fails loudly instead of truncating the note.

pub mod fs;

pub use fs::FsStorage;
