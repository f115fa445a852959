use crate::error::Result;
use async_trait::async_trait;

/// File I/O used by queue persistence and note writes.
///
/// Paths are storage-relative strings with `/` separators.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Read a UTF-8 file; a missing file is `E3004`
    async fn read(&self, path: &str) -> Result<String>;

    /// Plain overwrite, creating parent directories
    async fn write(&self, path: &str, content: &str) -> Result<()>;

    /// Write through a temp file, read it back, byte-compare, then rename.
    /// On mismatch the target is untouched and the call fails with `E3003`.
    async fn atomic_write(&self, path: &str, content: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Delete a file; deleting a missing file is not an error
    async fn delete(&self, path: &str) -> Result<()>;

    async fn ensure_dir(&self, path: &str) -> Result<()>;
}
