use crate::constants::codes;
use crate::error::{PipelineError, Result};
use crate::ports::StorageAdapter;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error};
use uuid::Uuid;

/// Filesystem storage rooted at a directory
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a storage-relative path. Absolute paths and `..` components are
    /// rejected so every write stays under the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir));
        if escapes || path.trim().is_empty() {
            return Err(PipelineError::storage(format!(
                "Path {path:?} is outside the storage root"
            )));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn temp_path(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".tmp-{}", Uuid::new_v4().simple()));
        target.with_file_name(name)
    }

    /// Read `temp` back, compare it with `expected` and rename it over
    /// `target`. On mismatch the temp file is removed and `target` is left as-is.
    pub(crate) async fn verify_and_commit(
        temp: &Path,
        target: &Path,
        expected: &[u8],
    ) -> Result<()> {
        let written = match fs::read(temp).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(temp).await;
                return Err(e.into());
            }
        };

        if written != expected {
            let _ = fs::remove_file(temp).await;
            error!(
                target_path = %target.display(),
                expected_bytes = expected.len(),
                written_bytes = written.len(),
                "Atomic write verification failed"
            );
            return Err(PipelineError::new(
                codes::WRITE_VERIFICATION_FAILED,
                format!(
                    "Read-back of {} did not match: expected {} bytes, found {}",
                    target.display(),
                    expected.len(),
                    written.len()
                ),
            ));
        }

        if let Err(e) = fs::rename(temp, target).await {
            let _ = fs::remove_file(temp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for FsStorage {
    async fn read(&self, path: &str) -> Result<String> {
        let target = self.resolve(path)?;
        Ok(fs::read_to_string(&target).await?)
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let target = self.resolve(path)?;
        Self::ensure_parent(&target).await?;
        fs::write(&target, content).await?;
        Ok(())
    }

    async fn atomic_write(&self, path: &str, content: &str) -> Result<()> {
        let target = self.resolve(path)?;
        Self::ensure_parent(&target).await?;

        let temp = Self::temp_path(&target);
        if let Err(e) = fs::write(&temp, content.as_bytes()).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Self::verify_and_commit(&temp, &target, content.as_bytes()).await?;

        debug!(path, bytes = content.len(), "Atomic write committed");
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let target = self.resolve(path)?;
        Ok(fs::try_exists(&target).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_dir(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        fs::create_dir_all(&target).await?;
        Ok(())
    }
}
