/// File system abstraction used for session and config files
///
/// Implemented for real by [`StandardFileSystem`]; tests substitute
/// `MockFileSystemOperations` generated by `mockall`.
///
/// # Examples
///
/// ```rust,no_run
/// use approval_flow::fs::{FileSystemOperations, StandardFileSystem};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let fs_ops: Arc<dyn FileSystemOperations> = Arc::new(StandardFileSystem);
///     fs_ops.create_dir_all(".approval-flow").await?;
///     fs_ops.write(".approval-flow/session.json", b"{}").await?;
///     assert!(fs_ops.exists(".approval-flow/session.json"));
///     Ok(())
/// }
/// ```
use anyhow::{Context, Result};
use std::path::Path;

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait::async_trait]
pub trait FileSystemOperations: Send + Sync {
    /// Create a directory and any missing parents
    async fn create_dir_all(&self, path: &str) -> Result<()>;

    /// Write `contents`, replacing the file if it exists
    async fn write(&self, path: &str, contents: &[u8]) -> Result<()>;

    async fn read_to_string(&self, path: &str) -> Result<String>;

    /// Remove a file. Removing a missing file is not an error.
    async fn remove_file(&self, path: &str) -> Result<()>;

    fn exists(&self, path: &str) -> bool;
}

/// Production implementation backed by `tokio::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardFileSystem;

#[async_trait::async_trait]
impl FileSystemOperations for StandardFileSystem {
    async fn create_dir_all(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create directory {path}"))
    }

    async fn write(&self, path: &str, contents: &[u8]) -> Result<()> {
        tokio::fs::write(path, contents)
            .await
            .with_context(|| format!("Failed to write {path}"))
    }

    async fn read_to_string(&self, path: &str) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {path}"))
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {path}")),
        }
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read_remove() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/file.txt");
        let path = path.to_str().unwrap();
        let parent = dir.path().join("nested");

        let fs_ops = StandardFileSystem;
        fs_ops.create_dir_all(parent.to_str().unwrap()).await.unwrap();
        fs_ops.write(path, b"hello").await.unwrap();
        assert!(fs_ops.exists(path));
        assert_eq!(fs_ops.read_to_string(path).await.unwrap(), "hello");

        fs_ops.remove_file(path).await.unwrap();
        assert!(!fs_ops.exists(path));
        fs_ops.remove_file(path).await.unwrap();
    }
}
