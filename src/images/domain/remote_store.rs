use crate::core::domain::error::ImageError;
use async_trait::async_trait;
use tokio::io::AsyncWrite;

/// Writer for a file being created on the remote side.
pub type RemoteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// File operations on the hypervisor's image storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Names of the regular files in `dir`.
    async fn list(&self, dir: &str) -> Result<Vec<String>, ImageError>;

    /// Size of the file at `path`, `None` when it does not exist.
    async fn size(&self, path: &str) -> Result<Option<u64>, ImageError>;

    /// Creates (or truncates) `path`. The file is complete once the writer is shut down.
    async fn create(&self, path: &str) -> Result<RemoteWriter, ImageError>;

    async fn remove(&self, path: &str) -> Result<(), ImageError>;

    /// Ends the session. No other call is valid afterwards.
    async fn close(&self) -> Result<(), ImageError>;
}
