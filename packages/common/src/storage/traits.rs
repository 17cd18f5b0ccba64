use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::error::StorageError;
use super::hash::ContentHash;
use super::kind::UploadKind;

/// Type alias for a boxed async reader. Request bodies borrow the request,
/// so incoming readers carry a lifetime; stored files are read as `'static`.
pub type BoxReader<'a> = Box<dyn AsyncRead + Unpin + Send + 'a>;

/// Where and what a `put` wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Relative path `<kind>/<name>`; the only form ever written to the database.
    pub path: String,
    pub size: u64,
    pub content_hash: ContentHash,
}

/// Upload storage keyed by upload kind.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store data from an async reader under a fresh unique name.
    async fn put_stream(
        &self,
        kind: UploadKind,
        extension: &str,
        reader: BoxReader<'_>,
    ) -> Result<StoredFile, StorageError>;

    /// Retrieve a stored file as a streaming async reader.
    async fn get_stream(&self, path: &str) -> Result<BoxReader<'static>, StorageError>;

    /// Delete a stored file.
    ///
    /// Returns `true` if the file was deleted, `false` if it did not exist.
    async fn delete(&self, path: &str) -> Result<bool, StorageError>;
}
